#![allow(dead_code)]

use berth_allocation::AllocationEngine;
use berth_core::repository::TicketStore;
use berth_core::{AgeRules, PoolLayout, TierLimits};
use berth_shared::{BerthStatus, TicketStatus};
use berth_store::InMemoryTicketStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn engine_with(limits: TierLimits, layout: PoolLayout) -> (AllocationEngine, InMemoryTicketStore) {
    let store = InMemoryTicketStore::new(LOCK_TIMEOUT);
    let engine = AllocationEngine::new(Arc::new(store.clone()), limits, AgeRules::default());
    engine.initialize_pool(&layout).await.unwrap();
    (engine, store)
}

/// Every held berth is referenced by exactly one admitted ticket and every
/// referenced berth is held.
pub async fn assert_berths_consistent(store: &InMemoryTicketStore) {
    let held: HashSet<i32> = store
        .list_berths(Some(BerthStatus::Held))
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();

    let admitted = store.list_tickets(Some(TicketStatus::Admitted)).await.unwrap();
    let referenced: Vec<i32> = admitted.iter().filter_map(|t| t.berth_id).collect();
    let unique: HashSet<i32> = referenced.iter().copied().collect();

    assert_eq!(referenced.len(), unique.len(), "a berth is referenced twice");
    assert_eq!(held, unique);

    let released = store.list_tickets(Some(TicketStatus::Released)).await.unwrap();
    assert!(released.iter().all(|t| t.berth_id.is_none()));
    assert!(admitted.iter().filter(|t| t.passenger.is_minor()).all(|t| t.berth_id.is_none()));
}
