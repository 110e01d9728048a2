mod common;

use berth_allocation::{AllocationEngine, EngineError, PassengerInput};
use berth_core::repository::{TicketStore, UnitOfWork};
use berth_core::{AgeRules, PoolLayout, TierLimits};
use berth_shared::{BerthKind, TicketStatus, Tier};
use berth_store::InMemoryTicketStore;
use common::{assert_berths_consistent, engine_with};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_respect_limits() {
    let (engine, store) = engine_with(TierLimits::new(5, 3, 2), PoolLayout::default()).await;
    let engine = Arc::new(engine);

    let handles = (0..20).map(|i| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.submit_request(PassengerInput::new(format!("P{}", i), 30 + i)).await })
    });
    let results: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::NoCapacity)))
        .count();
    assert_eq!((admitted, rejected), (10, 10));

    let tickets = store.list_tickets(Some(TicketStatus::Admitted)).await.unwrap();
    let count = |tier| tickets.iter().filter(|t| t.tier == tier).count();
    assert_eq!((count(Tier::Confirmed), count(Tier::Rac), count(Tier::WaitingList)), (5, 3, 2));
    assert_berths_consistent(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_releases_promote_distinct_tickets() {
    let (engine, store) = engine_with(TierLimits::new(2, 2, 2), PoolLayout::default()).await;
    let engine = Arc::new(engine);

    let mut tickets = Vec::new();
    for i in 0..6 {
        tickets.push(engine.submit_request(PassengerInput::new(format!("Q{}", i), 25)).await.unwrap());
    }

    let handles = tickets[..2].iter().map(|t| {
        let engine = engine.clone();
        let id = t.id;
        tokio::spawn(async move { engine.release_request(id).await })
    });
    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    for (ticket, expected) in tickets[2..].iter().zip([Tier::Confirmed, Tier::Confirmed, Tier::Rac, Tier::Rac]) {
        let current = store.find_ticket(ticket.id).await.unwrap().unwrap();
        assert_eq!(current.tier, expected, "ticket {}", ticket.id);
    }
    assert_berths_consistent(&store).await;
}

#[tokio::test]
async fn test_lock_timeout_is_retryable() {
    let store = InMemoryTicketStore::new(Duration::from_millis(50));
    let engine = AllocationEngine::new(Arc::new(store.clone()), TierLimits::default(), AgeRules::default());
    engine.initialize_pool(&PoolLayout::default()).await.unwrap();

    let held = store.begin().await.unwrap();
    let err = engine.submit_request(PassengerInput::new("Rhea", 30)).await.unwrap_err();
    assert!(matches!(err, EngineError::TemporarilyUnavailable(_)));
    assert!(err.is_retryable());

    drop(held);
    assert!(engine.submit_request(PassengerInput::new("Rhea", 30)).await.is_ok());
}

#[tokio::test]
async fn test_cancelled_operation_leaves_no_trace() {
    let (engine, store) = engine_with(TierLimits::default(), PoolLayout::default()).await;

    let mut uow = store.begin().await.unwrap();
    let mut berth = uow.free_berths(&[BerthKind::Lower]).await.unwrap().remove(0);
    berth.hold();
    uow.save_berth(&berth).await.unwrap();
    drop(uow);

    assert_berths_consistent(&store).await;
    assert_eq!(engine.list_free_resources().await.unwrap().free_berths.len(), 81);
}

#[tokio::test]
async fn test_history_reads_wait_for_the_store_lock() {
    let store = InMemoryTicketStore::new(Duration::from_millis(50));
    let engine = AllocationEngine::new(Arc::new(store.clone()), TierLimits::default(), AgeRules::default());
    engine.initialize_pool(&PoolLayout::default()).await.unwrap();
    let ticket = engine.submit_request(PassengerInput::new("Sunil", 52)).await.unwrap();

    let held = store.begin().await.unwrap();
    let err = engine.ticket_history(ticket.id).await.unwrap_err();
    assert!(matches!(err, EngineError::TemporarilyUnavailable(_)));
    drop(held);

    assert_eq!(engine.ticket_history(ticket.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_engines_sharing_a_store_keep_one_timeline() {
    let (first, store) = engine_with(TierLimits::new(1, 1, 0), PoolLayout::new(1, 0, 1, 0)).await;
    let second = AllocationEngine::new(Arc::new(store.clone()), TierLimits::new(1, 1, 0), AgeRules::default());

    let confirmed = first.submit_request(PassengerInput::new("Tanvi", 30)).await.unwrap();
    let rac = second.submit_request(PassengerInput::new("Uday", 30)).await.unwrap();
    assert!(rac.created_at > confirmed.created_at);

    first.release_request(confirmed.id).await.unwrap();
    second.purge_ticket(confirmed.id).await.unwrap();

    let history = second.ticket_history(rac.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].recorded_at > history[1].recorded_at);
    assert_eq!(history[1].recorded_at, rac.created_at);
    assert_berths_consistent(&store).await;
}
