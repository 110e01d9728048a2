use async_trait::async_trait;
use berth_core::repository::{TicketStore, TierCounts, UnitOfWork};
use berth_core::{MonotonicClock, PoolLayout, StoreError};
use berth_shared::{Berth, BerthKind, BerthStatus, HistoryEvent, Ticket, TicketStatus, Tier};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    berths: BTreeMap<i32, Berth>,
    tickets: HashMap<Uuid, Ticket>,
    history: HashMap<Uuid, Vec<HistoryEvent>>,
    clock: MonotonicClock,
}

/// Inverse of one write, replayed newest-first when a unit of work is
/// dropped without committing.
enum Undo {
    Berth(Berth),
    Ticket { id: Uuid, previous: Option<Ticket> },
    History { ticket_id: Uuid },
    Deleted { ticket: Ticket, history: Vec<HistoryEvent> },
}

/// Process-local store. A single async mutex serializes every unit of work,
/// so tier counts and berth availability are always read consistently.
#[derive(Clone)]
pub struct InMemoryTicketStore {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl InMemoryTicketStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            lock_timeout,
        }
    }

    async fn lock(&self) -> Result<OwnedMutexGuard<MemoryState>, StoreError> {
        tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| {
                warn!("In-memory store lock not acquired within {:?}", self.lock_timeout);
                StoreError::LockTimeout(format!(
                    "store lock not acquired within {}ms",
                    self.lock_timeout.as_millis()
                ))
            })
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.lock().await?;
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            undo: Vec::new(),
            committed: false,
        }))
    }

    async fn initialize_pool(&self, layout: &PoolLayout) -> Result<usize, StoreError> {
        let mut state = self.lock().await?;
        if !state.berths.is_empty() {
            debug!("Berth pool already seeded with {} berths", state.berths.len());
            return Ok(0);
        }

        for (index, kind) in layout.kinds().into_iter().enumerate() {
            let id = index as i32 + 1;
            state.berths.insert(id, Berth::new(id, kind));
        }
        info!("Seeded in-memory berth pool with {} berths", state.berths.len());
        Ok(state.berths.len())
    }

    async fn list_berths(&self, status: Option<BerthStatus>) -> Result<Vec<Berth>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .berths
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect())
    }

    async fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .tickets
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect())
    }

    async fn find_ticket(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let state = self.lock().await?;
        Ok(state.tickets.get(&id).cloned())
    }

    async fn history(&self, ticket_id: Uuid) -> Result<Vec<HistoryEvent>, StoreError> {
        let state = self.lock().await?;
        let mut events = state.history.get(&ticket_id).cloned().unwrap_or_default();
        events.reverse();
        Ok(events)
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    undo: Vec<Undo>,
    committed: bool,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn now(&mut self) -> Result<DateTime<Utc>, StoreError> {
        Ok(self.guard.clock.now())
    }

    async fn tier_counts(&mut self) -> Result<TierCounts, StoreError> {
        Ok(TierCounts::tally(self.guard.tickets.values()))
    }

    async fn free_berths(&mut self, kinds: &[BerthKind]) -> Result<Vec<Berth>, StoreError> {
        Ok(self
            .guard
            .berths
            .values()
            .filter(|b| b.is_free() && kinds.contains(&b.kind))
            .cloned()
            .collect())
    }

    async fn find_berth(&mut self, id: i32) -> Result<Option<Berth>, StoreError> {
        Ok(self.guard.berths.get(&id).cloned())
    }

    async fn save_berth(&mut self, berth: &Berth) -> Result<(), StoreError> {
        if !self.guard.berths.contains_key(&berth.id) {
            return Err(StoreError::Backend(format!("berth {} is not part of the pool", berth.id)));
        }
        if let Some(previous) = self.guard.berths.insert(berth.id, berth.clone()) {
            self.undo.push(Undo::Berth(previous));
        }
        Ok(())
    }

    async fn find_ticket(&mut self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        Ok(self.guard.tickets.get(&id).cloned())
    }

    async fn oldest_admitted(&mut self, tier: Tier) -> Result<Option<Ticket>, StoreError> {
        Ok(self
            .guard
            .tickets
            .values()
            .filter(|t| t.is_admitted() && t.tier == tier)
            .min_by_key(|t| (t.created_at, t.id))
            .cloned())
    }

    async fn save_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError> {
        if let Some(berth_id) = ticket.berth_id {
            if !self.guard.berths.contains_key(&berth_id) {
                return Err(StoreError::Backend(format!(
                    "ticket {} references unknown berth {}",
                    ticket.id, berth_id
                )));
            }
        }
        let previous = self.guard.tickets.insert(ticket.id, ticket.clone());
        self.undo.push(Undo::Ticket { id: ticket.id, previous });
        Ok(())
    }

    async fn delete_ticket(&mut self, id: Uuid) -> Result<(), StoreError> {
        if let Some(ticket) = self.guard.tickets.remove(&id) {
            let history = self.guard.history.remove(&id).unwrap_or_default();
            self.undo.push(Undo::Deleted { ticket, history });
        }
        Ok(())
    }

    async fn append_history(&mut self, event: &HistoryEvent) -> Result<(), StoreError> {
        if !self.guard.tickets.contains_key(&event.ticket_id) {
            return Err(StoreError::Backend(format!(
                "history event for unknown ticket {}",
                event.ticket_id
            )));
        }
        self.guard
            .history
            .entry(event.ticket_id)
            .or_default()
            .push(event.clone());
        self.undo.push(Undo::History { ticket_id: event.ticket_id });
        Ok(())
    }

    async fn history(&mut self, ticket_id: Uuid) -> Result<Vec<HistoryEvent>, StoreError> {
        let mut events = self.guard.history.get(&ticket_id).cloned().unwrap_or_default();
        events.reverse();
        Ok(events)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        this.committed = true;
        this.undo.clear();
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if self.committed || self.undo.is_empty() {
            return;
        }
        debug!("Rolling back {} uncommitted writes", self.undo.len());
        let state = &mut *self.guard;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Berth(previous) => {
                    state.berths.insert(previous.id, previous);
                }
                Undo::Ticket { id, previous: Some(previous) } => {
                    state.tickets.insert(id, previous);
                }
                Undo::Ticket { id, previous: None } => {
                    state.tickets.remove(&id);
                }
                Undo::History { ticket_id } => {
                    if let Some(events) = state.history.get_mut(&ticket_id) {
                        events.pop();
                        if events.is_empty() {
                            state.history.remove(&ticket_id);
                        }
                    }
                }
                Undo::Deleted { ticket, history } => {
                    if !history.is_empty() {
                        state.history.insert(ticket.id, history);
                    }
                    state.tickets.insert(ticket.id, ticket);
                }
            }
        }
    }
}
