use async_trait::async_trait;
use berth_shared::{Berth, BerthKind, BerthStatus, HistoryEvent, Ticket, TicketStatus, Tier};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::policy::PoolLayout;
use crate::StoreError;

/// Admitted tickets per tier, read together under one lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub confirmed: u32,
    pub rac: u32,
    pub waiting_list: u32,
}

impl TierCounts {
    pub fn get(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Confirmed => self.confirmed,
            Tier::Rac => self.rac,
            Tier::WaitingList => self.waiting_list,
        }
    }

    pub fn add(&mut self, tier: Tier, delta: u32) {
        match tier {
            Tier::Confirmed => self.confirmed += delta,
            Tier::Rac => self.rac += delta,
            Tier::WaitingList => self.waiting_list += delta,
        }
    }

    /// Tallies the admitted tickets in `tickets`, ignoring released ones.
    pub fn tally<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        let mut counts = Self::default();
        for ticket in tickets.into_iter().filter(|t| t.is_admitted()) {
            counts.add(ticket.tier, 1);
        }
        counts
    }
}

/// Entry point to a berth/ticket store.
///
/// Every mutation goes through [`TicketStore::begin`], which takes the
/// store's exclusive lock. Reads outside a unit of work see committed state
/// only.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Opens a unit of work holding the exclusive lock. Waits are bounded;
    /// a timed-out wait returns [`StoreError::LockTimeout`].
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Seeds the berth pool. Returns the number of berths created, zero when
    /// the pool already exists.
    async fn initialize_pool(&self, layout: &PoolLayout) -> Result<usize, StoreError>;

    async fn list_berths(&self, status: Option<BerthStatus>) -> Result<Vec<Berth>, StoreError>;

    async fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, StoreError>;

    async fn find_ticket(&self, id: Uuid) -> Result<Option<Ticket>, StoreError>;

    /// History for one ticket, newest first.
    async fn history(&self, ticket_id: Uuid) -> Result<Vec<HistoryEvent>, StoreError>;
}

/// One atomic, isolated batch of reads and writes.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] discards
/// every write made through it.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Timestamp for writes in this unit of work. Strictly later than any
    /// timestamp handed out by an earlier unit of work on the same store,
    /// however many engines share it.
    async fn now(&mut self) -> Result<DateTime<Utc>, StoreError>;

    async fn tier_counts(&mut self) -> Result<TierCounts, StoreError>;

    /// Free berths of the given kinds, lowest id first.
    async fn free_berths(&mut self, kinds: &[BerthKind]) -> Result<Vec<Berth>, StoreError>;

    async fn find_berth(&mut self, id: i32) -> Result<Option<Berth>, StoreError>;

    async fn save_berth(&mut self, berth: &Berth) -> Result<(), StoreError>;

    async fn find_ticket(&mut self, id: Uuid) -> Result<Option<Ticket>, StoreError>;

    /// The admitted ticket in `tier` with the earliest `created_at`.
    async fn oldest_admitted(&mut self, tier: Tier) -> Result<Option<Ticket>, StoreError>;

    /// Inserts or updates a ticket together with its passenger.
    async fn save_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Removes a ticket, its passenger and its history.
    async fn delete_ticket(&mut self, id: Uuid) -> Result<(), StoreError>;

    async fn append_history(&mut self, event: &HistoryEvent) -> Result<(), StoreError>;

    /// History for one ticket, newest first, read under the lock.
    async fn history(&mut self, ticket_id: Uuid) -> Result<Vec<HistoryEvent>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_shared::Passenger;
    use chrono::Utc;

    fn ticket(tier: Tier) -> Ticket {
        let passenger = Passenger::new("Test", 30, None, false, 5);
        Ticket::admit(tier, passenger, None, Utc::now())
    }

    #[test]
    fn test_tally_skips_released() {
        let mut released = ticket(Tier::Confirmed);
        released.release(Utc::now());
        let tickets = vec![
            ticket(Tier::Confirmed),
            ticket(Tier::Rac),
            ticket(Tier::Rac),
            released,
        ];

        let counts = TierCounts::tally(&tickets);
        assert_eq!(counts.get(Tier::Confirmed), 1);
        assert_eq!(counts.get(Tier::Rac), 2);
        assert_eq!(counts.get(Tier::WaitingList), 0);
    }
}
