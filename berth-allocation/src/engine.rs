use berth_core::repository::{TicketStore, UnitOfWork};
use berth_core::{AgeRules, EngineError, EngineResult, PoolLayout, TierLimits};
use berth_shared::{
    is_minor_age, Berth, BerthKind, Gender, HistoryAction, HistoryEvent, Passenger, Ticket,
    TicketStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::allocator::PriorityAllocator;
use crate::promotion::PromotionChain;
use crate::quota::{QuotaTracker, TierAvailability};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Booking input as it arrives from a caller. Required fields are optional
/// here so that missing values surface as validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PassengerInput {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub has_dependent_minor: Option<bool>,
}

impl PassengerInput {
    pub fn new(name: impl Into<String>, age: i32) -> Self {
        Self {
            name: Some(name.into()),
            age: Some(age),
            ..Self::default()
        }
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_dependent_minor(mut self, has_dependent_minor: bool) -> Self {
        self.has_dependent_minor = Some(has_dependent_minor);
        self
    }
}

/// Free berths plus the capacity left in each tier.
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub free_berths: Vec<Berth>,
    pub tiers: Vec<TierAvailability>,
}

/// Public face of the allocation engine. Every mutating call runs inside a
/// single unit of work; nothing is visible to other callers until it commits.
pub struct AllocationEngine {
    store: Arc<dyn TicketStore>,
    quota: QuotaTracker,
    allocator: PriorityAllocator,
    promotions: PromotionChain,
    rules: AgeRules,
    events: broadcast::Sender<HistoryEvent>,
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn TicketStore>, limits: TierLimits, rules: AgeRules) -> Self {
        let quota = QuotaTracker::new(limits);
        let allocator = PriorityAllocator::new(rules);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            quota,
            allocator,
            promotions: PromotionChain::new(quota, allocator),
            rules,
            events,
        }
    }

    pub fn limits(&self) -> TierLimits {
        self.quota.limits()
    }

    /// History events, delivered only after the unit of work that produced
    /// them has committed.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    pub async fn initialize_pool(&self, layout: &PoolLayout) -> EngineResult<usize> {
        Ok(self.store.initialize_pool(layout).await?)
    }

    pub async fn submit_request(&self, input: PassengerInput) -> EngineResult<Ticket> {
        let passenger = self.build_passenger(&input, false)?;

        let mut uow = self.store.begin().await?;
        let (ticket, event) = self.admit(uow.as_mut(), passenger).await?;
        uow.commit().await?;

        info!("Admitted ticket {} into {} tier (berth {:?})", ticket.id, ticket.tier, ticket.berth_id);
        self.publish(vec![event]);
        Ok(ticket)
    }

    /// Books a whole party in one unit of work. Either every passenger is
    /// admitted or none is. Women travelling in a party that includes a minor
    /// are treated as accompanying that minor unless told otherwise.
    pub async fn submit_group(&self, party: Vec<PassengerInput>) -> EngineResult<Vec<Ticket>> {
        if party.is_empty() {
            return Err(EngineError::Validation("party must include at least one passenger".into()));
        }

        let child_age = self.rules.child_age;
        let party_has_minor = party
            .iter()
            .any(|p| p.age.map_or(false, |age| age >= 0 && is_minor_age(age, child_age)));
        let passengers = party
            .iter()
            .map(|input| self.build_passenger(input, party_has_minor))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut uow = self.store.begin().await?;
        let mut tickets = Vec::with_capacity(passengers.len());
        let mut events = Vec::with_capacity(passengers.len());
        for passenger in passengers {
            let (ticket, event) = self.admit(uow.as_mut(), passenger).await?;
            tickets.push(ticket);
            events.push(event);
        }
        uow.commit().await?;

        info!("Admitted party of {}", tickets.len());
        self.publish(events);
        Ok(tickets)
    }

    pub async fn release_request(&self, ticket_id: Uuid) -> EngineResult<Ticket> {
        let mut uow = self.store.begin().await?;

        let mut ticket = uow
            .find_ticket(ticket_id)
            .await?
            .ok_or(EngineError::NotFound(ticket_id))?;
        if !ticket.is_admitted() {
            warn!("Ticket {} is already released", ticket_id);
            return Err(EngineError::AlreadyReleased(ticket_id));
        }

        let now = uow.now().await?;
        if let Some(berth_id) = ticket.release(now) {
            self.allocator.free(uow.as_mut(), berth_id).await?;
        }
        uow.save_ticket(&ticket).await?;

        let released = HistoryEvent::new(ticket.id, HistoryAction::Released, now);
        uow.append_history(&released).await?;

        let promotions = self.promotions.run(uow.as_mut()).await?;
        uow.commit().await?;

        info!(
            "Released ticket {} from {} tier, {} promotion(s)",
            ticket.id,
            ticket.tier,
            promotions.len()
        );
        let mut events = vec![released];
        events.extend(promotions.into_iter().map(|p| p.event));
        self.publish(events);
        Ok(ticket)
    }

    /// Admitted tickets, most recent first.
    pub async fn list_admitted(&self) -> EngineResult<Vec<Ticket>> {
        let mut tickets = self.store.list_tickets(Some(TicketStatus::Admitted)).await?;
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(tickets)
    }

    /// Free berths and tier capacity, read together under the store lock.
    pub async fn list_free_resources(&self) -> EngineResult<Availability> {
        let mut uow = self.store.begin().await?;
        let snapshot = self.quota.snapshot(uow.as_mut()).await?;
        let free_berths = uow.free_berths(&BerthKind::ALL).await?;

        Ok(Availability {
            free_berths,
            tiers: snapshot.availability(),
        })
    }

    /// Newest first. The existence check and the read share one lock, so a
    /// concurrent purge yields `NotFound` rather than an empty history.
    pub async fn ticket_history(&self, ticket_id: Uuid) -> EngineResult<Vec<HistoryEvent>> {
        let mut uow = self.store.begin().await?;
        if uow.find_ticket(ticket_id).await?.is_none() {
            return Err(EngineError::NotFound(ticket_id));
        }
        Ok(uow.history(ticket_id).await?)
    }

    /// Deletes a released ticket with its passenger and history.
    pub async fn purge_ticket(&self, ticket_id: Uuid) -> EngineResult<()> {
        let mut uow = self.store.begin().await?;
        let ticket = uow
            .find_ticket(ticket_id)
            .await?
            .ok_or(EngineError::NotFound(ticket_id))?;
        if ticket.is_admitted() {
            return Err(EngineError::StillAdmitted(ticket_id));
        }

        uow.delete_ticket(ticket_id).await?;
        uow.commit().await?;
        info!("Purged ticket {}", ticket_id);
        Ok(())
    }

    async fn admit(
        &self,
        uow: &mut dyn UnitOfWork,
        passenger: Passenger,
    ) -> EngineResult<(Ticket, HistoryEvent)> {
        let tier = self
            .quota
            .admissible_tier(uow)
            .await?
            .ok_or(EngineError::NoCapacity)?;

        let berth = self.allocator.allocate(uow, tier, &passenger).await?;
        if berth.is_none() && tier.requires_berth() && !passenger.is_minor() {
            warn!("No berth available for a {} ticket", tier);
            return Err(EngineError::NoBerthAvailable { tier });
        }

        let now = uow.now().await?;
        let ticket = Ticket::admit(tier, passenger, berth.map(|b| b.id), now);
        uow.save_ticket(&ticket).await?;

        let event = HistoryEvent::new(ticket.id, HistoryAction::Admitted, now);
        uow.append_history(&event).await?;
        Ok((ticket, event))
    }

    fn build_passenger(&self, input: &PassengerInput, party_has_minor: bool) -> EngineResult<Passenger> {
        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| EngineError::Validation("name is required".into()))?;
        let age = input
            .age
            .ok_or_else(|| EngineError::Validation("age is required".into()))?;
        if age < 0 {
            return Err(EngineError::Validation(format!("age must not be negative, got {}", age)));
        }

        let travels_with_minor = input.has_dependent_minor.unwrap_or(
            party_has_minor
                && input.gender == Some(Gender::Female)
                && !is_minor_age(age, self.rules.child_age),
        );

        Ok(Passenger::new(
            name,
            age,
            input.gender,
            travels_with_minor,
            self.rules.child_age,
        ))
    }

    fn publish(&self, events: Vec<HistoryEvent>) {
        for event in events {
            if self.events.send(event).is_err() {
                debug!("No history subscribers");
            }
        }
    }
}
