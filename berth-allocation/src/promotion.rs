use berth_core::repository::UnitOfWork;
use berth_core::StoreError;
use berth_shared::{HistoryAction, HistoryEvent, Ticket, Tier};
use tracing::{debug, info};

use crate::allocator::PriorityAllocator;
use crate::quota::QuotaTracker;

/// Tier boundaries crossed on release, in the order they are attempted.
const BOUNDARIES: [(Tier, Tier, HistoryAction); 2] = [
    (Tier::Rac, Tier::Confirmed, HistoryAction::PromotedToConfirmed),
    (Tier::WaitingList, Tier::Rac, HistoryAction::PromotedToRac),
];

/// One ticket moved up a tier.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub from: Tier,
    pub ticket: Ticket,
    pub event: HistoryEvent,
}

/// Re-flows the queue after a release: at most one ticket crosses each tier
/// boundary, oldest first.
#[derive(Debug, Clone, Copy)]
pub struct PromotionChain {
    quota: QuotaTracker,
    allocator: PriorityAllocator,
}

impl PromotionChain {
    pub fn new(quota: QuotaTracker, allocator: PriorityAllocator) -> Self {
        Self { quota, allocator }
    }

    pub async fn run(&self, uow: &mut dyn UnitOfWork) -> Result<Vec<Promotion>, StoreError> {
        let mut promotions = Vec::with_capacity(BOUNDARIES.len());

        for (from, to, action) in BOUNDARIES {
            let snapshot = self.quota.snapshot(uow).await?;
            if !snapshot.has_room(to) {
                debug!("No room in {} tier, skipping {} promotion", to, from);
                continue;
            }

            let Some(mut ticket) = uow.oldest_admitted(from).await? else {
                debug!("No {} ticket waiting for promotion", from);
                continue;
            };

            let berth = self.allocator.allocate(uow, to, &ticket.passenger).await?;
            if berth.is_none() && to.requires_berth() && !ticket.passenger.is_minor() {
                debug!("No {} berth for ticket {}, leaving it in {}", to, ticket.id, from);
                continue;
            }

            let now = uow.now().await?;
            if let Some(previous) = ticket.promote(to, berth.map(|b| b.id), now) {
                self.allocator.free(uow, previous).await?;
            }
            uow.save_ticket(&ticket).await?;

            let event = HistoryEvent::new(ticket.id, action, now);
            uow.append_history(&event).await?;
            info!("Promoted ticket {} from {} to {}", ticket.id, from, to);

            promotions.push(Promotion { from, ticket, event });
        }

        Ok(promotions)
    }
}
