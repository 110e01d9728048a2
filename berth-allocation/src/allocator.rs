use berth_core::repository::UnitOfWork;
use berth_core::{AgeRules, StoreError};
use berth_shared::{Berth, BerthKind, Passenger, Tier};
use tracing::debug;

/// Side-lower berths are kept back for RAC; confirmed tickets never get one.
const CONFIRMED_KINDS: [BerthKind; 3] = [BerthKind::Lower, BerthKind::Upper, BerthKind::SideUpper];
const RAC_KINDS: [BerthKind; 1] = [BerthKind::SideLower];

/// Picks a concrete berth for an admission into a tier.
#[derive(Debug, Clone, Copy)]
pub struct PriorityAllocator {
    senior_age: i32,
}

impl PriorityAllocator {
    pub fn new(rules: AgeRules) -> Self {
        Self {
            senior_age: rules.senior_age,
        }
    }

    /// Berth kinds a ticket in `tier` may ever occupy.
    pub fn eligible_kinds(tier: Tier) -> &'static [BerthKind] {
        match tier {
            Tier::Confirmed => &CONFIRMED_KINDS,
            Tier::Rac => &RAC_KINDS,
            Tier::WaitingList => &[],
        }
    }

    /// Applies the priority rules to `free` without touching the store.
    /// Among equally eligible berths the lowest id wins.
    pub fn choose<'a>(&self, tier: Tier, passenger: &Passenger, free: &'a [Berth]) -> Option<&'a Berth> {
        if !tier.requires_berth() || passenger.is_minor() {
            return None;
        }

        if tier == Tier::Confirmed && passenger.has_lower_berth_priority(self.senior_age) {
            if let Some(lower) = lowest_free(free, &[BerthKind::Lower]) {
                return Some(lower);
            }
        }
        lowest_free(free, Self::eligible_kinds(tier))
    }

    /// Chooses a berth and marks it held inside `uow`. `None` means nothing
    /// eligible is free, or the tier or passenger takes no berth at all.
    pub async fn allocate(
        &self,
        uow: &mut dyn UnitOfWork,
        tier: Tier,
        passenger: &Passenger,
    ) -> Result<Option<Berth>, StoreError> {
        if !tier.requires_berth() || passenger.is_minor() {
            return Ok(None);
        }

        let free = uow.free_berths(Self::eligible_kinds(tier)).await?;
        let Some(chosen) = self.choose(tier, passenger, &free) else {
            debug!("No free {} berth among {} candidates", tier, free.len());
            return Ok(None);
        };

        let mut berth = chosen.clone();
        berth.hold();
        uow.save_berth(&berth).await?;
        debug!("Holding berth {} ({}) for a {} ticket", berth.id, berth.kind, tier);
        Ok(Some(berth))
    }

    /// Returns a berth to the free pool.
    pub async fn free(&self, uow: &mut dyn UnitOfWork, berth_id: i32) -> Result<(), StoreError> {
        let mut berth = uow
            .find_berth(berth_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("ticket references missing berth {}", berth_id)))?;
        berth.free();
        uow.save_berth(&berth).await?;
        debug!("Freed berth {} ({})", berth.id, berth.kind);
        Ok(())
    }
}

fn lowest_free<'a>(berths: &'a [Berth], kinds: &[BerthKind]) -> Option<&'a Berth> {
    berths
        .iter()
        .filter(|b| b.is_free() && kinds.contains(&b.kind))
        .min_by_key(|b| b.id)
}
