use berth_core::repository::{TierCounts, UnitOfWork};
use berth_core::{StoreError, TierLimits};
use berth_shared::Tier;
use serde::Serialize;

/// Capacity report for one tier.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TierAvailability {
    pub tier: Tier,
    pub limit: u32,
    pub admitted: u32,
    pub remaining: u32,
}

/// Tier counts paired with their limits, as read inside one unit of work.
#[derive(Debug, Clone, Copy)]
pub struct QuotaSnapshot {
    limits: TierLimits,
    counts: TierCounts,
}

impl QuotaSnapshot {
    pub fn new(limits: TierLimits, counts: TierCounts) -> Self {
        Self { limits, counts }
    }

    pub fn admitted(&self, tier: Tier) -> u32 {
        self.counts.get(tier)
    }

    pub fn has_room(&self, tier: Tier) -> bool {
        self.counts.get(tier) < self.limits.limit(tier)
    }

    /// First tier on the ladder with a free slot.
    pub fn admissible_tier(&self) -> Option<Tier> {
        Tier::LADDER.into_iter().find(|tier| self.has_room(*tier))
    }

    pub fn availability(&self) -> Vec<TierAvailability> {
        Tier::LADDER
            .into_iter()
            .map(|tier| {
                let limit = self.limits.limit(tier);
                let admitted = self.counts.get(tier);
                TierAvailability {
                    tier,
                    limit,
                    admitted,
                    remaining: limit.saturating_sub(admitted),
                }
            })
            .collect()
    }
}

/// Reads admitted counts per tier. Must be called on a unit of work, which
/// already holds the store's exclusive lock, so all three counts come from
/// the same instant.
#[derive(Debug, Clone, Copy)]
pub struct QuotaTracker {
    limits: TierLimits,
}

impl QuotaTracker {
    pub fn new(limits: TierLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> TierLimits {
        self.limits
    }

    pub async fn snapshot(&self, uow: &mut dyn UnitOfWork) -> Result<QuotaSnapshot, StoreError> {
        let counts = uow.tier_counts().await?;
        Ok(QuotaSnapshot::new(self.limits, counts))
    }

    pub async fn admissible_tier(&self, uow: &mut dyn UnitOfWork) -> Result<Option<Tier>, StoreError> {
        Ok(self.snapshot(uow).await?.admissible_tier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(confirmed: u32, rac: u32, waiting_list: u32) -> TierCounts {
        TierCounts { confirmed, rac, waiting_list }
    }

    #[test]
    fn test_ladder_order() {
        let limits = TierLimits::new(2, 1, 1);

        assert_eq!(QuotaSnapshot::new(limits, counts(0, 0, 0)).admissible_tier(), Some(Tier::Confirmed));
        assert_eq!(QuotaSnapshot::new(limits, counts(2, 0, 0)).admissible_tier(), Some(Tier::Rac));
        assert_eq!(QuotaSnapshot::new(limits, counts(2, 1, 0)).admissible_tier(), Some(Tier::WaitingList));
        assert_eq!(QuotaSnapshot::new(limits, counts(2, 1, 1)).admissible_tier(), None);
    }

    #[test]
    fn test_zero_limit_tier_is_skipped() {
        let limits = TierLimits::new(0, 1, 0);
        assert_eq!(QuotaSnapshot::new(limits, counts(0, 0, 0)).admissible_tier(), Some(Tier::Rac));
    }

    #[test]
    fn test_availability_report() {
        let snapshot = QuotaSnapshot::new(TierLimits::new(63, 18, 10), counts(63, 4, 0));
        let report = snapshot.availability();

        assert_eq!(report[0], TierAvailability { tier: Tier::Confirmed, limit: 63, admitted: 63, remaining: 0 });
        assert_eq!(report[1].remaining, 14);
        assert_eq!(report[2].remaining, 10);
    }
}
