use berth_shared::{BerthKind, Tier};
use serde::{Deserialize, Serialize};

/// Admission capacity of each tier.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    #[serde(default = "default_confirmed")]
    pub confirmed: u32,
    #[serde(default = "default_rac")]
    pub rac: u32,
    #[serde(default = "default_waiting_list")]
    pub waiting_list: u32,
}

fn default_confirmed() -> u32 { 63 }
fn default_rac() -> u32 { 18 }
fn default_waiting_list() -> u32 { 10 }

impl TierLimits {
    pub fn new(confirmed: u32, rac: u32, waiting_list: u32) -> Self {
        Self { confirmed, rac, waiting_list }
    }

    pub fn limit(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Confirmed => self.confirmed,
            Tier::Rac => self.rac,
            Tier::WaitingList => self.waiting_list,
        }
    }
}

impl Default for TierLimits {
    fn default() -> Self {
        Self::new(default_confirmed(), default_rac(), default_waiting_list())
    }
}

/// Age thresholds behind the minor and senior rules.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct AgeRules {
    /// Passengers younger than this are minors and never get a berth.
    #[serde(default = "default_child_age")]
    pub child_age: i32,
    /// Passengers this age or older get first pick of lower berths.
    #[serde(default = "default_senior_age")]
    pub senior_age: i32,
}

fn default_child_age() -> i32 { 5 }
fn default_senior_age() -> i32 { 60 }

impl Default for AgeRules {
    fn default() -> Self {
        Self {
            child_age: default_child_age(),
            senior_age: default_senior_age(),
        }
    }
}

/// How many berths of each kind the coach has.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PoolLayout {
    #[serde(default = "default_lower")]
    pub lower: u32,
    #[serde(default = "default_upper")]
    pub upper: u32,
    #[serde(default = "default_side_lower")]
    pub side_lower: u32,
    #[serde(default = "default_side_upper")]
    pub side_upper: u32,
}

fn default_lower() -> u32 { 18 }
// Middle berths have no kind of their own and are counted as upper.
fn default_upper() -> u32 { 36 }
fn default_side_lower() -> u32 { 18 }
fn default_side_upper() -> u32 { 9 }

impl PoolLayout {
    pub fn new(lower: u32, upper: u32, side_lower: u32, side_upper: u32) -> Self {
        Self { lower, upper, side_lower, side_upper }
    }

    pub fn count(&self, kind: BerthKind) -> u32 {
        match kind {
            BerthKind::Lower => self.lower,
            BerthKind::Upper => self.upper,
            BerthKind::SideLower => self.side_lower,
            BerthKind::SideUpper => self.side_upper,
        }
    }

    pub fn total(&self) -> u32 {
        BerthKind::ALL.iter().map(|kind| self.count(*kind)).sum()
    }

    /// Berth kinds in seeding order, one entry per berth. Ids are assigned
    /// from 1 in this order, and the allocator prefers low ids, so upper
    /// berths go out before lower ones are touched.
    pub fn kinds(&self) -> Vec<BerthKind> {
        [BerthKind::Upper, BerthKind::SideUpper, BerthKind::Lower, BerthKind::SideLower]
            .iter()
            .flat_map(|kind| std::iter::repeat(*kind).take(self.count(*kind) as usize))
            .collect()
    }
}

impl Default for PoolLayout {
    fn default() -> Self {
        Self::new(default_lower(), default_upper(), default_side_lower(), default_side_upper())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_covers_default_limits() {
        let layout = PoolLayout::default();
        let limits = TierLimits::default();

        let non_side_lower = layout.total() - layout.side_lower;
        assert_eq!(non_side_lower, limits.confirmed);
        assert_eq!(layout.side_lower, limits.rac);
    }

    #[test]
    fn test_kinds_in_seeding_order() {
        let layout = PoolLayout::new(1, 2, 1, 1);
        assert_eq!(
            layout.kinds(),
            vec![
                BerthKind::Upper,
                BerthKind::Upper,
                BerthKind::SideUpper,
                BerthKind::Lower,
                BerthKind::SideLower,
            ]
        );
    }

    #[test]
    fn test_partial_sections_fall_back_to_defaults() {
        let limits: TierLimits = serde_json::from_str(r#"{"confirmed": 1}"#).unwrap();
        assert_eq!(limits, TierLimits::new(1, 18, 10));
    }
}
