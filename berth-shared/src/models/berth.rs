use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseEnumError;

/// Physical berth layout within a coach.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum BerthKind {
    Lower,
    SideLower,
    Upper,
    SideUpper,
}

impl BerthKind {
    pub const ALL: [BerthKind; 4] = [
        BerthKind::Lower,
        BerthKind::SideLower,
        BerthKind::Upper,
        BerthKind::SideUpper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BerthKind::Lower => "lower",
            BerthKind::SideLower => "side-lower",
            BerthKind::Upper => "upper",
            BerthKind::SideUpper => "side-upper",
        }
    }
}

impl fmt::Display for BerthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BerthKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lower" => Ok(BerthKind::Lower),
            "side-lower" => Ok(BerthKind::SideLower),
            "upper" => Ok(BerthKind::Upper),
            "side-upper" => Ok(BerthKind::SideUpper),
            other => Err(ParseEnumError::new("berth kind", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BerthStatus {
    Free,
    Held,
    /// Taken out of circulation by an operator; never allocated.
    Reserved,
}

impl BerthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BerthStatus::Free => "free",
            BerthStatus::Held => "held",
            BerthStatus::Reserved => "reserved",
        }
    }
}

impl fmt::Display for BerthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BerthStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(BerthStatus::Free),
            "held" => Ok(BerthStatus::Held),
            "reserved" => Ok(BerthStatus::Reserved),
            other => Err(ParseEnumError::new("berth status", other)),
        }
    }
}

/// One allocatable slot in the pool. Created once when the pool is seeded,
/// then cycles between `Free` and `Held`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Berth {
    pub id: i32,
    pub kind: BerthKind,
    pub status: BerthStatus,
}

impl Berth {
    pub fn new(id: i32, kind: BerthKind) -> Self {
        Self {
            id,
            kind,
            status: BerthStatus::Free,
        }
    }

    pub fn is_free(&self) -> bool {
        self.status == BerthStatus::Free
    }

    pub fn hold(&mut self) {
        self.status = BerthStatus::Held;
    }

    pub fn free(&mut self) {
        self.status = BerthStatus::Free;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_round_trip_through_from_str() {
        for kind in BerthKind::ALL {
            assert_eq!(kind.as_str().parse::<BerthKind>().unwrap(), kind);
        }
        assert!("middle".parse::<BerthKind>().is_err());
    }

    #[test]
    fn test_kind_serde_uses_kebab_case() {
        let json = serde_json::to_string(&BerthKind::SideLower).unwrap();
        assert_eq!(json, "\"side-lower\"");
    }

    #[test]
    fn test_hold_and_free() {
        let mut berth = Berth::new(7, BerthKind::Upper);
        assert!(berth.is_free());
        berth.hold();
        assert_eq!(berth.status, BerthStatus::Held);
        berth.free();
        assert!(berth.is_free());
    }
}
