use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;
use crate::pii::Masked;

/// Admission tiers, highest priority first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    #[serde(rename = "confirmed")]
    Confirmed,
    /// Reservation Against Cancellation: the secondary waitlist, seated on side-lower berths.
    #[serde(rename = "RAC")]
    Rac,
    #[serde(rename = "waiting-list")]
    WaitingList,
}

impl Tier {
    /// Admission order. A submission lands in the first tier with room.
    pub const LADDER: [Tier; 3] = [Tier::Confirmed, Tier::Rac, Tier::WaitingList];

    /// Whether admission into this tier needs a physical berth.
    pub fn requires_berth(&self) -> bool {
        !matches!(self, Tier::WaitingList)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Confirmed => "confirmed",
            Tier::Rac => "RAC",
            Tier::WaitingList => "waiting-list",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Tier::Confirmed),
            "RAC" => Ok(Tier::Rac),
            "waiting-list" => Ok(Tier::WaitingList),
            other => Err(ParseEnumError::new("tier", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Admitted,
    Released,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Admitted => "admitted",
            TicketStatus::Released => "released",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admitted" => Ok(TicketStatus::Admitted),
            "released" => Ok(TicketStatus::Released),
            other => Err(ParseEnumError::new("ticket status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl FromStr for Gender {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" | "m" | "male" => Ok(Gender::Male),
            "F" | "f" | "female" => Ok(Gender::Female),
            other => Err(ParseEnumError::new("gender", other)),
        }
    }
}

/// `true` when `age` falls under the child threshold.
pub fn is_minor_age(age: i32, child_age: i32) -> bool {
    age < child_age
}

/// The traveller behind a ticket. Owned by exactly one ticket.
///
/// `is_minor` is derived from `age` at construction; neither has a setter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Passenger {
    pub id: Uuid,
    pub name: Masked<String>,
    age: i32,
    pub gender: Option<Gender>,
    pub travels_with_minor: bool,
    is_minor: bool,
}

impl Passenger {
    pub fn new(
        name: impl Into<String>,
        age: i32,
        gender: Option<Gender>,
        travels_with_minor: bool,
        child_age: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: Masked(name.into()),
            age,
            gender,
            travels_with_minor,
            is_minor: is_minor_age(age, child_age),
        }
    }

    /// Rebuilds a passenger read back from storage, where `is_minor` was
    /// derived at write time.
    pub fn from_stored(
        id: Uuid,
        name: String,
        age: i32,
        gender: Option<Gender>,
        travels_with_minor: bool,
        is_minor: bool,
    ) -> Self {
        Self {
            id,
            name: Masked(name),
            age,
            gender,
            travels_with_minor,
            is_minor,
        }
    }

    pub fn age(&self) -> i32 {
        self.age
    }

    pub fn is_minor(&self) -> bool {
        self.is_minor
    }

    /// Seniors and women travelling with a minor get first pick of lower berths.
    pub fn has_lower_berth_priority(&self, senior_age: i32) -> bool {
        self.age >= senior_age
            || (self.gender == Some(Gender::Female) && self.travels_with_minor)
    }
}

/// One admission record linking a passenger to a tier and, optionally, a berth.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: Uuid,
    pub tier: Tier,
    pub status: TicketStatus,
    pub passenger: Passenger,
    pub berth_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn admit(tier: Tier, passenger: Passenger, berth_id: Option<i32>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tier,
            status: TicketStatus::Admitted,
            passenger,
            berth_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admitted(&self) -> bool {
        self.status == TicketStatus::Admitted
    }

    /// Marks the ticket released and hands back the berth it was holding.
    pub fn release(&mut self, now: DateTime<Utc>) -> Option<i32> {
        self.status = TicketStatus::Released;
        self.updated_at = now;
        self.berth_id.take()
    }

    /// Moves the ticket into `tier` with a fresh berth, returning the berth it
    /// held before.
    pub fn promote(&mut self, tier: Tier, berth_id: Option<i32>, now: DateTime<Utc>) -> Option<i32> {
        self.tier = tier;
        self.updated_at = now;
        std::mem::replace(&mut self.berth_id, berth_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_is_derived_from_age() {
        assert!(Passenger::new("Meera", 4, Some(Gender::Female), false, 5).is_minor());
        assert!(!Passenger::new("Meera", 5, Some(Gender::Female), false, 5).is_minor());
        assert!(Passenger::new("Meera", 0, None, false, 5).is_minor());
    }

    #[test]
    fn test_child_threshold_is_configurable() {
        let passenger = Passenger::new("Kabir", 7, None, false, 12);
        assert!(passenger.is_minor());
    }

    #[test]
    fn test_lower_berth_priority() {
        let senior = Passenger::new("Ramesh", 60, Some(Gender::Male), false, 5);
        let mother = Passenger::new("Lata", 31, Some(Gender::Female), true, 5);
        let woman_alone = Passenger::new("Priya", 31, Some(Gender::Female), false, 5);
        let father = Passenger::new("Arjun", 31, Some(Gender::Male), true, 5);

        assert!(senior.has_lower_berth_priority(60));
        assert!(mother.has_lower_berth_priority(60));
        assert!(!woman_alone.has_lower_berth_priority(60));
        assert!(!father.has_lower_berth_priority(60));
    }

    #[test]
    fn test_tier_labels() {
        assert_eq!("RAC".parse::<Tier>().unwrap(), Tier::Rac);
        assert_eq!(serde_json::to_string(&Tier::WaitingList).unwrap(), "\"waiting-list\"");
        assert!(Tier::Rac.requires_berth());
        assert!(!Tier::WaitingList.requires_berth());
    }

    #[test]
    fn test_release_clears_berth() {
        let passenger = Passenger::new("Vikram", 40, Some(Gender::Male), false, 5);
        let mut ticket = Ticket::admit(Tier::Confirmed, passenger, Some(3), Utc::now());

        assert_eq!(ticket.release(Utc::now()), Some(3));
        assert_eq!(ticket.status, TicketStatus::Released);
        assert_eq!(ticket.berth_id, None);
    }

    #[test]
    fn test_promote_swaps_berth() {
        let passenger = Passenger::new("Asha", 28, Some(Gender::Female), false, 5);
        let mut ticket = Ticket::admit(Tier::Rac, passenger, Some(64), Utc::now());

        let previous = ticket.promote(Tier::Confirmed, Some(12), Utc::now());
        assert_eq!(previous, Some(64));
        assert_eq!(ticket.tier, Tier::Confirmed);
        assert_eq!(ticket.berth_id, Some(12));
    }
}
