use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Admitted,
    Released,
    PromotedToConfirmed,
    PromotedToRac,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Admitted => "admitted",
            HistoryAction::Released => "released",
            HistoryAction::PromotedToConfirmed => "promoted_to_confirmed",
            HistoryAction::PromotedToRac => "promoted_to_rac",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admitted" => Ok(HistoryAction::Admitted),
            "released" => Ok(HistoryAction::Released),
            "promoted_to_confirmed" => Ok(HistoryAction::PromotedToConfirmed),
            "promoted_to_rac" => Ok(HistoryAction::PromotedToRac),
            other => Err(ParseEnumError::new("history action", other)),
        }
    }
}

/// Append-only record of one ticket state transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEvent {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub action: HistoryAction,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEvent {
    pub fn new(ticket_id: Uuid, action: HistoryAction, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            action,
            recorded_at,
        }
    }
}
