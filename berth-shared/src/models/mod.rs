pub mod berth;
pub mod history;
pub mod ticket;

pub use berth::{Berth, BerthKind, BerthStatus};
pub use history::{HistoryAction, HistoryEvent};
pub use ticket::{Gender, Passenger, Ticket, TicketStatus, Tier};

/// Returned when a stored or user-supplied label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
