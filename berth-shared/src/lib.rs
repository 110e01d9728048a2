//! Domain models shared by the berth allocation workspace.

pub mod models;
pub mod pii;

pub use models::{
    Berth, BerthKind, BerthStatus, Gender, HistoryAction, HistoryEvent, ParseEnumError,
    Passenger, Ticket, TicketStatus, Tier,
};
pub use models::ticket::is_minor_age;
pub use pii::Masked;
