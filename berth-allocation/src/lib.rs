//! Quota admission, priority berth allocation and the promotion chain.

pub mod allocator;
pub mod engine;
pub mod promotion;
pub mod quota;

pub use allocator::PriorityAllocator;
pub use engine::{AllocationEngine, Availability, PassengerInput};
pub use promotion::{Promotion, PromotionChain};
pub use quota::{QuotaSnapshot, QuotaTracker, TierAvailability};

pub use berth_core::{EngineError, EngineResult};
