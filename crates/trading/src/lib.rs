pub mod allocation;
pub mod rounding;
pub mod sizing;

pub use allocation::{AllocationConfig, AllocationError, MAX_TAKE_PROFITS};
pub use sizing::{EntryOrderPlan, RiskSettings, SizingError, distribute, size};
