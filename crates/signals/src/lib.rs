pub mod filter;
pub mod parser;

pub use filter::MessageFilter;
pub use parser::{RejectReason, SignalParser};
