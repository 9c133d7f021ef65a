pub mod message;
pub mod order;
pub mod signal;

pub use message::ChannelMessage;
pub use order::{ExchangePrecision, MarketOrder, Side, TakeProfitOrder};
pub use signal::{Direction, Signal, ValidationError};
