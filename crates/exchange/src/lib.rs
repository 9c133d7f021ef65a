pub mod error;
pub mod remote;
pub mod traits;

pub use error::GatewayError;
pub use remote::{BybitClient, BybitCredentials};
pub use traits::{ExchangeGateway, LeverageStatus, SharedGateway};

#[cfg(any(test, feature = "mocks"))]
pub use traits::MockExchangeGateway;
