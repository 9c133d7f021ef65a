pub mod bybit_client;
pub mod responses;

pub use bybit_client::{BybitClient, BybitCredentials};
