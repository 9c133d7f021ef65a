pub mod channel_listener;
pub mod execution_service;
pub mod telegram_service;
