use async_trait::async_trait;
use common::models::ChannelMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("channel {0} not found")]
    ChannelNotFound(String),

    #[error("message source unavailable: {0}")]
    Unavailable(String),
}

/// Where signal posts come from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn resolve_channel(&self, name: &str) -> Result<i64, TransportError>;

    /// Up to `limit` most recent posts of the channel, newest first.
    async fn fetch_history(
        &self,
        channel_id: i64,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, TransportError>;
}
