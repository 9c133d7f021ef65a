use chrono::{DateTime, Utc};

/// A post fetched from the signal channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub id: i64,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
}
