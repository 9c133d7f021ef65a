use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("exchange rejected request (retCode {code}): {message}")]
    Api { code: i64, message: String },

    #[error("{rejected} of {total} batch orders rejected: {detail}")]
    PartialBatch {
        rejected: usize,
        total: usize,
        detail: String,
    },

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("invalid decimal in field {field}: '{value}'")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("refusing to send an empty batch")]
    EmptyBatch,
}
