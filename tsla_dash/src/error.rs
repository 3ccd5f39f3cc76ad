use thiserror::Error;

/// Malformed or incomplete source data. Fatal for the load that produced it;
/// no partial series is ever handed out alongside one of these.
#[derive(Debug, Error)]
pub enum DataFormatError {
    #[error("data file has no `{column}` column")]
    MissingColumn { column: String },

    #[error("row {row}: missing value for `{field}`")]
    MissingField { row: usize, field: String },

    #[error("row {row}: `{field}` is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        field: String,
        value: String,
    },

    #[error("row {row}: unrecognised timestamp {value:?}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("row {row}: timestamp {current} is not after previous row ({previous})")]
    NonIncreasingTimestamp {
        row: usize,
        previous: String,
        current: String,
    },

    #[error("csv decode failed: {0}")]
    Csv(#[from] csv::Error),
}

/// The chat credential is not configured. The chat panel is disabled; the
/// rest of the dashboard keeps working.
#[derive(Debug, Clone, Error)]
#[error("chat disabled: {var} is not set (environment or .env)")]
pub struct CredentialMissingError {
    pub var: String,
}

#[derive(Debug, Error)]
pub enum ChatRequestError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limit exceeded. Please wait a minute before trying again.")]
    RateLimited,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("prompt blocked by the model: {reason}")]
    Blocked { reason: String },

    #[error("model returned no answer text")]
    EmptyAnswer,

    #[error("chat worker is not running")]
    WorkerGone,

    #[error("chat runtime failed to start: {0}")]
    Runtime(#[from] std::io::Error),
}
