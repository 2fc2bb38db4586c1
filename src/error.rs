//! Typed errors for the hosted APIs.
//!
//! Everything else in the crate reports through `anyhow`; these exist where a
//! caller has to branch on the kind of failure.

/// Spreadsheet API failures
#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    /// HTTP 429, always worth retrying
    #[error("rate limited by the Sheets API")]
    RateLimited,

    /// Non-success response other than 429
    #[error("Sheets API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Token exchange or key problems
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to read credentials: {0}")]
    Credentials(#[from] std::io::Error),

    #[error("unexpected payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl SheetsError {
    /// Rate limits, server errors and transport failures
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Auth(_) | Self::Credentials(_) | Self::Payload(_) => false,
        }
    }
}

/// SMS gateway failures
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("SMS sending is disabled (no credentials)")]
    Disabled,

    #[error("invalid phone number: {0}")]
    InvalidNumber(String),

    /// The provider rejected the message
    #[error("provider error {code}: {message}")]
    Provider { code: i64, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}
