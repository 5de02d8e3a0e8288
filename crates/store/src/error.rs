//! Error types for message store operations

/// Error type for store API calls
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl StoreError {
    /// Returns true if this error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            // Retry network-level failures and timeouts
            StoreError::Http(_) => true,

            // Server-side trouble and throttling pass, client mistakes don't
            StoreError::Status { status, .. } => *status >= 500 || *status == 429,

            // A malformed body will not fix itself
            StoreError::Decode(_) => false,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
