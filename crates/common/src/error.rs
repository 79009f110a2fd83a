use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Provider fetch failed, the ticker is unknown, or the response was empty.
    #[error("Data unavailable for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    /// Series is shorter than the longest indicator window.
    #[error("Insufficient history for {ticker}: {bars} bars, need {required}")]
    InsufficientHistory {
        ticker: String,
        bars: usize,
        required: usize,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn unavailable(ticker: impl Into<String>, reason: impl ToString) -> Self {
        Error::DataUnavailable {
            ticker: ticker.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the conditions the screener treats as "drop this ticker
    /// quietly" rather than as an operational failure worth a warning.
    pub fn is_expected_drop(&self) -> bool {
        matches!(
            self,
            Error::DataUnavailable { .. } | Error::InsufficientHistory { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
