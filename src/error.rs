// src/error.rs
use rust_decimal::Decimal;
use thiserror::Error;

/// Message fragments the exchange uses for conditions worth retrying.
const TEMPORARY_MARKERS: [&str; 4] = ["upgrading", "try again", "timeout", "too many requests"];

/// Failures returned by an exchange gateway.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Too many requests: {0}")]
    RateLimited(String),

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ExchangeError>,
    },
}

impl ExchangeError {
    /// Whether the failure is transient and the call may be repeated.
    ///
    /// Structured kinds are checked first; anything else falls back to the
    /// exchange's message text.
    pub fn is_temporary(&self) -> bool {
        match self {
            ExchangeError::Timeout(_) | ExchangeError::RateLimited(_) => true,
            ExchangeError::Decode(_) | ExchangeError::RetriesExhausted { .. } => false,
            ExchangeError::Http(_) | ExchangeError::Api { .. } => is_temporary_message(&self.to_string()),
        }
    }
}

pub fn is_temporary_message(message: &str) -> bool {
    let message = message.to_lowercase();
    TEMPORARY_MARKERS.iter().any(|marker| message.contains(marker))
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            ExchangeError::RateLimited(err.to_string())
        } else if err.is_decode() {
            ExchangeError::Decode(err.to_string())
        } else {
            ExchangeError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trade store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("trade store encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("insufficient balance: need {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("no {0} balance on account")]
    MissingBalance(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("strategy not found: {0}")]
    StrategyNotFound(String),

    #[error("engine is already running")]
    AlreadyRunning,
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_by_message() {
        let err = ExchangeError::Api {
            code: "50001".into(),
            message: "Service temporarily unavailable, please Try Again later".into(),
        };
        assert!(err.is_temporary());

        let err = ExchangeError::Http("connection TIMEOUT".into());
        assert!(err.is_temporary());

        let err = ExchangeError::Api {
            code: "51008".into(),
            message: "Order failed. Insufficient margin".into(),
        };
        assert!(!err.is_temporary());
    }

    #[test]
    fn test_structured_kinds() {
        assert!(ExchangeError::Timeout("read".into()).is_temporary());
        assert!(ExchangeError::RateLimited("429".into()).is_temporary());
        assert!(!ExchangeError::Decode("bad json".into()).is_temporary());

        let exhausted = ExchangeError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ExchangeError::Timeout("read".into())),
        };
        assert!(!exhausted.is_temporary());
    }
}
