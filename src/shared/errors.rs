//! Error handling for the monitor

use thiserror::Error;

use crate::domain::policy::PolicyHandle;

/// Registry-level errors returned synchronously to callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Configuration error: policy region must not be empty")]
    MissingRegion,

    #[error("Unknown policy: {0}")]
    UnknownPolicy(PolicyHandle),

    #[error("Monitor is shutting down")]
    ShuttingDown,
}

/// Errors raised by a price history client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Credentials unavailable: {0}")]
    Credentials(String),
}

/// Fatal poller errors. Delivered as the last item of a policy's stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Failed to construct price client: {0}")]
    ClientConstruction(PriceClientError),

    #[error("Bootstrap query failed: {0}")]
    Bootstrap(PriceClientError),

    #[error("Incremental poll failed: {0}")]
    Poll(PriceClientError),

    #[error("Unparseable spot price: {raw:?}")]
    InvalidPrice { raw: String },
}

impl From<reqwest::Error> for PriceClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PriceClientError::MalformedResponse(err.to_string())
        } else {
            PriceClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PriceClientError {
    fn from(err: serde_json::Error) -> Self {
        PriceClientError::MalformedResponse(err.to_string())
    }
}
