//! Typed error definitions for push frame decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while classifying an inbound push frame.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum FrameError {
    /// Frame body is not a valid delta JSON object
    #[error("Malformed frame: {message}")]
    Malformed {
        /// Description of the parse failure
        message: String,
    },

    /// Delta carried an action this client does not understand
    #[error("Unknown action: {action}")]
    UnknownAction {
        /// Action string as received
        action: String,
    },

    /// Delta action requires an item but none was sent
    #[error("Action {action} is missing its item")]
    MissingItem {
        /// Action string as received
        action: String,
    },
}

impl FrameError {
    /// Create a malformed-frame error from a serde_json error.
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::Malformed { message: e.to_string() }
    }
}

/// Standard Result type using FrameError.
pub type Result<T> = std::result::Result<T, FrameError>;
