use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of the push channel as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// An open attempt is in flight
    Connecting,
    Connected,
}

impl ConnectionState {
    /// True while an attempt is in flight or the channel is up.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}
