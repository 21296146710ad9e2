use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Kind of change carried by a push delta or raised to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Add,
    Update,
    Remove,
    /// Server-issued command that permanently stops this client instance
    Offline,
    /// Server asks the client to perform a full pull
    Reload,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Add => "add",
            ActionKind::Update => "update",
            ActionKind::Remove => "remove",
            ActionKind::Offline => "offline",
            ActionKind::Reload => "reload",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(ActionKind::Add),
            "update" => Ok(ActionKind::Update),
            "remove" => Ok(ActionKind::Remove),
            "offline" => Ok(ActionKind::Offline),
            "reload" => Ok(ActionKind::Reload),
            _ => Err(FrameError::UnknownAction { action: s.to_string() }),
        }
    }
}

/// Notification delivered to change subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub action: ActionKind,
    /// Affected composite key; empty for `Offline` and `Reload`
    pub key: String,
}

impl ChangeEvent {
    pub fn new(action: ActionKind, key: impl Into<String>) -> Self {
        Self { action, key: key.into() }
    }

    pub fn without_key(action: ActionKind) -> Self {
        Self { action, key: String::new() }
    }
}
