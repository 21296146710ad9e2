//! Core domain models for the configuration client.

mod event;
mod item;
mod state;

pub use event::{ActionKind, ChangeEvent};
pub use item::{CompositeKey, ConfigItem};
pub use state::ConnectionState;
