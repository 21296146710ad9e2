//! # confsync Types
//!
//! Wire and domain types for the confsync configuration client.
//!
//! - **`error`** - Typed errors for push frame decoding
//! - **`models`** - Domain models (config items, composite keys, change events, connection state)
//! - **`protocol`** - Push channel frame classification and delta payloads
//!
//! ## Architecture Role
//!
//! ```text
//!          confsync-types (this crate)
//!                  │
//!                  ▼
//!          confsync-client
//!   (puller, push channel, reconciler, supervisor)
//! ```
//!
//! All types are serializable via serde, `Clone`, and `PartialEq` for testing.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::{FrameError, Result};
pub use models::{ActionKind, ChangeEvent, CompositeKey, ConfigItem, ConnectionState};
pub use protocol::{DeltaAction, PushFrame, HEARTBEAT_FRAME};
