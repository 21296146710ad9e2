//! Push channel frame types.
//!
//! Inbound frames are UTF-8 text and take one of three shapes:
//!
//! ```text
//! ""  or "0"                        -> ignored (server keep-alive echo)
//! "V:{fingerprint}"                 -> version notice
//! {"Action":..,"Item":..,"OldItem":..} -> delta action
//! ```
//!
//! The only outbound frame is [`HEARTBEAT_FRAME`].

mod frame;


pub use frame::{DeltaAction, PushFrame, HEARTBEAT_FRAME};
