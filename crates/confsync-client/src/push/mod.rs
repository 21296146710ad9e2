//! Push channel: one persistent duplex connection to the configuration service.
//!
//! ```text
//! ┌────────────────┐  connect (failover)  ┌───────────────┐
//! │  PushChannel   │─────────────────────►│ PushConnector │──► ws://server/ws
//! │  sink (Mutex)  │◄─────────────────────│  (trait)      │
//! └──────┬─────────┘   (FrameSink, Stream)└───────────────┘
//!        │ receive task
//!        ▼
//!  mpsc<ChannelEvent> ──► supervisor event routine
//! ```
//!
//! Transport callbacks are replaced by [`ChannelEvent`]s; every event carries
//! the generation of the socket that produced it so late events from a torn
//! down socket can be told apart.

mod channel;
mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{ChannelEvent, OpenReason, PushChannel, PushIdentity};
pub use ws::WsConnector;

use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Outbound half of an open socket.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;
/// Inbound text frames; the stream ends when the socket closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = ClientResult<String>> + Send>>;

/// Everything needed to open one socket against one server.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Base URL as configured
    pub server: String,
    /// Derived `ws://` / `wss://` endpoint
    pub url: Url,
    /// Lower-case header names with their values
    pub headers: Vec<(&'static str, String)>,
}

/// Opens duplex text sockets.
#[async_trait]
pub trait PushConnector: Send + Sync + 'static {
    async fn connect(&self, request: &PushRequest) -> ClientResult<(FrameSink, FrameStream)>;
}
