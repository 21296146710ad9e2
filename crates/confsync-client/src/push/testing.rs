//! In-memory [`PushConnector`] for exercising the channel and supervisor.

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{FrameSink, FrameStream, PushConnector, PushRequest};
use crate::error::{ClientError, ClientResult};

/// Server side of one accepted fake socket.
pub struct FakeSession {
    pub server: String,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    to_client: fmpsc::UnboundedSender<ClientResult<String>>,
    from_client: fmpsc::UnboundedReceiver<String>,
}

impl FakeSession {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    /// Deliver one text frame to the client.
    pub fn push(&self, text: &str) {
        let _ = self.to_client.unbounded_send(Ok(text.to_string()));
    }

    /// Close the socket from the server side.
    pub fn hang_up(&self) {
        self.to_client.close_channel();
    }

    /// Next frame the client sent, or `None` once the client closed its side.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.from_client.next().await
    }
}

pub struct FakeConnector {
    accepting: AtomicBool,
    refused: Mutex<HashSet<String>>,
    attempts: AtomicUsize,
    sessions: mpsc::UnboundedSender<FakeSession>,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeSession>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            accepting: AtomicBool::new(true),
            refused: Mutex::new(HashSet::new()),
            attempts: AtomicUsize::new(0),
            sessions: tx,
        };
        (Arc::new(connector), rx)
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    pub fn refuse(&self, server: &str) {
        self.refused.lock().insert(server.to_string());
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushConnector for FakeConnector {
    async fn connect(&self, request: &PushRequest) -> ClientResult<(FrameSink, FrameStream)> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.accepting.load(Ordering::SeqCst) || self.refused.lock().contains(&request.server) {
            return Err(ClientError::Transport(format!("{} refused the connection", request.server)));
        }

        let (to_client, client_rx) = fmpsc::unbounded::<ClientResult<String>>();
        let (client_tx, from_client) = fmpsc::unbounded::<String>();
        let session = FakeSession {
            server: request.server.clone(),
            url: request.url.to_string(),
            headers: request.headers.clone(),
            to_client,
            from_client,
        };
        let _ = self.sessions.send(session);

        let sink: FrameSink =
            Box::pin(client_tx.sink_map_err(|e| ClientError::Transport(e.to_string())));
        let stream: FrameStream = Box::pin(client_rx);
        Ok((sink, stream))
    }
}
