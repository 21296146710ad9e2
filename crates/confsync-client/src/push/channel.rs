use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{FrameSink, FrameStream, PushConnector, PushRequest};
use crate::endpoints::{self, APP_ID_HEADER, ENV_HEADER};
use crate::error::{ClientError, ClientResult};
use crate::servers::ServerList;

/// Why an open attempt was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenReason {
    /// Explicit `connect()` call; the caller performs its own full pull
    Connect,
    /// Reconnect loop; a full pull follows a successful open
    Reconnect,
}

/// Lifecycle and data events surfaced by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened { server: String, generation: u64, reason: OpenReason },
    Frame { generation: u64, text: String },
    Closed { generation: u64 },
    AllServersFailed { attempted: usize, reason: OpenReason },
}

/// Identity presented when opening a socket.
#[derive(Debug, Clone)]
pub struct PushIdentity {
    pub app_id: String,
    pub authorization: String,
    pub env: String,
    pub name: String,
    pub tag: String,
}

pub struct PushChannel {
    connector: Arc<dyn PushConnector>,
    servers: ServerList,
    identity: PushIdentity,
    connect_timeout: Duration,
    sink: tokio::sync::Mutex<Option<FrameSink>>,
    open: AtomicBool,
    generation: AtomicU64,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl PushChannel {
    pub fn new(
        connector: Arc<dyn PushConnector>,
        servers: ServerList,
        identity: PushIdentity,
        connect_timeout: Duration,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Self {
        Self {
            connector,
            servers,
            identity,
            connect_timeout,
            sink: tokio::sync::Mutex::new(None),
            open: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            receive_task: Mutex::new(None),
            events,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Generation of the most recently installed (or torn down) socket.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Try servers from a fresh cursor until one accepts.
    ///
    /// Emits `Opened` on success or `AllServersFailed` once the cursor is
    /// exhausted; the returned value mirrors the emitted event.
    pub async fn open(self: &Arc<Self>, reason: OpenReason) -> ClientResult<String> {
        let mut cursor = self.servers.cursor();

        for server in cursor.by_ref() {
            let request = match self.request_for(&server) {
                Ok(request) => request,
                Err(e) => {
                    tracing::error!(server = %server, "Cannot build push request: {}", e);
                    continue;
                }
            };

            tracing::debug!(url = %request.url, "Opening push channel");
            let attempt = tokio::time::timeout(self.connect_timeout, self.connector.connect(&request));
            match attempt.await {
                Ok(Ok((sink, stream))) => {
                    let generation = self.install(sink, stream).await;
                    tracing::info!(server = %server, generation, "Push channel opened");
                    self.emit(ChannelEvent::Opened { server: server.clone(), generation, reason });
                    return Ok(server);
                }
                Ok(Err(e)) => {
                    tracing::warn!(server = %server, "Push channel open failed: {}", e);
                }
                Err(_) => {
                    tracing::warn!(
                        server = %server,
                        "Push channel open timed out after {:?}",
                        self.connect_timeout
                    );
                }
            }
        }

        let attempted = cursor.tried();
        tracing::warn!(attempted, "Push channel could not be opened on any server");
        self.emit(ChannelEvent::AllServersFailed { attempted, reason });
        Err(ClientError::AllServersFailed { attempted })
    }

    pub async fn send(&self, text: &str) -> ClientResult<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard
            .as_mut()
            .ok_or_else(|| ClientError::Transport("push channel is not open".to_string()))?;
        sink.send(text.to_string()).await
    }

    /// Tear down the current socket, if any. Events it may still produce are stale.
    pub async fn close(&self) {
        self.retire();
        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!("Error while closing push channel: {}", e);
            }
        }
    }

    /// Synchronous teardown for drop paths; the sink is released with the channel.
    pub fn abort(&self) {
        self.retire();
    }

    fn retire(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        if let Some(task) = self.receive_task.lock().take() {
            task.abort();
        }
    }

    fn request_for(&self, server: &str) -> ClientResult<PushRequest> {
        let url = endpoints::push_url(server, &self.identity.name, &self.identity.tag)?;
        Ok(PushRequest {
            server: server.to_string(),
            url,
            headers: vec![
                (APP_ID_HEADER, self.identity.app_id.clone()),
                ("authorization", self.identity.authorization.clone()),
                (ENV_HEADER, self.identity.env.clone()),
            ],
        })
    }

    async fn install(self: &Arc<Self>, sink: FrameSink, mut stream: FrameStream) -> u64 {
        let mut guard = self.sink.lock().await;
        if let Some(task) = self.receive_task.lock().take() {
            task.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *guard = Some(sink);
        self.open.store(true, Ordering::SeqCst);

        let channel = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(text) => channel.emit(ChannelEvent::Frame { generation, text }),
                    Err(e) => {
                        tracing::warn!(generation, "Push channel receive error: {}", e);
                        break;
                    }
                }
            }
            channel.on_stream_end(generation);
        });
        *self.receive_task.lock() = Some(task);
        generation
    }

    fn on_stream_end(&self, generation: u64) {
        if self.is_current(generation) {
            self.open.store(false, Ordering::SeqCst);
            tracing::info!(generation, "Push channel closed");
        }
        self.emit(ChannelEvent::Closed { generation });
    }

    fn emit(&self, event: ChannelEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Push channel event dropped: no event routine");
        }
    }
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("servers", &self.servers)
            .field("open", &self.is_open())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::push::testing::FakeConnector;

    fn channel(
        connector: Arc<FakeConnector>,
        nodes: &str,
    ) -> (Arc<PushChannel>, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let identity = PushIdentity {
            app_id: "app".to_string(),
            authorization: endpoints::basic_authorization("app", "secret"),
            env: "DEV".to_string(),
            name: "svc".to_string(),
            tag: "blue".to_string(),
        };
        let channel = PushChannel::new(
            connector,
            ServerList::parse(nodes).unwrap(),
            identity,
            Duration::from_secs(1),
            tx,
        );
        (Arc::new(channel), rx)
    }

    #[tokio::test]
    async fn test_open_sends_identity_and_emits_opened() {
        let (connector, mut sessions) = FakeConnector::new();
        let (channel, mut events) = channel(connector, "http://a:5000");

        let server = channel.open(OpenReason::Connect).await.unwrap();
        assert_eq!(server, "http://a:5000");
        assert!(channel.is_open());

        let session = sessions.recv().await.unwrap();
        assert_eq!(session.url, "ws://a:5000/ws?client_name=svc&client_tag=blue");
        assert_eq!(session.header("appid"), Some("app"));
        assert_eq!(session.header("env"), Some("DEV"));
        assert_eq!(session.header("authorization"), Some("Basic YXBwOnNlY3JldA=="));

        let event = events.recv().await.unwrap();
        assert!(matches!(event, ChannelEvent::Opened { reason: OpenReason::Connect, .. }));
    }

    #[tokio::test]
    async fn test_open_fails_over_then_reports_exhaustion() {
        let (connector, _sessions) = FakeConnector::new();
        connector.set_accepting(false);
        let (channel, mut events) = channel(Arc::clone(&connector), "http://a,http://b,http://c");

        let result = channel.open(OpenReason::Reconnect).await;
        assert!(matches!(result, Err(ClientError::AllServersFailed { attempted: 3 })));
        assert_eq!(connector.attempts(), 3);
        assert!(!channel.is_open());
        assert_eq!(
            events.recv().await.unwrap(),
            ChannelEvent::AllServersFailed { attempted: 3, reason: OpenReason::Reconnect }
        );
    }

    #[tokio::test]
    async fn test_open_skips_refusing_server() {
        let (connector, mut sessions) = FakeConnector::new();
        connector.refuse("http://a");
        let (channel, _events) = channel(Arc::clone(&connector), "http://a,http://b");

        for _ in 0..5 {
            let server = channel.open(OpenReason::Connect).await.unwrap();
            assert_eq!(server, "http://b");
            assert_eq!(sessions.recv().await.unwrap().server, "http://b");
        }
    }

    #[tokio::test]
    async fn test_frames_and_close_are_forwarded() {
        let (connector, mut sessions) = FakeConnector::new();
        let (channel, mut events) = channel(connector, "http://a");
        channel.open(OpenReason::Connect).await.unwrap();
        let session = sessions.recv().await.unwrap();
        let generation = channel.generation();
        let _opened = events.recv().await.unwrap();

        session.push("V:ABC");
        assert_eq!(
            events.recv().await.unwrap(),
            ChannelEvent::Frame { generation, text: "V:ABC".to_string() }
        );

        session.hang_up();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Closed { generation });
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn test_send_reaches_server() {
        let (connector, mut sessions) = FakeConnector::new();
        let (channel, _events) = channel(connector, "http://a");
        channel.open(OpenReason::Connect).await.unwrap();
        let mut session = sessions.recv().await.unwrap();

        channel.send("ping").await.unwrap();
        assert_eq!(session.next_sent().await.as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn test_send_without_socket_fails() {
        let (connector, _sessions) = FakeConnector::new();
        let (channel, _events) = channel(connector, "http://a");
        assert!(matches!(channel.send("ping").await, Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn test_close_retires_generation() {
        let (connector, mut sessions) = FakeConnector::new();
        let (channel, _events) = channel(connector, "http://a");
        channel.open(OpenReason::Connect).await.unwrap();
        let mut session = sessions.recv().await.unwrap();
        let generation = channel.generation();

        channel.close().await;
        assert!(!channel.is_open());
        assert!(!channel.is_current(generation));
        // Closing the sink ends the server's view of the socket.
        assert_eq!(session.next_sent().await, None);
    }
}
