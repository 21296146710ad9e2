//! Connection supervision.
//!
//! ```text
//!            connect() / reconnect tick
//!                      │ CAS Disconnected → Connecting
//!                      ▼
//!   ┌────────────┐  open task  ┌─────────────┐  ChannelEvent  ┌───────────────┐
//!   │ Supervisor │────────────►│ PushChannel │───────────────►│ event routine │
//!   └────────────┘             └─────────────┘                └──────┬────────┘
//!         ▲                                                          │
//!         └────── state (watch) ◄── Opened / Closed / AllServersFailed
//!                                   Frame ──► Reconciler ──► Offline?
//! ```
//!
//! Three background tasks belong to a supervisor: the event routine, the
//! reconnect loop and the heartbeat loop. Each starts at most once. The
//! offline token stops the loops for good; the shutdown token stops all three.


use confsync_types::{ActionKind, ChangeEvent, ConnectionState, HEARTBEAT_FRAME};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::notifier::ChangeNotifier;
use crate::puller::Puller;
use crate::push::{ChannelEvent, OpenReason, PushChannel};
use crate::reconciler::{FrameOutcome, Reconciler};

/// Result of one reconnect supervision tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectTick {
    /// The client went offline; the loop must exit
    Stopped,
    /// Already connected or connecting
    Idle,
    /// A push open was started
    Attempted,
}

/// Loop periods.
#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    pub reconnect: Duration,
    pub heartbeat: Duration,
}

pub struct ConnectionSupervisor {
    state: watch::Sender<ConnectionState>,
    channel: Arc<PushChannel>,
    puller: Arc<Puller>,
    reconciler: Reconciler,
    notifier: Arc<ChangeNotifier>,
    intervals: Intervals,
    /// Fired once by an Offline command; never reset
    offline: CancellationToken,
    /// Fired when the owning client is dropped
    shutdown: CancellationToken,
    events: Mutex<Option<mpsc::UnboundedReceiver<ChannelEvent>>>,
    event_routine: OnceLock<JoinHandle<()>>,
    reconnect_loop: OnceLock<JoinHandle<()>>,
    heartbeat_loop: OnceLock<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    pub fn new(
        channel: Arc<PushChannel>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        puller: Arc<Puller>,
        reconciler: Reconciler,
        notifier: Arc<ChangeNotifier>,
        intervals: Intervals,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            channel,
            puller,
            reconciler,
            notifier,
            intervals,
            offline: CancellationToken::new(),
            shutdown: CancellationToken::new(),
            events: Mutex::new(Some(events)),
            event_routine: OnceLock::new(),
            reconnect_loop: OnceLock::new(),
            heartbeat_loop: OnceLock::new(),
        }
    }

    pub fn status(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_offline(&self) -> bool {
        self.offline.is_cancelled()
    }

    /// Start the push channel and run one full pull.
    ///
    /// Returns whether the push channel is connected once the pull finished;
    /// a push open still in flight (state `Connecting`) yields `false`. Calls
    /// made while connecting or connected return the current state at once.
    pub async fn connect(self: &Arc<Self>) -> bool {
        if self.is_offline() {
            tracing::debug!("connect() ignored: client is offline");
            return false;
        }
        if self.channel.is_open() || !self.claim_connecting() {
            return self.status() == ConnectionState::Connected;
        }

        self.ensure_event_routine();
        self.channel.close().await;
        self.spawn_open(OpenReason::Connect);

        let outcome = self.puller.pull().await;
        tracing::debug!(?outcome, "Initial full pull finished");

        self.ensure_reconnect_loop();
        self.status() == ConnectionState::Connected
    }

    /// One reconnect supervision step.
    pub async fn reconnect_tick(self: &Arc<Self>) -> ReconnectTick {
        if self.is_offline() {
            return ReconnectTick::Stopped;
        }
        if self.status().is_active() {
            return ReconnectTick::Idle;
        }

        self.channel.close().await;
        self.set_state(ConnectionState::Disconnected);
        if self.is_offline() {
            return ReconnectTick::Stopped;
        }
        if !self.claim_connecting() {
            return ReconnectTick::Idle;
        }

        tracing::info!("Push channel down, reconnecting");
        self.ensure_event_routine();
        self.spawn_open(OpenReason::Reconnect);
        ReconnectTick::Attempted
    }

    /// One heartbeat step. Returns `false` once the loop should exit.
    pub async fn heartbeat_tick(&self) -> bool {
        if self.is_offline() {
            return false;
        }
        if self.channel.is_open() {
            if let Err(e) = self.channel.send(HEARTBEAT_FRAME).await {
                tracing::error!("Heartbeat send failed: {}", e);
            }
        }
        true
    }

    /// Stop every background task owned by this supervisor.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.channel.abort();
    }

    fn claim_connecting(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        })
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::debug!(from = %state, to = %next, "Connection state changed");
            *state = next;
            true
        });
    }

    fn spawn_open(self: &Arc<Self>, reason: OpenReason) {
        let channel = Arc::clone(&self.channel);
        let offline = self.offline.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = channel.open(reason) => {
                    if result.is_ok() && (offline.is_cancelled() || shutdown.is_cancelled()) {
                        channel.close().await;
                    }
                }
                () = shutdown.cancelled() => {}
            }
        });
    }

    async fn handle_event(self: &Arc<Self>, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened { server, generation, reason } => {
                if !self.channel.is_current(generation) {
                    return;
                }
                if self.is_offline() {
                    self.channel.close().await;
                    return;
                }
                self.set_state(ConnectionState::Connected);
                tracing::info!(server = %server, "Push channel connected");
                if reason == OpenReason::Reconnect {
                    let outcome = self.puller.pull().await;
                    tracing::debug!(?outcome, "Full pull after reconnect finished");
                }
                self.ensure_heartbeat_loop();
            }
            ChannelEvent::Frame { generation, text } => {
                if !self.channel.is_current(generation) {
                    tracing::trace!(generation, "Dropping frame from a retired socket");
                    return;
                }
                if self.reconciler.handle(&text).await == FrameOutcome::Offline {
                    self.go_offline().await;
                }
            }
            ChannelEvent::Closed { generation } => {
                if self.channel.is_current(generation) {
                    self.set_state(ConnectionState::Disconnected);
                }
            }
            ChannelEvent::AllServersFailed { attempted, reason } => {
                tracing::warn!(attempted, ?reason, "Push channel unavailable");
                if !self.channel.is_open() {
                    self.set_state(ConnectionState::Disconnected);
                }
            }
        }
    }

    async fn go_offline(&self) {
        tracing::info!("Server requested offline; reconnects are disabled for this client");
        self.offline.cancel();
        self.channel.close().await;
        self.set_state(ConnectionState::Disconnected);
        self.notifier.publish(ChangeEvent::without_key(ActionKind::Offline));
    }

    fn ensure_event_routine(self: &Arc<Self>) {
        self.event_routine.get_or_init(|| {
            let events = self.events.lock().take();
            let supervisor = Arc::clone(self);
            tokio::spawn(async move {
                let Some(mut events) = events else { return };
                loop {
                    tokio::select! {
                        event = events.recv() => match event {
                            Some(event) => supervisor.handle_event(event).await,
                            None => break,
                        },
                        () = supervisor.shutdown.cancelled() => break,
                    }
                }
                tracing::debug!("Push event routine stopped");
            })
        });
    }

    fn ensure_reconnect_loop(self: &Arc<Self>) {
        self.reconnect_loop.get_or_init(|| {
            let supervisor = Arc::clone(self);
            tokio::spawn(async move {
                let period = supervisor.intervals.reconnect;
                loop {
                    tokio::select! {
                        () = tokio::time::sleep(period) => {
                            if supervisor.reconnect_tick().await == ReconnectTick::Stopped {
                                break;
                            }
                        }
                        () = supervisor.offline.cancelled() => break,
                        () = supervisor.shutdown.cancelled() => break,
                    }
                }
                tracing::debug!("Reconnect loop stopped");
            })
        });
    }

    fn ensure_heartbeat_loop(self: &Arc<Self>) {
        self.heartbeat_loop.get_or_init(|| {
            let supervisor = Arc::clone(self);
            tokio::spawn(async move {
                let period = supervisor.intervals.heartbeat;
                loop {
                    tokio::select! {
                        () = tokio::time::sleep(period) => {
                            if !supervisor.heartbeat_tick().await {
                                break;
                            }
                        }
                        () = supervisor.offline.cancelled() => break,
                        () = supervisor.shutdown.cancelled() => break,
                    }
                }
                tracing::debug!("Heartbeat loop stopped");
            })
        });
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.status())
            .field("offline", &self.is_offline())
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
