use confsync_types::{ActionKind, ChangeEvent, ConfigItem, ConnectionState};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::cache::LocalCache;
use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::ClientResult;
use crate::notifier::{ChangeListener, ChangeNotifier, SubscriptionId};
use crate::puller::{PullOutcome, Puller};
use crate::push::{PushChannel, PushConnector, PushIdentity, WsConnector};
use crate::reconciler::Reconciler;
use crate::store::ConfigStore;
use crate::supervisor::{ConnectionSupervisor, Intervals};

/// Keeps a local copy of one application's configuration in sync with the service.
///
/// Construct one per application and share it behind an `Arc`. Dropping the
/// client stops every background task it started.
pub struct ConfigClient {
    app_id: String,
    env: String,
    store: Arc<ConfigStore>,
    notifier: Arc<ChangeNotifier>,
    puller: Arc<Puller>,
    supervisor: Arc<ConnectionSupervisor>,
}

impl ConfigClient {
    /// Client that pushes over WebSocket.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Client with a custom push transport.
    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn PushConnector>,
    ) -> ClientResult<Self> {
        let servers = config.validate()?;
        let env = config.normalized_env();
        let authorization = endpoints::basic_authorization(&config.app_id, &config.secret);

        let store = Arc::new(ConfigStore::new(config.fingerprint));
        let notifier = Arc::new(ChangeNotifier::new());
        let cache = LocalCache::new(config.cache_dir.as_deref(), &config.app_id);
        tracing::debug!(app_id = %config.app_id, path = %cache.path().display(), "Using local cache");

        let puller = Arc::new(Puller::new(
            servers.clone(),
            &config.app_id,
            &env,
            authorization.clone(),
            config.http_timeout(),
            Arc::clone(&store),
            cache,
        )?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let identity = PushIdentity {
            app_id: config.app_id.clone(),
            authorization,
            env: env.clone(),
            name: config.name.clone(),
            tag: config.tag.clone(),
        };
        let channel =
            Arc::new(PushChannel::new(connector, servers, identity, config.http_timeout(), events_tx));

        let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&puller), Arc::clone(&notifier));
        let intervals = Intervals {
            reconnect: config.reconnect_interval(),
            heartbeat: config.heartbeat_interval(),
        };
        let supervisor = Arc::new(ConnectionSupervisor::new(
            channel,
            events_rx,
            Arc::clone(&puller),
            reconciler,
            Arc::clone(&notifier),
            intervals,
        ));

        Ok(Self { app_id: config.app_id, env, store, notifier, puller, supervisor })
    }

    /// Open the push channel and load the full configuration set.
    ///
    /// Waits for the full pull only; the push channel connects in the
    /// background. Returns whether it was already connected by then.
    pub async fn connect(&self) -> bool {
        self.supervisor.connect().await
    }

    /// Value for `group:key` (or `key` when ungrouped), ignoring case.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    pub fn get_group(&self, group: &str) -> Vec<ConfigItem> {
        self.store.get_group(group)
    }

    /// Every key/value pair currently held.
    pub fn all(&self) -> BTreeMap<String, String> {
        self.store.snapshot()
    }

    pub fn status(&self) -> ConnectionState {
        self.supervisor.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.watch_status()
    }

    /// Whether the current data came from the local cache rather than a server.
    pub fn is_loaded_from_local(&self) -> bool {
        self.store.is_loaded_from_local()
    }

    /// Version fingerprint of the current data, comparable with the service's notices.
    pub fn fingerprint(&self) -> String {
        self.store.fingerprint()
    }

    pub fn subscribe<L: ChangeListener>(&self, listener: L) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<ChangeEvent> {
        self.notifier.subscribe_channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Run one full pull now. Subscribers see a `Reload` event when a server answered.
    pub async fn reload(&self) -> PullOutcome {
        let outcome = self.puller.pull().await;
        if outcome.is_success() {
            self.notifier.publish(ChangeEvent::without_key(ActionKind::Reload));
        }
        outcome
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Environment name as sent to the service (upper case).
    pub fn env(&self) -> &str {
        &self.env
    }
}

impl Drop for ConfigClient {
    fn drop(&mut self) {
        self.supervisor.shutdown();
    }
}

impl std::fmt::Debug for ConfigClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigClient")
            .field("app_id", &self.app_id)
            .field("env", &self.env)
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}
