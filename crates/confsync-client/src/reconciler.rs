//! Interpretation of push frames against the store.

use confsync_types::{ActionKind, ChangeEvent, DeltaAction, PushFrame};
use std::sync::Arc;

use crate::notifier::ChangeNotifier;
use crate::puller::{PullOutcome, Puller};
use crate::store::ConfigStore;

/// What handling one frame did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Empty or no-op frame
    Ignored,
    /// Malformed frame or unknown action, logged and discarded
    Dropped,
    /// Version notice matched the local fingerprint
    VersionMatched,
    /// A full reload ran (version mismatch or server request)
    Reloaded(PullOutcome),
    /// A delta mutated the store and was published
    Applied(ChangeEvent),
    /// The server told this client to go offline; the caller owns the shutdown
    Offline,
}

pub struct Reconciler {
    store: Arc<ConfigStore>,
    puller: Arc<Puller>,
    notifier: Arc<ChangeNotifier>,
}

impl Reconciler {
    pub fn new(store: Arc<ConfigStore>, puller: Arc<Puller>, notifier: Arc<ChangeNotifier>) -> Self {
        Self { store, puller, notifier }
    }

    pub async fn handle(&self, text: &str) -> FrameOutcome {
        tracing::trace!(len = text.len(), "Push frame received");
        let frame = match PushFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Dropping push frame: {}", e);
                return FrameOutcome::Dropped;
            }
        };

        match frame {
            PushFrame::Ignored => FrameOutcome::Ignored,
            PushFrame::VersionNotice(remote) => self.check_version(&remote).await,
            PushFrame::Delta(delta) => self.apply(delta).await,
        }
    }

    async fn check_version(&self, remote: &str) -> FrameOutcome {
        let local = self.store.fingerprint();
        if local.eq_ignore_ascii_case(remote.trim()) {
            tracing::trace!(version = %local, "Configuration version matches");
            return FrameOutcome::VersionMatched;
        }
        tracing::info!(local = %local, remote = %remote, "Configuration version mismatch, reloading");
        FrameOutcome::Reloaded(self.puller.pull().await)
    }

    async fn apply(&self, delta: DeltaAction) -> FrameOutcome {
        let DeltaAction { action, item, old_item } = delta;
        match (action, item) {
            (ActionKind::Add, Some(item)) => {
                let key = self.store.upsert(&item);
                self.applied(ChangeEvent::new(action, key.into_string()))
            }
            (ActionKind::Update, Some(item)) => {
                if let Some(old) = &old_item {
                    self.store.remove(old);
                }
                let key = self.store.upsert(&item);
                self.applied(ChangeEvent::new(action, key.into_string()))
            }
            (ActionKind::Remove, Some(item)) => {
                if !self.store.remove(&item) {
                    tracing::debug!(key = %item.composite_key(), "Remove for a key that is not present");
                }
                self.applied(ChangeEvent::new(action, item.composite_key().into_string()))
            }
            (ActionKind::Offline, _) => FrameOutcome::Offline,
            (ActionKind::Reload, _) => {
                let outcome = self.puller.pull().await;
                if outcome.is_success() {
                    self.notifier.publish(ChangeEvent::without_key(ActionKind::Reload));
                }
                FrameOutcome::Reloaded(outcome)
            }
            (action, None) => {
                tracing::warn!(action = %action, "Dropping delta without an item");
                FrameOutcome::Dropped
            }
        }
    }

    fn applied(&self, event: ChangeEvent) -> FrameOutcome {
        tracing::debug!(action = %event.action, key = %event.key, "Applied push delta");
        self.notifier.publish(event.clone());
        FrameOutcome::Applied(event)
    }
}
