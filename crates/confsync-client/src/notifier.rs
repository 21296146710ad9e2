//! Change notification fan-out.
//!
//! Each publish spawns one delivery task per listener so the push routine and
//! reload path never wait on subscriber code.

use confsync_types::ChangeEvent;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives configuration change events.
pub trait ChangeListener: Send + Sync + 'static {
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync + 'static,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event);
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn ChangeListener>)>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<L: ChangeListener>(&self, listener: L) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Events as a channel; the subscription ends when the receiver is dropped.
    pub fn subscribe_channel(self: &Arc<Self>) -> mpsc::UnboundedReceiver<ChangeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let weak = Arc::downgrade(self);
        let id_slot: Arc<parking_lot::Mutex<Option<SubscriptionId>>> = Arc::default();
        let slot = Arc::clone(&id_slot);

        let id = self.subscribe(move |event: &ChangeEvent| {
            if tx.send(event.clone()).is_err() {
                if let (Some(notifier), Some(id)) = (weak.upgrade(), *slot.lock()) {
                    notifier.unsubscribe(id);
                }
            }
        });
        *id_slot.lock() = Some(id);
        rx
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn publish(&self, event: ChangeEvent) {
        let listeners: Vec<Arc<dyn ChangeListener>> =
            self.listeners.read().iter().map(|(_, l)| Arc::clone(l)).collect();
        if listeners.is_empty() {
            return;
        }

        tracing::debug!(action = %event.action, key = %event.key, "Publishing change event");
        let handle = tokio::runtime::Handle::try_current().ok();
        for listener in listeners {
            match &handle {
                Some(handle) => {
                    let event = event.clone();
                    handle.spawn(async move {
                        listener.on_change(&event);
                    });
                }
                None => listener.on_change(&event),
            }
        }
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier").field("listeners", &self.listener_count()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use confsync_types::ActionKind;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_without_listeners_is_noop() {
        let notifier = ChangeNotifier::new();
        notifier.publish(ChangeEvent::new(ActionKind::Add, "k"));
        assert_eq!(notifier.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_every_listener_receives_event() {
        let notifier = Arc::new(ChangeNotifier::new());
        let mut a = notifier.subscribe_channel();
        let mut b = notifier.subscribe_channel();

        notifier.publish(ChangeEvent::new(ActionKind::Remove, "g:k"));

        let got_a = tokio::time::timeout(Duration::from_secs(1), a.recv()).await.unwrap();
        let got_b = tokio::time::timeout(Duration::from_secs(1), b.recv()).await.unwrap();
        assert_eq!(got_a, Some(ChangeEvent::new(ActionKind::Remove, "g:k")));
        assert_eq!(got_a, got_b);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = notifier.subscribe(move |_: &ChangeEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.publish(ChangeEvent::without_key(ActionKind::Reload));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_channel_unsubscribes() {
        let notifier = Arc::new(ChangeNotifier::new());
        let rx = notifier.subscribe_channel();
        drop(rx);

        notifier.publish(ChangeEvent::without_key(ActionKind::Reload));
        for _ in 0..50 {
            if notifier.listener_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_delivers_inline_outside_runtime() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        notifier.subscribe(move |event: &ChangeEvent| {
            assert_eq!(event.action, ActionKind::Offline);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.publish(ChangeEvent::without_key(ActionKind::Offline));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
