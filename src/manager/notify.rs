use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::api::dto::DEFAULT_NOTIFICATION_CAPACITY;

/// Handle returned by [`Notifier::on_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Fan-out of events to channel subscribers and callbacks.
///
/// Publishing never blocks and never fails: full channels skip the event,
/// dropped receivers are pruned and panicking callbacks are logged.
pub struct Notifier<T> {
    capacity: usize,
    senders: Mutex<Vec<flume::Sender<T>>>,
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + 'static> Default for Notifier<T> {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl<T: Clone + Send + 'static> Notifier<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (tx, rx) = flume::bounded(self.capacity);
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn on_event<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns whether a handler was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        let channels = self
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        channels + handlers
    }

    pub fn publish(&self, event: &T) {
        {
            let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
            senders.retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(flume::TrySendError::Full(_)) => {
                    log::trace!("Notification subscriber lagging, event skipped");
                    true
                }
                Err(flume::TrySendError::Disconnected(_)) => false,
            });
        }

        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers: Vec<Handler<T>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::warn!(panic = message.as_str(); "Notification handler panicked");
            }
        }
    }
}
