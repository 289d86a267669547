// Event listener registry with scoped subscriptions.
//
// Each `listen` call gets its own `Subscription`. Dropping (or calling
// `unsubscribe` on) a subscription removes exactly that listener; other
// subscribers of the same event kinds are unaffected.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::wire::{EventKind, ServerEvent};

struct Listener {
    id: u64,
    kinds: Vec<EventKind>,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Shared between the session task (dispatch) and handles (subscribe).
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = match self.inner.lock() {
            Ok(mut inner) => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.listeners.push(Listener {
                    id,
                    kinds: kinds.to_vec(),
                    tx,
                });
                id
            }
            Err(_) => {
                // Poisoned registry: hand back a subscription that never yields.
                warn!("listener registry poisoned, subscription will be empty");
                0
            }
        };
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every listener registered for its kind.
    /// Returns the number of listeners that received it.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        let kind = event.kind();
        let mut delivered = 0;
        inner.listeners.retain(|l| {
            if !l.kinds.contains(&kind) {
                return true;
            }
            if l.tx.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                debug!("dropping closed listener {}", l.id);
                false
            }
        });
        delivered
    }

    /// Release every listener. Their subscriptions see the end of stream.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.listeners.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.listeners.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn remove(registry: &Weak<Mutex<Inner>>, id: u64) {
    if let Some(inner) = registry.upgrade() {
        if let Ok(mut inner) = inner.lock() {
            inner.listeners.retain(|l| l.id != id);
        }
    }
}

/// Receiving end of one registration.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
    registry: Weak<Mutex<Inner>>,
}

impl Subscription {
    /// Next event, or `None` once the registry released this listener.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        remove(&self.registry, self.id);
    }
}
