//! Session-change notifications.
//!
//! An explicit publish/subscribe hub replaces the identity SDK's callback
//! registration: observers subscribe and receive an unsubscribe handle, and
//! the client session context is the subsystem's sole internal subscriber.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::SessionRecord;

/// Discrete session lifecycle events emitted by authentication flows.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A session was issued after sign-in or sign-up.
    SignedIn(SessionRecord),
    /// The session ended, locally or remotely.
    SignedOut,
    /// An expired session was rotated; the user remains signed in.
    TokenRefreshed(SessionRecord),
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, UnboundedSender<AuthEvent>>,
}

/// Fan-out hub for [`AuthEvent`]s.
///
/// Cloning shares the underlying registry. Publishing never blocks; events
/// for dropped subscribers are discarded.
#[derive(Clone, Default)]
pub struct AuthEventHub {
    registry: Arc<Mutex<Registry>>,
}

impl AuthEventHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Dropping the returned subscription unsubscribes.
    pub fn subscribe(&self) -> AuthSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            let id = registry.next_id;
            registry.next_id += 1;
            registry.subscribers.insert(id, sender);
            id
        };
        AuthSubscription {
            id,
            registry: Arc::downgrade(&self.registry),
            receiver,
        }
    }

    /// Deliver an event to every live subscriber.
    pub fn publish(&self, event: &AuthEvent) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry
            .subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    /// Number of live subscriptions, for diagnostics and tests.
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribers
            .len()
    }
}

/// Handle returned by [`AuthEventHub::subscribe`].
pub struct AuthSubscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    receiver: UnboundedReceiver<AuthEvent>,
}

impl AuthSubscription {
    /// Receive the next event, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive for event-loop style consumers.
    pub fn try_recv(&mut self) -> Option<AuthEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .subscribers
                .remove(&self.id);
        }
    }
}
