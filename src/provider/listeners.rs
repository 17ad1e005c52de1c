//! Listener bookkeeping shared by providers and connectors.
//!
//! Registrations hand back a [`ListenerHandle`]; unsubscribing is explicit through the handle
//! (or implicit when the handle is dropped) rather than through overridable callbacks.

use super::{ProviderEvent, ProviderListener};

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_event: HashMap<ProviderEvent, Vec<(u64, ProviderListener)>>,
}

/// Set of listeners keyed by [`ProviderEvent`]. Clones share the same set.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Listeners>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return the handle that removes it again.
    pub fn add(&self, event: ProviderEvent, listener: ProviderListener) -> ListenerHandle {
        let mut listeners = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners
            .by_event
            .entry(event)
            .or_default()
            .push((id, listener));

        ListenerHandle {
            id,
            event,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every listener registered for `event`, returning how many ran.
    ///
    /// Listeners run outside the internal lock, so they may register or drop handles.
    pub fn emit(&self, event: ProviderEvent, payload: &Value) -> usize {
        let listeners: Vec<ProviderListener> = {
            let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            guard
                .by_event
                .get(&event)
                .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default()
        };

        debug!("Dispatching {} to {} listeners", event, listeners.len());
        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    pub fn listener_count(&self, event: ProviderEvent) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_event
            .get(&event)
            .map_or(0, Vec::len)
    }
}

/// Unsubscribe capability for a registered listener.
///
/// Dropping the handle unsubscribes as well.
pub struct ListenerHandle {
    id: u64,
    event: ProviderEvent,
    registry: Weak<Mutex<Listeners>>,
}

impl ListenerHandle {
    /// A handle not attached to any registry, for providers that never emit events.
    pub fn detached(event: ProviderEvent) -> Self {
        Self {
            id: 0,
            event,
            registry: Weak::new(),
        }
    }

    pub fn event(&self) -> ProviderEvent {
        self.event
    }

    /// Remove the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut listeners = registry.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entries) = listeners.by_event.get_mut(&self.event) {
                entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
