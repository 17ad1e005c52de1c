//! Event system for connector lifecycle transitions.
//!
//! Connectors announce `connected`, `disconnected`, `chain-changed` and `account-changed` on a
//! process-wide [`EventBus`] instead of reaching into the connection store. The store, the UI
//! layer or any other consumer subscribes independently. Emission never blocks the emitting
//! operation, and subscribers only see events published after they subscribed.

/// Broadcast-backed bus implementation
mod bus;

pub use bus::{DEFAULT_EVENT_CAPACITY, EventBus, EventSubscription};

use serde::Serialize;
use std::fmt;

/// Lifecycle transitions announced by connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalletEventKind {
    Connected,
    Disconnected,
    AccountChanged,
    ChainChanged,
}

impl WalletEventKind {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            WalletEventKind::Connected => "connected",
            WalletEventKind::Disconnected => "disconnected",
            WalletEventKind::AccountChanged => "account-changed",
            WalletEventKind::ChainChanged => "chain-changed",
        }
    }
}

impl fmt::Display for WalletEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An event on the bus, tagged with the name of the connector that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletEvent {
    pub kind: WalletEventKind,
    pub connector: String,
}

impl WalletEvent {
    pub fn new(kind: WalletEventKind, connector: impl Into<String>) -> Self {
        Self {
            kind,
            connector: connector.into(),
        }
    }
}
