//! Connection store: the single source of truth for which connector is active.
//!
//! `ConnectionStore` owns the registered connectors and the derived address / connected state.
//! The state lives in a `tokio::sync::watch` channel so that every mutation is one atomic update
//! that all readers (and subscribers) observe as a whole.
//!
//! - `state`: the `ConnectionSnapshot` published to readers.
//! - `flows`: the multi-step connect / disconnect / switch-chain orchestration.
//! - `sync`: following wallet events published on the `EventBus`.

/// Multi-step flows serialized by the store
pub mod flows;
/// Snapshot of the connection state
pub mod state;
/// Event bus follower
pub mod sync;

pub use state::ConnectionSnapshot;

use crate::connector::{Connector, ConnectorError};
use state::same_connector;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

/// Errors raised by the connection store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown connector: {0}")]
    UnknownConnector(String),

    #[error("No active wallet connection")]
    NotConnected,

    #[error("Connector {connector} does not support {operation}")]
    Unsupported {
        connector: String,
        operation: &'static str,
    },

    #[error("Wallet operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Configuration for the connection store
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Upper bound for every provider-facing step of a flow. `None` waits indefinitely.
    pub operation_timeout: Option<Duration>,
}

impl StoreConfig {
    pub fn with_operation_timeout(timeout: Duration) -> Self {
        Self {
            operation_timeout: Some(timeout),
        }
    }
}

/// Process-wide connection state shared by all consumers.
pub struct ConnectionStore {
    state: watch::Sender<ConnectionSnapshot>,
    /// Serializes the multi-step flows in `flows` and `sync`.
    flow_lock: Mutex<()>,
    config: StoreConfig,
}

impl Default for ConnectionStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl ConnectionStore {
    pub fn new(config: StoreConfig) -> Self {
        let (state, _) = watch::channel(ConnectionSnapshot::default());
        Self {
            state,
            flow_lock: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register connectors, keeping registration order.
    ///
    /// A connector whose name is already registered replaces the existing entry in place. If the
    /// replaced entry was active, the connection is dropped.
    pub fn register_connectors(&self, connectors: impl IntoIterator<Item = Arc<dyn Connector>>) {
        let connectors: Vec<Arc<dyn Connector>> = connectors.into_iter().collect();
        self.state.send_modify(|state| {
            for connector in connectors {
                match state
                    .connectors
                    .iter()
                    .position(|c| c.name() == connector.name())
                {
                    Some(index) => {
                        let replaced = std::mem::replace(&mut state.connectors[index], connector);
                        let was_active = state
                            .active
                            .as_ref()
                            .is_some_and(|active| same_connector(active, &replaced));
                        if was_active {
                            state.connected = false;
                            state.address = None;
                            state.active = None;
                        }
                        info!("Replaced connector {}", replaced.name());
                    }
                    None => {
                        info!("Registered connector {}", connector.name());
                        state.connectors.push(connector);
                    }
                }
            }
        });
    }

    /// Registered connectors, in registration order.
    pub fn connectors(&self) -> Vec<Arc<dyn Connector>> {
        self.state.borrow().connectors.clone()
    }

    /// Registered connector with the given name.
    pub fn connector(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.state
            .borrow()
            .connectors
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    pub fn active_connector(&self) -> Option<Arc<dyn Connector>> {
        self.state.borrow().active.clone()
    }

    pub fn address(&self) -> Option<String> {
        self.state.borrow().address.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified after every state mutation.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state.subscribe()
    }

    pub fn is_consistent(&self) -> bool {
        self.state.borrow().is_consistent()
    }

    /// Make `connector` the active connector. It must already be registered.
    ///
    /// Changing the active connector drops the connected flag.
    pub fn set_active_connector(&self, connector: &Arc<dyn Connector>) -> Result<(), StoreError> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| {
            if !state.is_registered(connector) {
                result = Err(StoreError::UnknownConnector(connector.name().to_string()));
                return false;
            }
            let unchanged = state
                .active
                .as_ref()
                .is_some_and(|active| same_connector(active, connector));
            if unchanged {
                return false;
            }
            state.connected = false;
            state.active = Some(connector.clone());
            true
        });
        if result.is_ok() {
            debug!("Active connector set to {}", connector.name());
        }
        result
    }

    pub fn clear_active_connector(&self) {
        self.state.send_modify(|state| {
            state.connected = false;
            state.active = None;
        });
    }

    pub fn set_address(&self, address: Option<String>) {
        self.state.send_modify(|state| state.address = address);
    }

    /// Set the connected flag.
    ///
    /// Setting it requires an active connector holding a provider session, else `NotConnected`.
    pub fn set_is_connected(&self, connected: bool) -> Result<(), StoreError> {
        let mut result = Ok(());
        self.state.send_modify(|state| {
            if connected && !state.active.as_ref().is_some_and(|a| a.is_connected()) {
                result = Err(StoreError::NotConnected);
                return;
            }
            state.connected = connected;
        });
        result
    }

    /// Registered active connector, or the reason there is none.
    fn require_active(&self) -> Result<Arc<dyn Connector>, StoreError> {
        let state = self.state.borrow();
        let active = state.active.clone().ok_or(StoreError::NotConnected)?;
        if !state.is_registered(&active) {
            return Err(StoreError::UnknownConnector(active.name().to_string()));
        }
        Ok(active)
    }
}
