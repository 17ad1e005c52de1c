use crate::connector::Connector;

use std::fmt;
use std::sync::Arc;

/// Whether two handles point at the same connector instance.
pub(crate) fn same_connector(a: &Arc<dyn Connector>, b: &Arc<dyn Connector>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Point-in-time view of the connection state.
///
/// Every snapshot handed out by the store satisfies the connection invariants: when
/// `connected` is set, `active` is present and is one of `connectors`. The active connector is a
/// shared handle into `connectors`, never a separate instance.
#[derive(Clone, Default)]
pub struct ConnectionSnapshot {
    /// Registered connectors, in registration order.
    pub connectors: Vec<Arc<dyn Connector>>,
    pub active: Option<Arc<dyn Connector>>,
    pub address: Option<String>,
    pub connected: bool,
}

impl ConnectionSnapshot {
    pub fn is_registered(&self, connector: &Arc<dyn Connector>) -> bool {
        self.connectors.iter().any(|c| same_connector(c, connector))
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref().map(|c| c.name())
    }

    /// Check the connection invariants.
    ///
    /// `connected` requires an active connector that is registered and holds a provider session.
    /// An active connector must always be registered.
    pub fn is_consistent(&self) -> bool {
        let active_registered = self
            .active
            .as_ref()
            .is_none_or(|active| self.is_registered(active));
        if !active_registered {
            return false;
        }

        if self.connected {
            return self.active.as_ref().is_some_and(|active| active.is_connected());
        }
        true
    }
}

impl fmt::Debug for ConnectionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connectors: Vec<&str> = self.connectors.iter().map(|c| c.name()).collect();
        f.debug_struct("ConnectionSnapshot")
            .field("connectors", &connectors)
            .field("active", &self.active_name())
            .field("address", &self.address)
            .field("connected", &self.connected)
            .finish()
    }
}
