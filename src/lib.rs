//! Multi-wallet connection core.
//!
//! Connectors adapt wallet providers to one lifecycle contract, the `ConnectionStore` tracks
//! which connector is active, and the `EventBus` carries wallet events between them.

pub mod chains;
pub mod config;
pub mod connector;
pub mod events;
pub mod persistence;
pub mod provider;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

pub use chains::{ChainDescriptor, ChainRegistry};
pub use config::{ConfigError, WalletConfig};
pub use connector::{
	ConnectOptions, Connector, ConnectorContext, ConnectorError, ConnectorState, InjectedConnector,
};
pub use events::{EventBus, WalletEvent, WalletEventKind};
pub use store::{ConnectionSnapshot, ConnectionStore, StoreConfig, StoreError};
