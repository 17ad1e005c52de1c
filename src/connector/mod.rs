//! Connector contract and concrete connectors.
//!
//! A connector adapts one family of wallet providers to a uniform lifecycle: connect, switch
//! chain, read accounts, sign, resolve names, disconnect. Concrete connectors are independent
//! implementations of the [`Connector`] trait and are handed around as `Arc<dyn Connector>`.
//!
//! - `injected`: browser-injected (EIP-1193) wallets, and anything else reachable through a
//!   [`ProviderDetector`](crate::provider::ProviderDetector).
//! - `ens`: reverse name resolution used by `resolve_did`.
//! - `types`: state machine, options, capabilities and the connector error taxonomy.

/// ENS reverse resolution over `eth_call`
pub mod ens;
/// Connector for injected EIP-1193 providers
pub mod injected;
/// Connector state, options and errors
pub mod types;

pub use injected::InjectedConnector;
pub use types::*;

use crate::chains::ChainRegistry;
use crate::events::EventBus;
use crate::persistence::LastUsedConnectorRepository;
use crate::provider::{ListenerHandle, Provider, ProviderEvent, ProviderListener};

use async_trait::async_trait;
use std::sync::Arc;

/// Uniform lifecycle contract of a wallet integration.
#[async_trait]
pub trait Connector: Send + Sync {
	/// Connector kind tag, e.g. `injected`. Used as the persisted last-used name.
	fn name(&self) -> &str;

	/// Provider family tag, e.g. `ethereum`.
	fn family(&self) -> &str;

	/// Chain identifier the connector believes the wallet is on.
	fn chain(&self) -> String;

	fn state(&self) -> ConnectorState;

	/// Whether a provider session handle is currently held.
	fn is_connected(&self) -> bool;

	fn capabilities(&self) -> Capabilities {
		Capabilities::ALL
	}

	/// Return the cached session handle, or detect a provider in the host environment.
	async fn get_provider(&self) -> Result<Arc<dyn Provider>, ConnectorError>;

	/// Request account authorization. The first address is the active account.
	async fn get_account(&self) -> Result<Vec<String>, ConnectorError>;

	/// Chain reported by the live session, `None` when never connected.
	async fn get_chain_id(&self) -> Result<Option<String>, ConnectorError>;

	/// Switch the wallet to `chain_id`, adding the chain first if the wallet does not know it.
	async fn switch_chain(&self, _chain_id: &str) -> Result<(), ConnectorError> {
		Err(ConnectorError::Unsupported("switch_chain"))
	}

	/// Establish a provider session.
	async fn connect(&self, options: ConnectOptions) -> Result<(), ConnectorError>;

	/// Drop the provider session. Safe to call when already disconnected.
	async fn disconnect(&self) -> Result<(), ConnectorError>;

	/// Reverse-resolve `address` to a human readable name where the chain supports it.
	async fn resolve_did(&self, _address: &str) -> Result<Option<String>, ConnectorError> {
		Ok(None)
	}

	/// Sign `message` with the active account.
	async fn sign_message(&self, _message: &str) -> Result<String, ConnectorError> {
		Err(ConnectorError::Unsupported("sign_message"))
	}

	/// Register a hook run after the connector handled a provider event.
	fn on_provider_event(&self, event: ProviderEvent, listener: ProviderListener) -> ListenerHandle;
}

/// Shared collaborators every connector is constructed with.
#[derive(Clone)]
pub struct ConnectorContext {
	pub registry: Arc<ChainRegistry>,
	pub events: EventBus,
	pub last_used: Arc<dyn LastUsedConnectorRepository>,
}

impl ConnectorContext {
	pub fn new(
		registry: Arc<ChainRegistry>,
		events: EventBus,
		last_used: Arc<dyn LastUsedConnectorRepository>,
	) -> Self {
		Self {
			registry,
			events,
			last_used,
		}
	}
}
