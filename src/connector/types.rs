use crate::persistence::PersistenceError;
use crate::provider::ProviderError;

use serde::Serialize;

/// Lifecycle state of a connector.
///
/// `Idle -> Connecting -> Connected -> Disconnected`, with `SwitchingChain` reachable only from
/// `Connected` and always returning to it. `Disconnected` behaves like `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectorState {
	Idle,
	Connecting,
	Connected,
	SwitchingChain,
	Disconnected,
}

impl ConnectorState {
	/// Whether a provider session is established in this state.
	pub fn has_session(&self) -> bool {
		matches!(self, ConnectorState::Connected | ConnectorState::SwitchingChain)
	}
}

/// Options for [`Connector::connect`](super::Connector::connect).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
	/// Chain the wallet should be on once connected. `None` keeps the wallet's chain.
	pub chain_id: Option<String>,
}

impl ConnectOptions {
	pub fn on_chain(chain_id: impl Into<String>) -> Self {
		Self {
			chain_id: Some(chain_id.into()),
		}
	}
}

/// Optional operations a connector kind supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
	pub switch_chain: bool,
	pub sign_message: bool,
	pub resolve_did: bool,
}

impl Capabilities {
	pub const ALL: Capabilities = Capabilities {
		switch_chain: true,
		sign_message: true,
		resolve_did: true,
	};
}

impl Default for Capabilities {
	fn default() -> Self {
		Self::ALL
	}
}

/// Errors raised by connectors
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
	#[error("No compatible wallet provider detected")]
	ProviderUnavailable,

	#[error("Wallet not installed")]
	WalletNotInstalled,

	#[error("Authorization denied: {0}")]
	AuthorizationDenied(String),

	#[error("Unsupported chain {chain_id}")]
	UnsupportedChain {
		chain_id: String,
		#[source]
		source: Option<ProviderError>,
	},

	#[error("Wallet not connected")]
	NotConnected,

	#[error("Function not supported by wallet: {0}")]
	Unsupported(&'static str),

	#[error("Provider error: {0}")]
	Provider(ProviderError),

	#[error("Persistence error: {0}")]
	Persistence(#[from] PersistenceError),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl From<ProviderError> for ConnectorError {
	/// User rejections become `AuthorizationDenied`; everything else is kept as is.
	fn from(error: ProviderError) -> Self {
		if error.is_user_rejection() {
			ConnectorError::AuthorizationDenied(error.to_string())
		} else {
			ConnectorError::Provider(error)
		}
	}
}
