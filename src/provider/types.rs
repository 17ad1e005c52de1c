//! Types for provider requests and events

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The user rejected the request.
pub const USER_REJECTED: i64 = 4001;
/// The requested method or account has not been authorized by the user.
pub const UNAUTHORIZED: i64 = 4100;
/// The provider does not support the requested method.
pub const UNSUPPORTED_METHOD: i64 = 4200;
/// The provider is disconnected from all chains.
pub const DISCONNECTED: i64 = 4900;
/// The provider does not recognize the requested chain.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

/// Errors surfaced by provider requests
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
	#[error("Provider RPC error {code}: {message}")]
	Rpc {
		code: i64,
		message: String,
		data: Option<Value>,
	},

	#[error("Transport error: {0}")]
	Transport(String),

	#[error("Invalid response to {method}: {detail}")]
	InvalidResponse { method: String, detail: String },
}

impl ProviderError {
	pub fn rpc(code: i64, message: impl Into<String>) -> Self {
		ProviderError::Rpc {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn invalid_response(method: &str, detail: impl Into<String>) -> Self {
		ProviderError::InvalidResponse {
			method: method.to_string(),
			detail: detail.into(),
		}
	}

	/// RPC error code, if the wallet answered with one.
	pub fn code(&self) -> Option<i64> {
		match self {
			ProviderError::Rpc { code, .. } => Some(*code),
			_ => None,
		}
	}

	/// Whether the user (or the wallet on their behalf) declined the request.
	pub fn is_user_rejection(&self) -> bool {
		matches!(self.code(), Some(USER_REJECTED) | Some(UNAUTHORIZED))
	}
}

/// Events a provider pushes when the wallet changes state on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEvent {
	AccountsChanged,
	ChainChanged,
	Disconnect,
}

impl ProviderEvent {
	pub const ALL: [ProviderEvent; 3] = [
		ProviderEvent::AccountsChanged,
		ProviderEvent::ChainChanged,
		ProviderEvent::Disconnect,
	];

	/// EIP-1193 event name.
	pub fn as_str(&self) -> &'static str {
		match self {
			ProviderEvent::AccountsChanged => "accountsChanged",
			ProviderEvent::ChainChanged => "chainChanged",
			ProviderEvent::Disconnect => "disconnect",
		}
	}
}

impl fmt::Display for ProviderEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Callback receiving the raw event payload (accounts array, hex chain id or error object).
pub type ProviderListener = Arc<dyn Fn(&Value) + Send + Sync>;
