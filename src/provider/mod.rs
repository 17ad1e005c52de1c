//! Provider session handles supplied by the host environment.
//!
//! A provider is the opaque EIP-1193 style object a wallet exposes: a `request` primitive taking
//! an RPC method name and a parameter list, plus event registration for `accountsChanged`,
//! `chainChanged` and `disconnect`. Connectors only ever talk to wallets through this trait.

/// Provider detection in the host environment
pub mod detect;
/// JSON-RPC over HTTP provider
pub mod http;
/// Listener bookkeeping with unsubscribe handles
pub mod listeners;
/// Provider errors, events and well-known codes
mod types;

pub use detect::{HttpDetector, ProviderDetector, StaticDetector};
pub use http::HttpProvider;
pub use listeners::{ListenerHandle, ListenerRegistry};
pub use types::*;

use async_trait::async_trait;
use serde_json::Value;

/// Uniform request/event surface of a wallet provider.
#[async_trait]
pub trait Provider: Send + Sync {
	/// Send an RPC request and wait for the wallet's answer.
	///
	/// The wallet may pause for user interaction for an unbounded time; callers that need a
	/// deadline wrap the call in a timeout.
	async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError>;

	/// Register a listener for a provider event.
	fn on(&self, event: ProviderEvent, listener: ProviderListener) -> ListenerHandle;

	/// Human readable name for diagnostics.
	fn name(&self) -> &str {
		"provider"
	}
}
