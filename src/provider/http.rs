//! JSON-RPC 2.0 provider over HTTP.
//!
//! Some wallets (desktop signers, local frames) expose their EIP-1193 surface as a plain HTTP
//! JSON-RPC endpoint instead of an injected object. `HttpProvider` adapts such an endpoint to the
//! [`Provider`] trait. HTTP cannot push events, so listener registrations are accepted but only
//! fire through [`HttpProvider::emit`].

use super::{ListenerHandle, ListenerRegistry, Provider, ProviderError, ProviderEvent, ProviderListener};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error};

/// Wallet provider reachable through HTTP JSON-RPC
pub struct HttpProvider {
	/// The underlying HTTP client.
	http_client: Client,
	/// The JSON-RPC endpoint.
	url: String,
	/// Monotonic request id.
	next_id: AtomicU64,
	listeners: ListenerRegistry,
}

impl HttpProvider {
	/// Create a provider for the given endpoint.
	///
	/// # Arguments
	/// * `url` - The JSON-RPC endpoint of the wallet.
	/// * `timeout` - Per-request HTTP timeout.
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
		let http_client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ProviderError::Transport(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			http_client,
			url: url.into(),
			next_id: AtomicU64::new(1),
			listeners: ListenerRegistry::new(),
		})
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// Deliver an event to registered listeners, e.g. from a polling loop.
	pub fn emit(&self, event: ProviderEvent, payload: &Value) -> usize {
		self.listeners.emit(event, payload)
	}
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
	#[serde(default)]
	result: Value,
	error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
	code: i64,
	message: String,
	data: Option<Value>,
}

impl JsonRpcResponse {
	fn into_result(self) -> Result<Value, ProviderError> {
		match self.error {
			Some(error) => Err(ProviderError::Rpc {
				code: error.code,
				message: error.message,
				data: error.data,
			}),
			None => Ok(self.result),
		}
	}
}

#[async_trait]
impl Provider for HttpProvider {
	async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let body = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});

		debug!("Sending {} (id {}) to {}", method, id, self.url);

		let response = self
			.http_client
			.post(&self.url)
			.json(&body)
			.send()
			.await
			.map_err(|e| {
				error!("Request {} to {} failed: {}", method, self.url, e);
				ProviderError::Transport(e.to_string())
			})?;

		let response: JsonRpcResponse = response
			.json()
			.await
			.map_err(|e| ProviderError::invalid_response(method, e.to_string()))?;

		response.into_result()
	}

	fn on(&self, event: ProviderEvent, listener: ProviderListener) -> ListenerHandle {
		self.listeners.add(event, listener)
	}

	fn name(&self) -> &str {
		"http"
	}
}
