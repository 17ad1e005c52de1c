//! Detection of a compatible provider in the host environment.

use super::{HttpProvider, Provider};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Finds the provider a connector should drive.
///
/// Returns `None` when no compatible wallet is present; connectors turn that into
/// `ProviderUnavailable`.
#[async_trait]
pub trait ProviderDetector: Send + Sync {
	async fn detect(&self) -> Option<Arc<dyn Provider>>;
}

/// Detector for hosts that hand the provider object in directly.
#[derive(Clone, Default)]
pub struct StaticDetector {
	provider: Option<Arc<dyn Provider>>,
}

impl StaticDetector {
	pub fn new(provider: Arc<dyn Provider>) -> Self {
		Self {
			provider: Some(provider),
		}
	}

	/// A host without any wallet.
	pub fn empty() -> Self {
		Self::default()
	}
}

#[async_trait]
impl ProviderDetector for StaticDetector {
	async fn detect(&self) -> Option<Arc<dyn Provider>> {
		self.provider.clone()
	}
}

/// Detector probing an HTTP JSON-RPC wallet endpoint.
///
/// The endpoint counts as present when it answers `eth_chainId`.
pub struct HttpDetector {
	url: String,
	timeout: Duration,
}

impl HttpDetector {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
		Self {
			url: url.into(),
			timeout,
		}
	}
}

#[async_trait]
impl ProviderDetector for HttpDetector {
	async fn detect(&self) -> Option<Arc<dyn Provider>> {
		let provider = match HttpProvider::new(self.url.clone(), self.timeout) {
			Ok(provider) => provider,
			Err(e) => {
				warn!("Could not build HTTP provider for {}: {}", self.url, e);
				return None;
			}
		};

		match provider.request("eth_chainId", Vec::new()).await {
			Ok(chain_id) => {
				info!("Detected wallet at {} on chain {}", self.url, chain_id);
				Some(Arc::new(provider))
			}
			Err(e) => {
				debug!("No wallet answering at {}: {}", self.url, e);
				None
			}
		}
	}
}
