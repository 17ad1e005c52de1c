use super::types::ChainDescriptor;

use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Lookup table from chain identifier to [`ChainDescriptor`].
///
/// A missing descriptor means the chain is unknown and no add-chain fallback can be offered.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
	chains: BTreeMap<String, ChainDescriptor>,
}

impl ChainRegistry {
	/// Create an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a registry holding the built-in chains (Ethereum mainnet).
	pub fn with_defaults() -> Self {
		let mut registry = Self::new();
		registry.register(ChainDescriptor::mainnet());
		registry
	}

	/// Register a descriptor.
	///
	/// Returns `false` and leaves the registry untouched when the chain is already known;
	/// registered descriptors are never replaced.
	pub fn register(&mut self, descriptor: ChainDescriptor) -> bool {
		if self.chains.contains_key(&descriptor.chain_id) {
			warn!(
				"Chain {} already registered, ignoring new descriptor",
				descriptor.chain_id
			);
			return false;
		}
		debug!(
			"Registered chain {} ({})",
			descriptor.chain_id, descriptor.display_name
		);
		self.chains.insert(descriptor.chain_id.clone(), descriptor);
		true
	}

	/// Register every descriptor of a JSON array, returning how many were new.
	pub fn extend_from_json(&mut self, json: &str) -> Result<usize, serde_json::Error> {
		let descriptors: Vec<ChainDescriptor> = serde_json::from_str(json)?;
		Ok(descriptors
			.into_iter()
			.filter(|descriptor| self.register(descriptor.clone()))
			.count())
	}

	/// Look up the descriptor for a chain identifier.
	pub fn describe(&self, chain_id: &str) -> Option<&ChainDescriptor> {
		self.chains.get(chain_id)
	}

	pub fn contains(&self, chain_id: &str) -> bool {
		self.chains.contains_key(chain_id)
	}

	pub fn chain_ids(&self) -> impl Iterator<Item = &str> {
		self.chains.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.chains.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chains.is_empty()
	}
}
