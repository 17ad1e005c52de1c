//! Test doubles shared by the unit tests.

use crate::chains::{ChainDescriptor, ChainRegistry};
use crate::connector::{ConnectorContext, InjectedConnector};
use crate::events::EventBus;
use crate::persistence::InMemoryLastUsedConnectorRepository;
use crate::provider::{
	ListenerHandle, ListenerRegistry, Provider, ProviderError, ProviderEvent, ProviderListener,
	StaticDetector, UNRECOGNIZED_CHAIN, UNSUPPORTED_METHOD, USER_REJECTED,
};
use crate::utils::{chain_id_from_value, to_hex_chain_id};

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = Box<dyn Fn(&str, &[Value]) -> Result<Value, ProviderError> + Send + Sync>;

/// Scriptable provider recording every request it receives.
pub(crate) struct MockProvider {
	handler: Handler,
	calls: Mutex<Vec<(String, Vec<Value>)>>,
	listeners: ListenerRegistry,
	delay: Option<Duration>,
}

impl MockProvider {
	pub fn new(
		handler: impl Fn(&str, &[Value]) -> Result<Value, ProviderError> + Send + Sync + 'static,
	) -> Self {
		Self {
			handler: Box::new(handler),
			calls: Mutex::new(Vec::new()),
			listeners: ListenerRegistry::new(),
			delay: None,
		}
	}

	/// Sleep before answering each request.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	/// A provider behaving like a browser wallet backed by `sim`.
	pub fn wallet(sim: WalletSim) -> (Arc<Self>, Arc<Mutex<WalletSim>>) {
		let (provider, sim) = Self::wallet_provider(sim);
		(Arc::new(provider), sim)
	}

	pub fn wallet_with_delay(sim: WalletSim, delay: Duration) -> (Arc<Self>, Arc<Mutex<WalletSim>>) {
		let (provider, sim) = Self::wallet_provider(sim);
		(Arc::new(provider.with_delay(delay)), sim)
	}

	fn wallet_provider(sim: WalletSim) -> (Self, Arc<Mutex<WalletSim>>) {
		let sim = Arc::new(Mutex::new(sim));
		let handler_sim = sim.clone();
		let provider = Self::new(move |method, params| handler_sim.lock().unwrap().handle(method, params));
		(provider, sim)
	}

	pub fn methods(&self) -> Vec<String> {
		self.calls
			.lock()
			.unwrap()
			.iter()
			.map(|(method, _)| method.clone())
			.collect()
	}

	pub fn count(&self, method: &str) -> usize {
		self.methods().iter().filter(|m| m.as_str() == method).count()
	}

	pub fn params_of(&self, method: &str) -> Vec<Vec<Value>> {
		self.calls
			.lock()
			.unwrap()
			.iter()
			.filter(|(m, _)| m == method)
			.map(|(_, params)| params.clone())
			.collect()
	}

	/// Push an event as if the wallet UI changed state.
	pub fn emit(&self, event: ProviderEvent, payload: Value) -> usize {
		self.listeners.emit(event, &payload)
	}

	pub fn listener_count(&self, event: ProviderEvent) -> usize {
		self.listeners.listener_count(event)
	}
}

#[async_trait]
impl Provider for MockProvider {
	async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
		self.calls
			.lock()
			.unwrap()
			.push((method.to_string(), params.clone()));
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
		(self.handler)(method, &params)
	}

	fn on(&self, event: ProviderEvent, listener: ProviderListener) -> ListenerHandle {
		self.listeners.add(event, listener)
	}

	fn name(&self) -> &str {
		"mock"
	}
}

/// In-memory wallet answering the RPC methods connectors use.
pub(crate) struct WalletSim {
	pub chain: String,
	pub known_chains: HashSet<String>,
	pub accounts: Vec<String>,
	pub reject_accounts: bool,
	pub reject_switch: bool,
	pub reject_add: bool,
	/// Accept add-chain requests without actually learning the chain.
	pub ignore_add: bool,
}

impl WalletSim {
	pub fn new(chain: &str, accounts: &[&str]) -> Self {
		Self {
			chain: chain.to_string(),
			known_chains: HashSet::from([chain.to_string()]),
			accounts: accounts.iter().map(|a| a.to_string()).collect(),
			reject_accounts: false,
			reject_switch: false,
			reject_add: false,
			ignore_add: false,
		}
	}

	pub fn knowing(mut self, chains: &[&str]) -> Self {
		self.known_chains
			.extend(chains.iter().map(|c| c.to_string()));
		self
	}

	fn requested_chain(params: &[Value]) -> Result<String, ProviderError> {
		params
			.first()
			.and_then(|p| p.get("chainId"))
			.and_then(chain_id_from_value)
			.ok_or_else(|| ProviderError::rpc(-32602, "Invalid params"))
	}

	fn handle(&mut self, method: &str, params: &[Value]) -> Result<Value, ProviderError> {
		match method {
			"eth_chainId" => Ok(json!(to_hex_chain_id(&self.chain).unwrap_or_default())),
			"eth_accounts" => Ok(json!(self.accounts)),
			"eth_requestAccounts" => {
				if self.reject_accounts {
					return Err(ProviderError::rpc(USER_REJECTED, "User rejected the request."));
				}
				Ok(json!(self.accounts))
			}
			"wallet_switchEthereumChain" => {
				let target = Self::requested_chain(params)?;
				if self.reject_switch {
					return Err(ProviderError::rpc(USER_REJECTED, "User rejected the request."));
				}
				if self.known_chains.contains(&target) {
					self.chain = target;
					Ok(Value::Null)
				} else {
					Err(ProviderError::rpc(
						UNRECOGNIZED_CHAIN,
						format!("Unrecognized chain ID {}", target),
					))
				}
			}
			"wallet_addEthereumChain" => {
				let target = Self::requested_chain(params)?;
				if self.reject_add {
					return Err(ProviderError::rpc(USER_REJECTED, "User rejected the request."));
				}
				if !self.ignore_add {
					self.known_chains.insert(target);
				}
				Ok(Value::Null)
			}
			"personal_sign" => {
				let message = params.first().and_then(Value::as_str).unwrap_or_default();
				Ok(json!(format!("0xsigned{}", message.trim_start_matches("0x"))))
			}
			_ => Err(ProviderError::rpc(
				UNSUPPORTED_METHOD,
				format!("Unsupported method {}", method),
			)),
		}
	}
}

pub(crate) fn polygon() -> ChainDescriptor {
	ChainDescriptor {
		chain_namespace: "eip155".to_string(),
		chain_id: "137".to_string(),
		ticker: "MATIC".to_string(),
		ticker_name: "Polygon".to_string(),
		display_name: "Polygon".to_string(),
		decimals: 18,
		rpc_urls: vec!["https://polygon-rpc.com".to_string()],
		block_explorer_urls: vec!["https://polygonscan.com".to_string()],
	}
}

/// Injected connector wired to a simulated wallet.
pub(crate) struct Harness {
	pub connector: Arc<InjectedConnector>,
	pub provider: Arc<MockProvider>,
	pub sim: Arc<Mutex<WalletSim>>,
	pub events: EventBus,
	pub last_used: Arc<InMemoryLastUsedConnectorRepository>,
}

impl Harness {
	pub fn new(sim: WalletSim, registry: ChainRegistry) -> Self {
		let (provider, sim) = MockProvider::wallet(sim);
		Self::with_provider(provider, sim, registry)
	}

	pub fn with_provider(
		provider: Arc<MockProvider>,
		sim: Arc<Mutex<WalletSim>>,
		registry: ChainRegistry,
	) -> Self {
		let events = EventBus::new();
		let last_used = Arc::new(InMemoryLastUsedConnectorRepository::new());
		let context = ConnectorContext::new(Arc::new(registry), events.clone(), last_used.clone());
		let connector = Arc::new(InjectedConnector::new(
			"1",
			Arc::new(StaticDetector::new(provider.clone())),
			context,
		));

		Self {
			connector,
			provider,
			sim,
			events,
			last_used,
		}
	}

	pub fn wallet_chain(&self) -> String {
		self.sim.lock().unwrap().chain.clone()
	}
}
