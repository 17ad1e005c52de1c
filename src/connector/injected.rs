//! Connector for injected EIP-1193 providers.
//!
//! `InjectedConnector` drives whatever provider its [`ProviderDetector`] finds in the host
//! environment (a browser extension's `window.ethereum`, or an HTTP wallet endpoint). It keeps
//! its own chain identifier and session handle, keeps them in sync with wallet-initiated
//! changes through provider event listeners, and implements the switch-else-add-then-retry
//! protocol for chain switching.

use super::{
	Capabilities, ConnectOptions, Connector, ConnectorContext, ConnectorError, ConnectorState, ens,
};
use crate::events::WalletEventKind;
use crate::provider::{
	ListenerHandle, ListenerRegistry, Provider, ProviderDetector, ProviderError, ProviderEvent,
	ProviderListener,
};
use crate::utils::{chain_id_from_value, hex_encode_message, normalize_chain_id, to_hex_chain_id};

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::{debug, error, info, warn};

/// Kind tag of the injected connector.
pub const INJECTED_CONNECTOR_NAME: &str = "injected";
/// Provider family served by the injected connector.
pub const ETHEREUM_FAMILY: &str = "ethereum";
/// Chain a freshly constructed connector assumes.
pub const DEFAULT_CHAIN_ID: &str = "1";
/// Chain where reverse name resolution (ENS) is deployed.
pub const DID_CHAIN_ID: &str = "1";

const SWITCH_CHAIN_METHOD: &str = "wallet_switchEthereumChain";
const ADD_CHAIN_METHOD: &str = "wallet_addEthereumChain";

/// Session fields shared with the provider event handlers.
struct Session {
	chain: RwLock<String>,
	provider: RwLock<Option<Arc<dyn Provider>>>,
	state: RwLock<ConnectorState>,
}

impl Session {
	fn new(chain: String) -> Self {
		Self {
			chain: RwLock::new(chain),
			provider: RwLock::new(None),
			state: RwLock::new(ConnectorState::Idle),
		}
	}

	fn chain(&self) -> String {
		self.chain.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	fn set_chain(&self, chain: String) {
		*self.chain.write().unwrap_or_else(PoisonError::into_inner) = chain;
	}

	fn provider(&self) -> Option<Arc<dyn Provider>> {
		self.provider
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	fn set_provider(&self, provider: Option<Arc<dyn Provider>>) {
		*self.provider.write().unwrap_or_else(PoisonError::into_inner) = provider;
	}

	fn state(&self) -> ConnectorState {
		*self.state.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn set_state(&self, state: ConnectorState) {
		let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
		if *current != state {
			debug!("Connector state {:?} -> {:?}", *current, state);
			*current = state;
		}
	}
}

/// Holds the session in `SwitchingChain` until dropped, also when the switch future is dropped.
struct SwitchingChainGuard<'a> {
	session: &'a Session,
}

impl<'a> SwitchingChainGuard<'a> {
	fn enter(session: &'a Session) -> Self {
		session.set_state(ConnectorState::SwitchingChain);
		Self { session }
	}
}

impl Drop for SwitchingChainGuard<'_> {
	fn drop(&mut self) {
		// A wallet-side disconnect during the switch already moved us to Disconnected.
		if self.session.provider().is_some()
			&& self.session.state() == ConnectorState::SwitchingChain
		{
			self.session.set_state(ConnectorState::Connected);
		}
	}
}

/// Connector for browser-injected (EIP-1193) wallets.
pub struct InjectedConnector {
	session: Arc<Session>,
	detector: Arc<dyn ProviderDetector>,
	context: ConnectorContext,
	/// Application hooks run after the connector handled a provider event.
	hooks: ListenerRegistry,
	/// Registrations on the current provider, dropped when the session ends.
	provider_listeners: Mutex<Vec<ListenerHandle>>,
	/// Serializes connect, switch and disconnect on this connector.
	operation_lock: tokio::sync::Mutex<()>,
}

impl InjectedConnector {
	pub fn new(
		default_chain: impl Into<String>,
		detector: Arc<dyn ProviderDetector>,
		context: ConnectorContext,
	) -> Self {
		Self {
			session: Arc::new(Session::new(default_chain.into())),
			detector,
			context,
			hooks: ListenerRegistry::new(),
			provider_listeners: Mutex::new(Vec::new()),
			operation_lock: tokio::sync::Mutex::new(()),
		}
	}

	/// Connector starting on Ethereum mainnet.
	pub fn with_default_chain(detector: Arc<dyn ProviderDetector>, context: ConnectorContext) -> Self {
		Self::new(DEFAULT_CHAIN_ID, detector, context)
	}

	async fn detect_provider(&self) -> Result<Arc<dyn Provider>, ConnectorError> {
		match self.detector.detect().await {
			Some(provider) => {
				debug!("Using provider {}", provider.name());
				Ok(provider)
			}
			None => {
				warn!("No injected wallet provider detected");
				Err(ConnectorError::ProviderUnavailable)
			}
		}
	}

	fn attach_provider_listeners(&self, provider: &Arc<dyn Provider>) {
		let mut handles = self
			.provider_listeners
			.lock()
			.unwrap_or_else(PoisonError::into_inner);
		handles.clear();
		for event in ProviderEvent::ALL {
			handles.push(provider.on(event, self.provider_event_handler(event)));
		}
	}

	/// Listener keeping the session in sync with changes made in the wallet UI.
	///
	/// Holds the session weakly: the provider (owned by the session) owns this listener.
	fn provider_event_handler(&self, event: ProviderEvent) -> ProviderListener {
		let session: Weak<Session> = Arc::downgrade(&self.session);
		let events = self.context.events.clone();
		let hooks = self.hooks.clone();

		Arc::new(move |payload: &Value| {
			let Some(session) = session.upgrade() else {
				return;
			};

			match event {
				ProviderEvent::AccountsChanged => {
					info!("Account changed: {}", payload);
					events.emit(WalletEventKind::AccountChanged, INJECTED_CONNECTOR_NAME);
				}
				ProviderEvent::ChainChanged => {
					match chain_id_from_value(payload) {
						Some(chain) => {
							info!("Chain changed to {}", chain);
							session.set_chain(chain);
						}
						None => warn!("Ignoring malformed chainChanged payload {}", payload),
					}
					events.emit(WalletEventKind::ChainChanged, INJECTED_CONNECTOR_NAME);
				}
				ProviderEvent::Disconnect => {
					info!("Wallet disconnected: {}", payload);
					session.set_provider(None);
					session.set_state(ConnectorState::Disconnected);
					events.emit(WalletEventKind::Disconnected, INJECTED_CONNECTOR_NAME);
				}
			}

			hooks.emit(event, payload);
		})
	}

	fn teardown_session(&self) {
		self.provider_listeners
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
		self.session.set_provider(None);
	}

	/// Read the live chain id and store it.
	async fn read_chain_id(&self, provider: &dyn Provider) -> Result<String, ConnectorError> {
		let value = provider
			.request("eth_chainId", Vec::new())
			.await
			.map_err(|e| {
				error!("Failed to read chain id: {}", e);
				ConnectorError::from(e)
			})?;

		let chain = chain_id_from_value(&value).ok_or_else(|| {
			ProviderError::invalid_response("eth_chainId", format!("unexpected chain id {}", value))
		})?;
		self.session.set_chain(chain.clone());
		Ok(chain)
	}

	/// Switch, else add the chain from the registry and retry the switch exactly once.
	///
	/// `chain_id` may be decimal or `0x` hex; it is stored and looked up in decimal form.
	async fn switch_with(&self, provider: &dyn Provider, chain_id: &str) -> Result<(), ConnectorError> {
		let (Some(chain_id), Some(hex_chain_id)) = (normalize_chain_id(chain_id), to_hex_chain_id(chain_id))
		else {
			return Err(ConnectorError::UnsupportedChain {
				chain_id: chain_id.to_string(),
				source: None,
			});
		};
		let chain_id = chain_id.as_str();
		let params = vec![json!({ "chainId": hex_chain_id })];

		let switch_error = match provider.request(SWITCH_CHAIN_METHOD, params.clone()).await {
			Ok(_) => {
				self.session.set_chain(chain_id.to_string());
				info!("Switched to chain {}", chain_id);
				return Ok(());
			}
			Err(e) => e,
		};
		warn!("Error switching to chain {}: {}", chain_id, switch_error);

		let Some(payload) = self
			.context
			.registry
			.describe(chain_id)
			.and_then(|descriptor| descriptor.to_add_chain_parameter())
		else {
			error!("Chain {} has no descriptor to add it from", chain_id);
			return Err(ConnectorError::UnsupportedChain {
				chain_id: chain_id.to_string(),
				source: Some(switch_error),
			});
		};

		if switch_error.is_user_rejection() {
			return Err(switch_error.into());
		}

		info!("Asking wallet to add chain {} ({})", chain_id, payload.chain_name);
		provider
			.request(ADD_CHAIN_METHOD, vec![serde_json::to_value(&payload)?])
			.await
			.map_err(|e| {
				error!("Error adding chain {}: {}", chain_id, e);
				ConnectorError::from(e)
			})?;

		provider
			.request(SWITCH_CHAIN_METHOD, params)
			.await
			.map_err(|e| {
				error!("Switch to chain {} failed after adding it: {}", chain_id, e);
				ConnectorError::from(e)
			})?;

		self.session.set_chain(chain_id.to_string());
		info!("Added and switched to chain {}", chain_id);
		Ok(())
	}

	async fn establish_session(&self, options: &ConnectOptions) -> Result<(), ConnectorError> {
		let provider = self.detect_provider().await?;
		self.session.set_provider(Some(provider.clone()));
		self.attach_provider_listeners(&provider);

		let current = self.read_chain_id(provider.as_ref()).await?;
		if let Some(target) = options.chain_id.as_deref().filter(|t| !t.is_empty()) {
			let target = normalize_chain_id(target).unwrap_or_else(|| target.to_string());
			if target != current {
				self.switch_with(provider.as_ref(), &target).await?;
			}
		}

		self.context.last_used.save(self.name()).await?;
		Ok(())
	}
}

#[async_trait]
impl Connector for InjectedConnector {
	fn name(&self) -> &str {
		INJECTED_CONNECTOR_NAME
	}

	fn family(&self) -> &str {
		ETHEREUM_FAMILY
	}

	fn chain(&self) -> String {
		self.session.chain()
	}

	fn state(&self) -> ConnectorState {
		self.session.state()
	}

	fn is_connected(&self) -> bool {
		self.session.provider().is_some()
	}

	fn capabilities(&self) -> Capabilities {
		Capabilities::ALL
	}

	async fn get_provider(&self) -> Result<Arc<dyn Provider>, ConnectorError> {
		if let Some(provider) = self.session.provider() {
			return Ok(provider);
		}
		self.detect_provider().await
	}

	async fn get_account(&self) -> Result<Vec<String>, ConnectorError> {
		let provider = match self.get_provider().await {
			Ok(provider) => provider,
			Err(ConnectorError::ProviderUnavailable) => return Err(ConnectorError::WalletNotInstalled),
			Err(e) => return Err(e),
		};

		let result = provider
			.request("eth_requestAccounts", Vec::new())
			.await
			.map_err(|e| {
				error!("Account request failed: {}", e);
				ConnectorError::from(e)
			})?;

		let accounts: Vec<String> = serde_json::from_value(result)
			.map_err(|e| ProviderError::invalid_response("eth_requestAccounts", e.to_string()))?;
		if accounts.is_empty() {
			return Err(ConnectorError::AuthorizationDenied(
				"wallet returned no accounts".to_string(),
			));
		}
		Ok(accounts)
	}

	async fn get_chain_id(&self) -> Result<Option<String>, ConnectorError> {
		match self.session.provider() {
			Some(provider) => self.read_chain_id(provider.as_ref()).await.map(Some),
			None => Ok(None),
		}
	}

	async fn switch_chain(&self, chain_id: &str) -> Result<(), ConnectorError> {
		let _guard = self.operation_lock.lock().await;
		let provider = self.session.provider().ok_or(ConnectorError::NotConnected)?;

		let _switching = SwitchingChainGuard::enter(&self.session);
		self.switch_with(provider.as_ref(), chain_id).await
	}

	async fn connect(&self, options: ConnectOptions) -> Result<(), ConnectorError> {
		let _guard = self.operation_lock.lock().await;
		let previous = self.session.state();
		self.session.set_state(ConnectorState::Connecting);
		info!("Connecting {} connector", self.name());

		match self.establish_session(&options).await {
			Ok(()) => {
				self.session.set_state(ConnectorState::Connected);
				info!("Connected {} connector on chain {}", self.name(), self.session.chain());
				self.context
					.events
					.emit(WalletEventKind::Connected, self.name());
				Ok(())
			}
			Err(e) => {
				error!("Failed to connect {} connector: {}", self.name(), e);
				self.teardown_session();
				self.session.set_state(if previous == ConnectorState::Idle {
					ConnectorState::Idle
				} else {
					ConnectorState::Disconnected
				});
				Err(e)
			}
		}
	}

	async fn disconnect(&self) -> Result<(), ConnectorError> {
		let _guard = self.operation_lock.lock().await;
		self.teardown_session();
		if self.session.state() != ConnectorState::Idle {
			self.session.set_state(ConnectorState::Disconnected);
		}

		info!("Disconnected {} connector", self.name());
		self.context
			.events
			.emit(WalletEventKind::Disconnected, self.name());
		Ok(())
	}

	async fn resolve_did(&self, address: &str) -> Result<Option<String>, ConnectorError> {
		if self.get_chain_id().await?.as_deref() != Some(DID_CHAIN_ID) {
			return Ok(None);
		}

		let provider = self.get_provider().await?;
		ens::lookup_address(provider.as_ref(), address)
			.await
			.map_err(|e| {
				error!("Failed to resolve name of {}: {}", address, e);
				ConnectorError::from(e)
			})
	}

	async fn sign_message(&self, message: &str) -> Result<String, ConnectorError> {
		let provider = self.session.provider().ok_or(ConnectorError::NotConnected)?;

		let accounts = provider
			.request("eth_accounts", Vec::new())
			.await
			.map_err(ConnectorError::from)?;
		let accounts: Vec<String> = serde_json::from_value(accounts)
			.map_err(|e| ProviderError::invalid_response("eth_accounts", e.to_string()))?;
		let account = accounts.into_iter().next().ok_or(ConnectorError::NotConnected)?;

		let signature = provider
			.request(
				"personal_sign",
				vec![json!(hex_encode_message(message)), json!(account)],
			)
			.await
			.map_err(|e| {
				error!("Signing failed: {}", e);
				ConnectorError::from(e)
			})?;

		signature.as_str().map(str::to_string).ok_or_else(|| {
			ConnectorError::from(ProviderError::invalid_response(
				"personal_sign",
				"expected a hex signature",
			))
		})
	}

	fn on_provider_event(&self, event: ProviderEvent, listener: ProviderListener) -> ListenerHandle {
		self.hooks.add(event, listener)
	}
}
