//! Multi-step connection flows.
//!
//! Each flow that mutates the connection state holds the store's flow lock from its first
//! precondition check to its last write, so two flows never interleave their intermediate
//! writes. Provider-facing steps are bounded by `StoreConfig::operation_timeout` when set.

use super::state::same_connector;
use super::{ConnectionStore, StoreError};
use crate::connector::{ConnectOptions, Connector, ConnectorError};

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl ConnectionStore {
    /// Run one provider-facing step under the configured timeout.
    async fn timed<T>(
        &self,
        step: &'static str,
        future: impl Future<Output = Result<T, ConnectorError>>,
    ) -> Result<T, StoreError> {
        let Some(limit) = self.config.operation_timeout else {
            return future.await.map_err(StoreError::from);
        };
        match tokio::time::timeout(limit, future).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                warn!("Wallet step {} timed out after {:?}", step, limit);
                Err(StoreError::Timeout(limit))
            }
        }
    }

    pub(super) async fn first_account(&self, connector: &Arc<dyn Connector>) -> Result<String, StoreError> {
        let accounts = self.timed("get_account", connector.get_account()).await?;
        accounts.into_iter().next().ok_or_else(|| {
            StoreError::Connector(ConnectorError::AuthorizationDenied(
                "wallet returned no accounts".to_string(),
            ))
        })
    }

    /// Drop a session left behind by a flow that failed after the connector connected.
    async fn roll_back(&self, connector: &Arc<dyn Connector>) {
        if let Err(e) = connector.disconnect().await {
            warn!("Failed to roll back {} session: {}", connector.name(), e);
        }
    }

    /// Drop the connected flag and address when `connector` is the active connector.
    ///
    /// A failed reconnect tears down the session the store still published as connected.
    fn release_if_active(&self, connector: &Arc<dyn Connector>) {
        self.state.send_if_modified(|state| {
            let is_active = state
                .active
                .as_ref()
                .is_some_and(|active| same_connector(active, connector));
            if !is_active {
                return false;
            }
            state.connected = false;
            state.address = None;
            warn!("Connection through {} lost by a failed reconnect", connector.name());
            true
        });
    }

    /// Connect `connector` and make it the active connector.
    ///
    /// Nothing in the store changes unless both the connector's connect and the account request
    /// succeed; the new active connector, address and connected flag are then published in one
    /// update. The exception is a failed reconnect of the active connector, whose session is gone
    /// afterwards: its connection is released. Returns the active address.
    pub async fn connect(
        &self,
        connector: &Arc<dyn Connector>,
        options: ConnectOptions,
    ) -> Result<String, StoreError> {
        let _flow = self.flow_lock.lock().await;
        if !self.state.borrow().is_registered(connector) {
            return Err(StoreError::UnknownConnector(connector.name().to_string()));
        }

        info!("Connecting wallet through {}", connector.name());
        if let Err(e) = self.timed("connect", connector.connect(options)).await {
            if matches!(e, StoreError::Timeout(_)) {
                self.roll_back(connector).await;
            }
            self.release_if_active(connector);
            return Err(e);
        }

        let address = match self.first_account(connector).await {
            Ok(address) => address,
            Err(e) => {
                self.roll_back(connector).await;
                self.release_if_active(connector);
                return Err(e);
            }
        };

        self.state.send_modify(|state| {
            state.active = Some(connector.clone());
            state.address = Some(address.clone());
            state.connected = true;
        });
        info!("Wallet connected through {} as {}", connector.name(), address);
        Ok(address)
    }

    /// Connect the registered connector called `name`.
    pub async fn connect_by_name(
        &self,
        name: &str,
        options: ConnectOptions,
    ) -> Result<String, StoreError> {
        let connector = self
            .connector(name)
            .ok_or_else(|| StoreError::UnknownConnector(name.to_string()))?;
        self.connect(&connector, options).await
    }

    /// Disconnect the active connector and clear the connection.
    ///
    /// A no-op without an active connector.
    pub async fn disconnect(&self) -> Result<(), StoreError> {
        let _flow = self.flow_lock.lock().await;
        let Some(active) = self.active_connector() else {
            debug!("Disconnect requested without an active connector");
            return Ok(());
        };

        self.state.send_modify(|state| state.connected = false);
        self.set_address(None);
        self.timed("disconnect", active.disconnect()).await?;
        self.clear_active_connector();
        info!("Wallet disconnected from {}", active.name());
        Ok(())
    }

    /// Switch the active connector to `chain_id` and refresh the address.
    ///
    /// Preconditions are checked before anything is written. The connected flag is dropped for the
    /// duration of the switch and stays dropped, with the previous address, when the switch fails.
    /// Returns the address active on the new chain.
    pub async fn switch_chain(&self, chain_id: &str) -> Result<String, StoreError> {
        let _flow = self.flow_lock.lock().await;
        let active = self.require_active()?;
        if !active.capabilities().switch_chain {
            return Err(StoreError::Unsupported {
                connector: active.name().to_string(),
                operation: "switch_chain",
            });
        }

        info!("Switching {} to chain {}", active.name(), chain_id);
        self.state.send_modify(|state| state.connected = false);

        self.timed("switch_chain", active.switch_chain(chain_id))
            .await?;

        let address = self.first_account(&active).await?;
        self.set_address(Some(address.clone()));
        self.set_is_connected(true)?;
        info!("Switched to chain {} as {}", chain_id, address);
        Ok(address)
    }

    /// Sign `message` with the active account.
    pub async fn sign_message(&self, message: &str) -> Result<String, StoreError> {
        let active = self.require_active()?;
        if !active.capabilities().sign_message {
            return Err(StoreError::Unsupported {
                connector: active.name().to_string(),
                operation: "sign_message",
            });
        }
        self.timed("sign_message", active.sign_message(message)).await
    }

    /// Reverse-resolve `address` through the active connector.
    pub async fn resolve_did(&self, address: &str) -> Result<Option<String>, StoreError> {
        let active = self.require_active()?;
        if !active.capabilities().resolve_did {
            return Ok(None);
        }
        self.timed("resolve_did", active.resolve_did(address)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::ChainRegistry;
    use crate::connector::{Capabilities, ConnectorState};
    use crate::provider::{ListenerHandle, Provider, ProviderEvent, ProviderListener};
    use crate::store::StoreConfig;
    use crate::testing::{Harness, MockProvider, WalletSim, polygon};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";

    /// Connector that can connect but not switch chains.
    struct FixedChainConnector {
        connected: AtomicBool,
    }

    #[async_trait]
    impl Connector for FixedChainConnector {
        fn name(&self) -> &str {
            "fixed"
        }

        fn family(&self) -> &str {
            "ethereum"
        }

        fn chain(&self) -> String {
            "1".to_string()
        }

        fn state(&self) -> ConnectorState {
            if self.is_connected() {
                ConnectorState::Connected
            } else {
                ConnectorState::Idle
            }
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                switch_chain: false,
                sign_message: false,
                resolve_did: false,
            }
        }

        async fn get_provider(&self) -> Result<Arc<dyn Provider>, ConnectorError> {
            Err(ConnectorError::ProviderUnavailable)
        }

        async fn get_account(&self) -> Result<Vec<String>, ConnectorError> {
            Ok(vec![BOB.to_string()])
        }

        async fn get_chain_id(&self) -> Result<Option<String>, ConnectorError> {
            Ok(self.is_connected().then(|| "1".to_string()))
        }

        async fn connect(&self, _options: ConnectOptions) -> Result<(), ConnectorError> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ConnectorError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn on_provider_event(&self, event: ProviderEvent, _listener: ProviderListener) -> ListenerHandle {
            ListenerHandle::detached(event)
        }
    }

    fn store_with(harness: &Harness, config: StoreConfig) -> (ConnectionStore, Arc<dyn Connector>) {
        let connector: Arc<dyn Connector> = harness.connector.clone();
        let store = ConnectionStore::new(config);
        store.register_connectors([connector.clone()]);
        (store, connector)
    }

    fn registry_with_polygon() -> ChainRegistry {
        let mut registry = ChainRegistry::with_defaults();
        registry.register(polygon());
        registry
    }

    #[tokio::test]
    async fn test_connect_on_mainnet() {
        let harness = Harness::new(WalletSim::new("1", &[ALICE, BOB]), ChainRegistry::with_defaults());
        let descriptor = ChainRegistry::with_defaults().describe("1").cloned().unwrap();
        assert_eq!(descriptor.display_name, "Ethereum");
        assert_eq!(descriptor.ticker, "ETH");
        let (store, connector) = store_with(&harness, StoreConfig::default());

        let address = store
            .connect(&connector, ConnectOptions::on_chain("1"))
            .await
            .unwrap();

        assert_eq!(address, ALICE);
        assert!(store.is_connected());
        assert_eq!(store.address().as_deref(), Some(ALICE));
        assert_eq!(store.snapshot().active_name(), Some("injected"));
        assert_eq!(harness.provider.count("wallet_switchEthereumChain"), 0);
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_store_untouched() {
        let mut sim = WalletSim::new("1", &[ALICE]);
        sim.reject_accounts = true;
        let harness = Harness::new(sim, ChainRegistry::with_defaults());
        let (store, connector) = store_with(&harness, StoreConfig::default());

        let err = store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Connector(ConnectorError::AuthorizationDenied(_))
        ));
        assert!(!store.is_connected());
        assert!(store.active_connector().is_none());
        assert!(store.address().is_none());
        assert!(!connector.is_connected());
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_failed_reconnect_releases_connection() {
        let harness = Harness::new(WalletSim::new("1", &[ALICE]), ChainRegistry::with_defaults());
        let (store, connector) = store_with(&harness, StoreConfig::default());
        store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap();

        let err = store
            .connect(&connector, ConnectOptions::on_chain("999"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Connector(ConnectorError::UnsupportedChain { .. })
        ));
        assert!(!connector.is_connected());
        assert!(!store.is_connected());
        assert!(store.address().is_none());
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_reconnect_with_denied_accounts_releases_connection() {
        let harness = Harness::new(WalletSim::new("1", &[ALICE]), ChainRegistry::with_defaults());
        let (store, connector) = store_with(&harness, StoreConfig::default());
        store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap();
        harness.sim.lock().unwrap().reject_accounts = true;

        let err = store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Connector(ConnectorError::AuthorizationDenied(_))
        ));
        assert!(!connector.is_connected());
        assert!(!store.is_connected());
        assert!(store.address().is_none());
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_timed_out_switch_leaves_connector_connected() {
        let (provider, sim) = MockProvider::wallet_with_delay(
            WalletSim::new("1", &[ALICE]).knowing(&["137"]),
            Duration::from_millis(50),
        );
        let harness = Harness::with_provider(provider, sim, ChainRegistry::with_defaults());
        let (store, connector) = store_with(&harness, StoreConfig::default());
        store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap();

        let store = ConnectionStore::new(StoreConfig::with_operation_timeout(Duration::from_millis(10)));
        store.register_connectors([connector.clone()]);
        store.set_active_connector(&connector).unwrap();
        store.set_is_connected(true).unwrap();

        let err = store.switch_chain("137").await.unwrap_err();

        assert!(matches!(err, StoreError::Timeout(_)));
        assert_eq!(connector.state(), ConnectorState::Connected);
        assert!(connector.is_connected());
        assert!(!store.is_connected());
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_connect_requires_registration() {
        let harness = Harness::new(WalletSim::new("1", &[ALICE]), ChainRegistry::with_defaults());
        let connector: Arc<dyn Connector> = harness.connector.clone();
        let store = ConnectionStore::default();

        let err = store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownConnector(_)));

        let err = store
            .connect_by_name("injected", ConnectOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownConnector(_)));
        assert!(harness.provider.methods().is_empty());
    }

    #[tokio::test]
    async fn test_switch_chain_refreshes_address() {
        let harness = Harness::new(WalletSim::new("1", &[ALICE]), registry_with_polygon());
        let (store, _) = store_with(&harness, StoreConfig::default());
        store
            .connect_by_name("injected", ConnectOptions::default())
            .await
            .unwrap();
        harness.sim.lock().unwrap().accounts = vec![BOB.to_string()];

        let address = store.switch_chain("137").await.unwrap();

        assert_eq!(address, BOB);
        assert_eq!(store.address().as_deref(), Some(BOB));
        assert!(store.is_connected());
        assert_eq!(harness.connector.chain(), "137");
        assert_eq!(harness.provider.count("wallet_addEthereumChain"), 1);
        assert_eq!(harness.provider.count("wallet_switchEthereumChain"), 2);
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_switch_to_unregistered_chain() {
        let harness = Harness::new(WalletSim::new("1", &[ALICE]), ChainRegistry::with_defaults());
        let (store, _) = store_with(&harness, StoreConfig::default());
        store
            .connect_by_name("injected", ConnectOptions::default())
            .await
            .unwrap();

        let err = store.switch_chain("137").await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Connector(ConnectorError::UnsupportedChain { .. })
        ));
        assert_eq!(harness.provider.count("wallet_addEthereumChain"), 0);
        assert!(!store.is_connected());
        assert_eq!(store.address().as_deref(), Some(ALICE));
        assert_eq!(harness.connector.chain(), "1");
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_switch_preconditions() {
        let store = ConnectionStore::default();
        assert!(matches!(
            store.switch_chain("137").await,
            Err(StoreError::NotConnected)
        ));

        let fixed: Arc<dyn Connector> = Arc::new(FixedChainConnector {
            connected: AtomicBool::new(false),
        });
        store.register_connectors([fixed.clone()]);
        store.connect(&fixed, ConnectOptions::default()).await.unwrap();
        assert_eq!(store.address().as_deref(), Some(BOB));

        let err = store.switch_chain("137").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Unsupported {
                operation: "switch_chain",
                ..
            }
        ));
        // Nothing was written.
        assert!(store.is_connected());
        assert!(matches!(
            store.sign_message("hi").await,
            Err(StoreError::Unsupported { .. })
        ));
        assert_eq!(store.resolve_did(BOB).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_switches_are_serialized() {
        let (provider, sim) = MockProvider::wallet_with_delay(
            WalletSim::new("1", &[ALICE]).knowing(&["137", "10"]),
            Duration::from_millis(5),
        );
        let harness = Harness::with_provider(provider, sim, ChainRegistry::with_defaults());
        let (store, _) = store_with(&harness, StoreConfig::default());
        store
            .connect_by_name("injected", ConnectOptions::default())
            .await
            .unwrap();
        let connect_calls = harness.provider.methods().len();

        let (first, second) = tokio::join!(store.switch_chain("137"), store.switch_chain("10"));
        first.unwrap();
        second.unwrap();

        let flow_calls: Vec<String> = harness.provider.methods()[connect_calls..].to_vec();
        assert_eq!(
            flow_calls,
            vec![
                "wallet_switchEthereumChain",
                "eth_requestAccounts",
                "wallet_switchEthereumChain",
                "eth_requestAccounts",
            ]
        );
        let switches = harness.provider.params_of("wallet_switchEthereumChain");
        let last_target = switches[1][0]["chainId"].as_str().unwrap().to_string();
        let expected_chain = if last_target == "0x89" { "137" } else { "10" };
        assert_eq!(harness.connector.chain(), expected_chain);
        assert_eq!(harness.wallet_chain(), expected_chain);
        assert!(store.is_connected());
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_connect_times_out() {
        let (provider, sim) = MockProvider::wallet_with_delay(
            WalletSim::new("1", &[ALICE]),
            Duration::from_millis(200),
        );
        let harness = Harness::with_provider(provider, sim, ChainRegistry::with_defaults());
        let (store, connector) = store_with(
            &harness,
            StoreConfig::with_operation_timeout(Duration::from_millis(20)),
        );

        let err = store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(!store.is_connected());
        assert!(!connector.is_connected());
        assert!(store.is_consistent());
    }

    #[tokio::test]
    async fn test_disconnect_clears_connection() {
        let harness = Harness::new(WalletSim::new("1", &[ALICE]), ChainRegistry::with_defaults());
        let (store, connector) = store_with(&harness, StoreConfig::default());

        // Without an active connector this is a no-op.
        store.disconnect().await.unwrap();

        store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap();
        store.disconnect().await.unwrap();

        assert!(!store.is_connected());
        assert!(store.address().is_none());
        assert!(store.active_connector().is_none());
        assert!(!connector.is_connected());
        assert_eq!(store.connectors().len(), 1);
        assert!(matches!(
            store.sign_message("hi").await,
            Err(StoreError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_invariant_holds_across_operations() {
        let mut sim = WalletSim::new("1", &[ALICE]);
        sim.reject_switch = true;
        let harness = Harness::new(sim, registry_with_polygon());
        let (store, connector) = store_with(&harness, StoreConfig::default());
        assert!(store.is_consistent());

        store
            .connect(&connector, ConnectOptions::default())
            .await
            .unwrap();
        assert!(store.is_consistent());

        assert!(store.switch_chain("137").await.is_err());
        assert!(store.is_consistent());

        harness.sim.lock().unwrap().reject_switch = false;
        store.switch_chain("137").await.unwrap();
        assert!(store.is_consistent());

        assert_eq!(store.sign_message("hi").await.unwrap(), "0xsigned6869");
        assert!(store.is_consistent());

        store.disconnect().await.unwrap();
        assert!(store.is_consistent());

        assert!(store.switch_chain("1").await.is_err());
        assert!(store.is_consistent());
    }
}
