use std::sync::Arc;
use tracing::{error, info, warn};

use wallet01::connector::{ConnectOptions, Connector, ConnectorContext, InjectedConnector};
use wallet01::events::EventBus;
use wallet01::persistence::{FileLastUsedConnectorRepository, LastUsedConnectorRepository};
use wallet01::provider::HttpDetector;
use wallet01::{ConnectionStore, WalletConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting wallet01");

	let config = match WalletConfig::from_env().and_then(|config| {
		config.validate()?;
		Ok(config)
	}) {
		Ok(config) => config,
		Err(e) => {
			error!("Invalid configuration: {}", e);
			return;
		}
	};

	let registry = match config.load_registry() {
		Ok(registry) => registry,
		Err(e) => {
			error!("Failed to load chains: {}", e);
			return;
		}
	};
	info!("Loaded {} chains", registry.len());

	let events = EventBus::with_capacity(config.event_capacity);
	let last_used = Arc::new(FileLastUsedConnectorRepository::in_dir(&config.data_dir));
	match last_used.load().await {
		Ok(Some(name)) => info!("Last used connector: {}", name),
		Ok(None) => info!("No previously used connector"),
		Err(e) => warn!("Could not read last used connector: {}", e),
	}

	let detector = Arc::new(HttpDetector::new(
		config.provider_url.clone(),
		config.request_timeout,
	));
	let connector: Arc<dyn Connector> = Arc::new(InjectedConnector::new(
		config.default_chain.clone(),
		detector,
		ConnectorContext::new(Arc::new(registry), events.clone(), last_used),
	));

	let store = Arc::new(ConnectionStore::new(config.store_config()));
	store.register_connectors([connector.clone()]);
	let event_sync = store.spawn_event_sync(&events);

	let address = match store
		.connect(&connector, ConnectOptions::on_chain(config.default_chain.clone()))
		.await
	{
		Ok(address) => address,
		Err(e) => {
			error!("Failed to connect wallet at {}: {}", config.provider_url, e);
			return;
		}
	};
	info!("Connected {} on chain {}", address, connector.chain());

	match store.resolve_did(&address).await {
		Ok(Some(name)) => info!("Name of {}: {}", address, name),
		Ok(None) => info!("No name registered for {}", address),
		Err(e) => warn!("Name lookup failed: {}", e),
	}

	if let Some(target) = std::env::args().nth(1) {
		match store.switch_chain(&target).await {
			Ok(address) => info!("Now on chain {} as {}", connector.chain(), address),
			Err(e) => error!("Failed to switch to chain {}: {}", target, e),
		}
	}

	if let Err(e) = store.disconnect().await {
		error!("Failed to disconnect: {}", e);
	}
	event_sync.abort();
	info!("Done");
}
