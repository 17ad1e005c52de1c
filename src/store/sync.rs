//! Keeping the store in step with wallet-initiated changes.
//!
//! Connectors publish `WalletEvent`s on the `EventBus` when the user acts in the wallet UI. The
//! store never hears from connectors directly; it re-queries the active connector when one of
//! those events concerns it.

use super::{ConnectionStore, StoreError};
use crate::events::{EventBus, WalletEvent, WalletEventKind};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

impl ConnectionStore {
    /// React to one bus event.
    ///
    /// - `disconnected` from the active connector clears the connection, provided the connector
    ///   really lost its session (a stale event after a reconnect is ignored).
    /// - `account-changed` re-reads the account list of the active connector.
    /// - `chain-changed` republishes the snapshot so subscribers can re-read the chain.
    pub async fn handle_event(&self, event: &WalletEvent) -> Result<(), StoreError> {
        let _flow = self.flow_lock.lock().await;
        let Some(active) = self.active_connector() else {
            debug!("Ignoring {} event without an active connector", event.kind);
            return Ok(());
        };
        if active.name() != event.connector {
            debug!("Ignoring {} event from inactive {}", event.kind, event.connector);
            return Ok(());
        }

        match event.kind {
            WalletEventKind::Disconnected => {
                if active.is_connected() {
                    return Ok(());
                }
                info!("Wallet session of {} ended, clearing connection", active.name());
                self.state.send_modify(|state| {
                    state.connected = false;
                    state.address = None;
                    state.active = None;
                });
            }
            WalletEventKind::AccountChanged => {
                if !self.is_connected() {
                    return Ok(());
                }
                let address = self.first_account(&active).await?;
                info!("Active account is now {}", address);
                self.set_address(Some(address));
            }
            WalletEventKind::ChainChanged => {
                debug!("Chain of {} is now {}", active.name(), active.chain());
                self.state.send_modify(|_| {});
            }
            WalletEventKind::Connected => {}
        }
        Ok(())
    }

    /// Follow `events` in a background task until the bus closes.
    pub fn spawn_event_sync(self: &Arc<Self>, events: &EventBus) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut subscription = events.subscribe();

        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if let Err(e) = store.handle_event(&event).await {
                    warn!("Failed to apply {} event: {}", event.kind, e);
                }
            }
            debug!("Event bus closed, stopping event sync");
        })
    }
}
