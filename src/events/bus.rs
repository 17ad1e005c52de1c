use super::{WalletEvent, WalletEventKind};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Events buffered per subscriber before the slowest one starts lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Process-wide publish/subscribe channel for [`WalletEvent`]s.
///
/// Cloning the bus is cheap; every clone publishes into the same channel. Construct it once at
/// startup and hand clones to connectors and consumers.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<WalletEvent>,
	events_published: Arc<AtomicU64>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_EVENT_CAPACITY)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self {
			sender,
			events_published: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Publish an event without waiting for consumers.
	///
	/// Returns the number of subscribers the event was delivered to.
	pub fn emit(&self, kind: WalletEventKind, connector: &str) -> usize {
		self.events_published.fetch_add(1, Ordering::Relaxed);

		match self.sender.send(WalletEvent::new(kind, connector)) {
			Ok(receivers) => {
				debug!(event = %kind, connector, receivers, "Wallet event emitted");
				receivers
			}
			Err(_) => {
				debug!(event = %kind, connector, "Wallet event emitted with no subscribers");
				0
			}
		}
	}

	/// Subscribe to events published from now on.
	pub fn subscribe(&self) -> EventSubscription {
		EventSubscription {
			receiver: self.sender.subscribe(),
		}
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}

	/// Total number of events emitted, delivered or not.
	pub fn events_published(&self) -> u64 {
		self.events_published.load(Ordering::Relaxed)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}

/// Receiving side of an [`EventBus`] subscription. Dropping it unsubscribes.
pub struct EventSubscription {
	receiver: broadcast::Receiver<WalletEvent>,
}

impl EventSubscription {
	/// Wait for the next event.
	///
	/// Returns `None` once every bus handle has been dropped. Events lost because this
	/// subscriber fell behind are logged and skipped.
	pub async fn recv(&mut self) -> Option<WalletEvent> {
		loop {
			match self.receiver.recv().await {
				Ok(event) => return Some(event),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					warn!("Event subscriber lagged, {} events skipped", skipped);
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Take the next event if one is already queued.
	pub fn try_recv(&mut self) -> Option<WalletEvent> {
		loop {
			match self.receiver.try_recv() {
				Ok(event) => return Some(event),
				Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
					warn!("Event subscriber lagged, {} events skipped", skipped);
				}
				Err(_) => return None,
			}
		}
	}

	/// Drain every queued event.
	pub fn drain(&mut self) -> Vec<WalletEvent> {
		std::iter::from_fn(|| self.try_recv()).collect()
	}
}
