//! Persistence of the last used connector.
//!
//! Every successful connect records the connector name so startup logic can offer to reconnect.
//! The record lives outside the process; this module only defines the write/read hook and two
//! repositories for it.

/// Repository trait and its file and in-memory implementations
pub mod repositories;

pub use repositories::*;

/// Errors raised while reading or writing persisted state
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
