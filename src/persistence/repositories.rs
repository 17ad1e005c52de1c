use super::PersistenceError;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Repository for the name of the last successfully connected connector
#[async_trait::async_trait]
pub trait LastUsedConnectorRepository: Send + Sync {
	async fn save(&self, connector: &str) -> Result<(), PersistenceError>;
	async fn load(&self) -> Result<Option<String>, PersistenceError>;
	async fn clear(&self) -> Result<(), PersistenceError>;
}

/// On-disk layout of the last used connector record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LastUsedConnectorRecord {
	connector: String,
	updated_at: String,
}

/// File-based implementation of LastUsedConnectorRepository
pub struct FileLastUsedConnectorRepository {
	path: PathBuf,
}

impl FileLastUsedConnectorRepository {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}

	/// Repository storing `last_used_connector.json` inside `data_dir`.
	pub fn in_dir(data_dir: &Path) -> Self {
		Self::new(data_dir.join("last_used_connector.json"))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[async_trait::async_trait]
impl LastUsedConnectorRepository for FileLastUsedConnectorRepository {
	async fn save(&self, connector: &str) -> Result<(), PersistenceError> {
		let record = LastUsedConnectorRecord {
			connector: connector.to_string(),
			updated_at: chrono::Utc::now().to_rfc3339(),
		};

		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await?;
			}
		}
		tokio::fs::write(&self.path, serde_json::to_string_pretty(&record)?).await?;

		info!("Saved last used connector {} to {:?}", connector, self.path);
		Ok(())
	}

	async fn load(&self) -> Result<Option<String>, PersistenceError> {
		let content = match tokio::fs::read_to_string(&self.path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		let record: LastUsedConnectorRecord = serde_json::from_str(&content)?;

		debug!(
			"Loaded last used connector {} (updated at {})",
			record.connector, record.updated_at
		);
		Ok(Some(record.connector))
	}

	async fn clear(&self) -> Result<(), PersistenceError> {
		match tokio::fs::remove_file(&self.path).await {
			Ok(()) => {
				info!("Removed last used connector record {:?}", self.path);
				Ok(())
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

/// In-memory implementation of LastUsedConnectorRepository
#[derive(Default)]
pub struct InMemoryLastUsedConnectorRepository {
	value: Mutex<Option<String>>,
}

impl InMemoryLastUsedConnectorRepository {
	pub fn new() -> Self {
		Self::default()
	}

	/// Current value without going through the async trait.
	pub fn get(&self) -> Option<String> {
		self.value
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}
}

#[async_trait::async_trait]
impl LastUsedConnectorRepository for InMemoryLastUsedConnectorRepository {
	async fn save(&self, connector: &str) -> Result<(), PersistenceError> {
		*self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(connector.to_string());
		Ok(())
	}

	async fn load(&self) -> Result<Option<String>, PersistenceError> {
		Ok(self.get())
	}

	async fn clear(&self) -> Result<(), PersistenceError> {
		*self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
		Ok(())
	}
}
