//! Durable mapping from resource key to the last observed content digest.
//!
//! The engine consults the store in its decide phase and writes to it only
//! after a batch has been committed. Every implementation serializes its own
//! operations, since batches for different scopes may run at the same time
//! and touch overlapping keys.

use crate::sync::types::{Digest, DigestStoreError, ResourceKey};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

const DIGEST_FILE: &str = "digests.json";

/// Repository for resource digests
#[async_trait::async_trait]
pub trait DigestStore: Send + Sync {
	/// Last stored digest for `key`, if any.
	async fn get(&self, key: &ResourceKey) -> Result<Option<Digest>, DigestStoreError>;

	/// Overwrite the stored digest for `key`.
	async fn put(&self, key: &ResourceKey, digest: &Digest) -> Result<(), DigestStoreError>;

	/// `true` if nothing is stored for `key` or the stored digest differs from `fresh`.
	async fn should_reload(
		&self,
		key: &ResourceKey,
		fresh: &Digest,
	) -> Result<bool, DigestStoreError> {
		Ok(self.get(key).await?.as_ref() != Some(fresh))
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DigestEntry {
	digest: Digest,
	stored_at: DateTime<Utc>,
}

/// File-based implementation of DigestStore.
///
/// Entries live in memory behind a mutex and are written through to a JSON
/// file on every `put`, so they survive restarts.
pub struct FileDigestStore {
	path: PathBuf,
	entries: Mutex<BTreeMap<ResourceKey, DigestEntry>>,
}

impl FileDigestStore {
	/// Open the digest file in `data_dir`, starting empty if it does not exist yet.
	pub async fn open(data_dir: &Path) -> Result<Self, DigestStoreError> {
		tokio::fs::create_dir_all(data_dir).await?;
		let path = data_dir.join(DIGEST_FILE);

		let entries = match tokio::fs::read_to_string(&path).await {
			Ok(content) => serde_json::from_str(&content)?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
			Err(e) => return Err(e.into()),
		};

		info!(
			"Opened digest store {:?} with {} entries",
			path,
			entries.len()
		);
		Ok(Self {
			path,
			entries: Mutex::new(entries),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn write(&self, entries: &BTreeMap<ResourceKey, DigestEntry>) -> Result<(), DigestStoreError> {
		let content = serde_json::to_string_pretty(entries)?;
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, content).await?;
		tokio::fs::rename(&tmp, &self.path).await?;
		Ok(())
	}
}

#[async_trait::async_trait]
impl DigestStore for FileDigestStore {
	async fn get(&self, key: &ResourceKey) -> Result<Option<Digest>, DigestStoreError> {
		let entries = self.entries.lock().await;
		Ok(entries.get(key).map(|entry| entry.digest.clone()))
	}

	async fn put(&self, key: &ResourceKey, digest: &Digest) -> Result<(), DigestStoreError> {
		// Held across the write so file order matches update order.
		let mut entries = self.entries.lock().await;
		let mut staged = entries.clone();
		staged.insert(
			key.clone(),
			DigestEntry {
				digest: digest.clone(),
				stored_at: Utc::now(),
			},
		);
		// Only a digest that reached the file becomes visible.
		self.write(&staged).await?;
		*entries = staged;
		debug!("Stored digest {} for {}", digest, key);
		Ok(())
	}
}

/// In-memory implementation of DigestStore
#[derive(Default)]
pub struct MemoryDigestStore {
	entries: Mutex<BTreeMap<ResourceKey, Digest>>,
}

impl MemoryDigestStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.entries.lock().await.len()
	}
}

#[async_trait::async_trait]
impl DigestStore for MemoryDigestStore {
	async fn get(&self, key: &ResourceKey) -> Result<Option<Digest>, DigestStoreError> {
		Ok(self.entries.lock().await.get(key).cloned())
	}

	async fn put(&self, key: &ResourceKey, digest: &Digest) -> Result<(), DigestStoreError> {
		self.entries.lock().await.insert(key.clone(), digest.clone());
		Ok(())
	}
}
