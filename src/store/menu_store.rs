//! Transactional in-memory menu database with change notification.
//!
//! The published tables live in a `watch` channel. A transaction works on a
//! private copy, writes the snapshot file when the store is file-backed, and
//! only then publishes the copy, so readers never observe a partial batch and
//! a failed commit leaves the published tables untouched.

use crate::store::tables::MenuTables;
use crate::sync::engine::LocalStore;
use crate::sync::job::Mutation;
use crate::sync::types::TransactionError;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

const SNAPSHOT_FILE: &str = "menu.json";

pub struct MenuStore {
	tables: watch::Sender<MenuTables>,
	snapshot_path: Option<PathBuf>,
	/// Serializes transactions so each one starts from the previous commit.
	commit_lock: Mutex<()>,
}

impl MenuStore {
	/// Store without persistence.
	pub fn in_memory() -> Self {
		Self::with_tables(MenuTables::default(), None)
	}

	/// Open the store in `data_dir`, restoring the last committed snapshot.
	pub async fn open(data_dir: &Path) -> Result<Self, TransactionError> {
		tokio::fs::create_dir_all(data_dir).await?;
		let path = data_dir.join(SNAPSHOT_FILE);

		let tables = match tokio::fs::read_to_string(&path).await {
			Ok(content) => {
				let tables: MenuTables = serde_json::from_str(&content)?;
				info!(
					"Restored menu snapshot from {:?}: {} dishes, {} dish types",
					path,
					tables.dishes.len(),
					tables.dish_types.len()
				);
				tables
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				info!("No menu snapshot at {:?}, starting empty", path);
				MenuTables::default()
			}
			Err(e) => return Err(e.into()),
		};

		Ok(Self::with_tables(tables, Some(path)))
	}

	fn with_tables(tables: MenuTables, snapshot_path: Option<PathBuf>) -> Self {
		let (tables, _) = watch::channel(tables);
		Self {
			tables,
			snapshot_path,
			commit_lock: Mutex::new(()),
		}
	}

	/// Copy of the currently published tables.
	pub fn snapshot(&self) -> MenuTables {
		self.tables.borrow().clone()
	}

	/// Live projection of the tables.
	///
	/// Emits the current projection right away and then every time a commit
	/// changes it. `select` returning `None` suppresses emission until the
	/// projection exists again.
	pub fn watch<T, F>(&self, select: F) -> BoxStream<'static, T>
	where
		T: Clone + PartialEq + Send + 'static,
		F: Fn(&MenuTables) -> Option<T> + Send + Sync + 'static,
	{
		let receiver = self.tables.subscribe();
		let select = Arc::new(select);

		stream::unfold(
			(receiver, None::<T>, true),
			move |(mut receiver, mut last, mut first)| {
				let select = select.clone();
				async move {
					loop {
						if !first && receiver.changed().await.is_err() {
							return None;
						}
						first = false;

						let next = select(&receiver.borrow_and_update());
						if let Some(value) = next {
							if last.as_ref() != Some(&value) {
								last = Some(value.clone());
								return Some((value, (receiver, last, first)));
							}
						}
					}
				}
			},
		)
		.boxed()
	}

	async fn persist(&self, path: &Path, tables: &MenuTables) -> Result<(), TransactionError> {
		let content = serde_json::to_string(tables)?;
		let tmp = path.with_extension("json.tmp");
		tokio::fs::write(&tmp, content).await?;
		tokio::fs::rename(&tmp, path).await?;
		debug!("Wrote menu snapshot to {:?}", path);
		Ok(())
	}
}

#[async_trait::async_trait]
impl LocalStore for MenuStore {
	type Tables = MenuTables;

	async fn transaction(
		&self,
		body: Mutation<MenuTables>,
	) -> Result<(), TransactionError> {
		let _guard = self.commit_lock.lock().await;

		let mut staged = self.snapshot();
		body(&mut staged);

		if let Some(path) = &self.snapshot_path {
			self.persist(path, &staged).await?;
		}

		let changed = self.tables.send_if_modified(|current| {
			if *current == staged {
				return false;
			}
			*current = staged;
			true
		});
		debug!("Transaction committed (changed: {})", changed);
		Ok(())
	}
}
