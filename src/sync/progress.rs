//! Progress tracking for a single sync batch.
//!
//! The tracker records which resources were skipped by the digest check and
//! which were refreshed, and produces the [`SyncReport`] returned to callers.

use crate::sync::types::ResourceKey;

use serde::Serialize;
use tracing::info;

/// Records the decisions made for the jobs of one batch
#[derive(Debug, Clone, Default)]
pub struct BatchTracker {
	jobs: usize,
	skipped: Vec<ResourceKey>,
	refreshed: Vec<&'static str>,
	digests_persisted: usize,
	digests_failed: usize,
}

impl BatchTracker {
	pub fn new(jobs: usize) -> Self {
		Self {
			jobs,
			..Default::default()
		}
	}

	pub fn record_skipped(&mut self, key: ResourceKey) {
		self.skipped.push(key);
	}

	pub fn record_refreshed(&mut self, name: &'static str) {
		self.refreshed.push(name);
	}

	pub fn record_digest(&mut self, persisted: bool) {
		if persisted {
			self.digests_persisted += 1;
		} else {
			self.digests_failed += 1;
		}
	}

	pub fn log_progress(&self) {
		info!(
			"Batch progress: {} of {} jobs refreshed, {} unchanged",
			self.refreshed.len(),
			self.jobs,
			self.skipped.len()
		);
	}

	pub fn get_report(&self) -> SyncReport {
		SyncReport {
			jobs: self.jobs,
			refreshed: self.refreshed.clone(),
			skipped: self.skipped.clone(),
			digests_persisted: self.digests_persisted,
			digests_failed: self.digests_failed,
		}
	}
}

/// Outcome of a successful batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
	pub jobs: usize,
	/// Names of the resources whose mutations were committed.
	pub refreshed: Vec<&'static str>,
	/// Keys of digest-gated resources that were unchanged.
	pub skipped: Vec<ResourceKey>,
	pub digests_persisted: usize,
	/// Digests that could not be written after the commit. These resources
	/// will simply be fetched again next time.
	pub digests_failed: usize,
}

impl SyncReport {
	pub fn is_noop(&self) -> bool {
		self.refreshed.is_empty()
	}

	pub fn summary(&self) -> String {
		format!(
			"{} jobs: {} refreshed, {} unchanged{}",
			self.jobs,
			self.refreshed.len(),
			self.skipped.len(),
			if self.digests_failed == 0 {
				String::new()
			} else {
				format!(" ({} digests not persisted)", self.digests_failed)
			}
		)
	}
}
