//! Sync engine: decide, fetch, commit.
//!
//! This module defines the `SyncEngine`, which runs a batch of [`Job`]s against
//! a [`DigestStore`] and a [`LocalStore`]. A batch is all-or-nothing:
//!
//! 1. Decide. Every digest-gated job probes its remote digest and is dropped
//!    when the digest store already holds it. Unconditional jobs always pass.
//! 2. Fetch and convert every surviving job, producing deferred mutations.
//! 3. Apply all mutations inside one store transaction, then persist the new
//!    digests.
//!
//! Any failure in phases 1 and 2 aborts the batch before the transaction is
//! opened, so nothing is written and no digest moves. Digests are persisted
//! only after the commit; losing them costs a redundant refetch, never a
//! missed update.

use crate::sync::digest_store::DigestStore;
use crate::sync::events::{EventDispatcher, SyncEvent};
use crate::sync::job::{Job, Mutation};
use crate::sync::progress::{BatchTracker, SyncReport};
use crate::sync::types::{Digest, ResourceKey, SyncError, TransactionError};

use futures::{StreamExt, TryStreamExt, stream};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The local store's transaction primitive.
#[async_trait::async_trait]
pub trait LocalStore: Send + Sync {
	/// The mutable view handed to mutations inside a transaction.
	type Tables: Send + 'static;

	/// Run `body` atomically. If this fails, none of its writes are visible.
	async fn transaction(
		&self,
		body: Mutation<Self::Tables>,
	) -> Result<(), TransactionError>;
}

/// Configuration for the sync engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	/// Upper bound on jobs probing or fetching at the same time.
	pub max_concurrency: usize,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self { max_concurrency: 16 }
	}
}

enum Decision {
	Skip(ResourceKey),
	Refresh(Option<(ResourceKey, Digest)>),
}

/// Runs sync batches against a digest store and a local store.
pub struct SyncEngine<D, L> {
	digests: Arc<D>,
	store: Arc<L>,
	config: SyncConfig,
	dispatcher: EventDispatcher,
}

impl<D, L> SyncEngine<D, L>
where
	D: DigestStore,
	L: LocalStore,
{
	pub fn new(digests: Arc<D>, store: Arc<L>, config: SyncConfig) -> Self {
		Self {
			digests,
			store,
			config,
			dispatcher: EventDispatcher::new(),
		}
	}

	pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
		self.dispatcher = dispatcher;
		self
	}

	pub fn digests(&self) -> &Arc<D> {
		&self.digests
	}

	/// Run one batch. Either every surviving job is committed, or nothing is.
	pub async fn run(&self, jobs: Vec<Job<L::Tables>>) -> Result<SyncReport, SyncError> {
		info!("Starting sync batch of {} jobs", jobs.len());
		self.dispatcher
			.dispatch(&SyncEvent::BatchStarted { jobs: jobs.len() })
			.await;

		match self.run_batch(&jobs).await {
			Ok(report) => {
				info!("Sync batch completed: {}", report.summary());
				self.dispatcher
					.dispatch(&SyncEvent::BatchCommitted {
						report: report.clone(),
					})
					.await;
				Ok(report)
			}
			Err(e) => {
				error!("Sync batch aborted: {}", e);
				self.dispatcher
					.dispatch(&SyncEvent::BatchFailed {
						error: e.to_string(),
					})
					.await;
				Err(e)
			}
		}
	}

	async fn run_batch(&self, jobs: &[Job<L::Tables>]) -> Result<SyncReport, SyncError> {
		let mut tracker = BatchTracker::new(jobs.len());
		let limit = self.config.max_concurrency.max(1);

		// Phase 1: decide. The first error drops every in-flight probe.
		let decisions: Vec<Decision> = stream::iter(jobs.iter().map(|job| self.decide(job)))
			.buffered(limit)
			.try_collect()
			.await?;

		let mut survivors = Vec::new();
		let mut skipped = Vec::new();
		for (job, decision) in jobs.iter().zip(decisions) {
			match decision {
				Decision::Skip(key) => {
					debug!("{} unchanged, skipping", key);
					skipped.push(key);
				}
				Decision::Refresh(pending_digest) => survivors.push((job, pending_digest)),
			}
		}

		// Phase 2: fetch and convert.
		let mutations: Vec<Mutation<L::Tables>> =
			stream::iter(survivors.iter().map(|(job, _)| job.refresh()))
				.buffered(limit)
				.try_collect()
				.await?;

		// Phase 3: one transaction for the whole batch.
		if !mutations.is_empty() {
			info!("Committing {} mutations", mutations.len());
			self.store
				.transaction(Box::new(move |tables: &mut L::Tables| {
					for mutation in mutations {
						mutation(tables);
					}
				}))
				.await?;
		}

		// Per-resource events only describe batches that went through.
		for key in skipped {
			self.dispatcher
				.dispatch(&SyncEvent::ResourceSkipped { key: key.clone() })
				.await;
			tracker.record_skipped(key);
		}

		for (job, pending_digest) in survivors {
			tracker.record_refreshed(job.name());
			self.dispatcher
				.dispatch(&SyncEvent::ResourceRefreshed {
					name: job.name(),
					key: job.key().cloned(),
				})
				.await;

			if let Some((key, digest)) = pending_digest {
				match self.digests.put(&key, &digest).await {
					Ok(()) => tracker.record_digest(true),
					Err(e) => {
						warn!("Failed to persist digest for {}: {}", key, e);
						tracker.record_digest(false);
					}
				}
			}
		}

		tracker.log_progress();
		Ok(tracker.get_report())
	}

	async fn decide(&self, job: &Job<L::Tables>) -> Result<Decision, SyncError> {
		let (Some(key), Some(probe)) = (job.key(), job.probe().await) else {
			return Ok(Decision::Refresh(None));
		};
		let digest = probe?;

		if self.digests.should_reload(key, &digest).await? {
			debug!("{} changed (digest {}), refreshing", key, digest);
			Ok(Decision::Refresh(Some((key.clone(), digest))))
		} else {
			Ok(Decision::Skip(key.clone()))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::digest_store::MemoryDigestStore;
	use crate::sync::events::{StatusHandler, SyncEventHandler, SyncStatus};
	use crate::sync::job::{DigestedResource, Resource};
	use crate::sync::types::{ConversionError, DigestStoreError, RemoteError};
	use std::collections::BTreeMap;
	use std::sync::Mutex;
	use std::sync::atomic::{AtomicUsize, Ordering};

	type Tables = BTreeMap<String, String>;

	#[derive(Default)]
	struct FakeStore {
		tables: Mutex<Tables>,
		transactions: AtomicUsize,
		fail: bool,
	}

	#[async_trait::async_trait]
	impl LocalStore for FakeStore {
		type Tables = Tables;

		async fn transaction(
			&self,
			body: Mutation<Tables>,
		) -> Result<(), TransactionError> {
			self.transactions.fetch_add(1, Ordering::SeqCst);
			if self.fail {
				return Err(TransactionError::IoError(std::io::Error::other("disk full")));
			}
			let mut staged = self.tables.lock().unwrap().clone();
			body(&mut staged);
			*self.tables.lock().unwrap() = staged;
			Ok(())
		}
	}

	#[derive(Default)]
	struct Calls {
		probes: AtomicUsize,
		fetches: AtomicUsize,
		converts: AtomicUsize,
		applies: AtomicUsize,
	}

	/// Scripted resource writing `content` under its own name.
	struct Scripted {
		name: &'static str,
		digest: Result<&'static str, &'static str>,
		content: Result<&'static str, &'static str>,
		bad_payload: bool,
		calls: Arc<Calls>,
	}

	impl Scripted {
		fn new(name: &'static str, digest: &'static str, content: &'static str) -> Self {
			Self {
				name,
				digest: Ok(digest),
				content: Ok(content),
				bad_payload: false,
				calls: Arc::new(Calls::default()),
			}
		}
	}

	#[async_trait::async_trait]
	impl Resource<Tables> for Scripted {
		type Params = ();
		type Payload = String;
		type Record = String;

		fn name(&self) -> &'static str {
			self.name
		}

		async fn fetch(&self, _params: &()) -> Result<String, RemoteError> {
			self.calls.fetches.fetch_add(1, Ordering::SeqCst);
			self.content
				.map(str::to_string)
				.map_err(|e| RemoteError::StatusError {
					status: 503,
					url: e.to_string(),
				})
		}

		fn convert(&self, _params: &(), payload: String) -> Result<String, ConversionError> {
			self.calls.converts.fetch_add(1, Ordering::SeqCst);
			if self.bad_payload {
				return Err(ConversionError::new(self.name, "unexpected shape"));
			}
			Ok(payload)
		}

		fn apply(&self, _params: &(), record: String, tables: &mut Tables) {
			self.calls.applies.fetch_add(1, Ordering::SeqCst);
			tables.insert(self.name.to_string(), record);
		}
	}

	#[async_trait::async_trait]
	impl DigestedResource<Tables> for Scripted {
		fn key(&self, _params: &()) -> ResourceKey {
			ResourceKey::global(self.name)
		}

		async fn digest_of(&self, _params: &()) -> Result<Digest, RemoteError> {
			self.calls.probes.fetch_add(1, Ordering::SeqCst);
			self.digest
				.map(Digest::new)
				.map_err(|e| RemoteError::StatusError {
					status: 503,
					url: e.to_string(),
				})
		}
	}

	/// Memory digest store whose reads or writes can be made to fail.
	#[derive(Default)]
	struct FlakyDigests {
		inner: MemoryDigestStore,
		fail_reads: bool,
		fail_writes: bool,
	}

	#[async_trait::async_trait]
	impl DigestStore for FlakyDigests {
		async fn get(&self, key: &ResourceKey) -> Result<Option<Digest>, DigestStoreError> {
			if self.fail_reads {
				return Err(std::io::Error::other("digest file unreadable").into());
			}
			self.inner.get(key).await
		}

		async fn put(&self, key: &ResourceKey, digest: &Digest) -> Result<(), DigestStoreError> {
			if self.fail_writes {
				return Err(std::io::Error::other("disk full").into());
			}
			self.inner.put(key, digest).await
		}
	}

	#[derive(Default)]
	struct Recorder {
		events: Mutex<Vec<&'static str>>,
	}

	#[async_trait::async_trait]
	impl SyncEventHandler for Recorder {
		async fn handle(&self, event: &SyncEvent) -> Result<(), SyncError> {
			let name = match event {
				SyncEvent::BatchStarted { .. } => "started",
				SyncEvent::ResourceSkipped { .. } => "skipped",
				SyncEvent::ResourceRefreshed { .. } => "refreshed",
				SyncEvent::BatchCommitted { .. } => "committed",
				SyncEvent::BatchFailed { .. } => "failed",
			};
			self.events.lock().unwrap().push(name);
			Ok(())
		}

		fn name(&self) -> &'static str {
			"Recorder"
		}
	}

	fn engine(
		store: Arc<FakeStore>,
		digests: Arc<MemoryDigestStore>,
	) -> SyncEngine<MemoryDigestStore, FakeStore> {
		SyncEngine::new(digests, store, SyncConfig::default())
	}

	#[tokio::test]
	async fn test_skip_on_unchanged_digest() {
		let store = Arc::new(FakeStore::default());
		let digests = Arc::new(MemoryDigestStore::new());
		digests
			.put(&ResourceKey::global("dishes"), &Digest::new("v1"))
			.await
			.unwrap();

		let resource = Scripted::new("dishes", "v1", "soup");
		let calls = resource.calls.clone();
		let report = engine(store.clone(), digests.clone())
			.run(vec![Job::digest_gated(resource, ())])
			.await
			.unwrap();

		assert_eq!(calls.probes.load(Ordering::SeqCst), 1);
		assert_eq!(calls.fetches.load(Ordering::SeqCst), 0);
		assert_eq!(calls.converts.load(Ordering::SeqCst), 0);
		assert_eq!(calls.applies.load(Ordering::SeqCst), 0);
		assert!(store.tables.lock().unwrap().is_empty());
		assert_eq!(store.transactions.load(Ordering::SeqCst), 0);
		assert!(report.is_noop());
		assert_eq!(report.skipped, vec![ResourceKey::global("dishes")]);
	}

	#[tokio::test]
	async fn test_refresh_on_changed_or_absent_digest() {
		let store = Arc::new(FakeStore::default());
		let digests = Arc::new(MemoryDigestStore::new());
		digests
			.put(&ResourceKey::global("dishes"), &Digest::new("v1"))
			.await
			.unwrap();

		let changed = Scripted::new("dishes", "v2", "soup");
		let absent = Scripted::new("pictograms", "p1", "vegan");
		let (changed_calls, absent_calls) = (changed.calls.clone(), absent.calls.clone());

		engine(store.clone(), digests.clone())
			.run(vec![
				Job::digest_gated(changed, ()),
				Job::digest_gated(absent, ()),
			])
			.await
			.unwrap();

		for calls in [changed_calls, absent_calls] {
			assert_eq!(calls.fetches.load(Ordering::SeqCst), 1);
			assert_eq!(calls.converts.load(Ordering::SeqCst), 1);
			assert_eq!(calls.applies.load(Ordering::SeqCst), 1);
		}
		assert_eq!(
			digests.get(&ResourceKey::global("dishes")).await.unwrap(),
			Some(Digest::new("v2"))
		);
		assert_eq!(
			digests.get(&ResourceKey::global("pictograms")).await.unwrap(),
			Some(Digest::new("p1"))
		);
		assert_eq!(store.transactions.load(Ordering::SeqCst), 1);
		assert_eq!(store.tables.lock().unwrap().get("dishes").unwrap(), "soup");
	}

	#[tokio::test]
	async fn test_unconditional_job_always_refreshes() {
		let store = Arc::new(FakeStore::default());
		let digests = Arc::new(MemoryDigestStore::new());
		let engine = engine(store.clone(), digests.clone());

		for _ in 0..2 {
			let report = engine
				.run(vec![Job::unconditional(Scripted::new("info", "-", "open 8-14"), ())])
				.await
				.unwrap();
			assert_eq!(report.refreshed, vec!["info"]);
		}
		assert_eq!(store.transactions.load(Ordering::SeqCst), 2);
		assert_eq!(digests.len().await, 0);
	}

	async fn assert_batch_untouched(failing: Scripted) {
		let store = Arc::new(FakeStore::default());
		let digests = Arc::new(MemoryDigestStore::new());
		digests
			.put(&ResourceKey::global("dishes"), &Digest::new("old"))
			.await
			.unwrap();

		let healthy = Scripted::new("dishes", "new", "soup");
		let info = Scripted::new("info", "-", "open");
		let (healthy_calls, info_calls, failing_calls) =
			(healthy.calls.clone(), info.calls.clone(), failing.calls.clone());

		let result = engine(store.clone(), digests.clone())
			.run(vec![
				Job::digest_gated(healthy, ()),
				Job::unconditional(info, ()),
				Job::digest_gated(failing, ()),
			])
			.await;

		assert!(result.is_err());
		for calls in [healthy_calls, info_calls, failing_calls] {
			assert_eq!(calls.applies.load(Ordering::SeqCst), 0);
		}
		assert_eq!(store.transactions.load(Ordering::SeqCst), 0);
		assert!(store.tables.lock().unwrap().is_empty());
		assert_eq!(
			digests.get(&ResourceKey::global("dishes")).await.unwrap(),
			Some(Digest::new("old"))
		);
		assert_eq!(digests.get(&ResourceKey::global("broken")).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_probe_failure_aborts_whole_batch() {
		let mut failing = Scripted::new("broken", "x", "x");
		failing.digest = Err("unreachable");
		assert_batch_untouched(failing).await;
	}

	#[tokio::test]
	async fn test_fetch_failure_aborts_whole_batch() {
		let mut failing = Scripted::new("broken", "x", "x");
		failing.content = Err("timeout");
		assert_batch_untouched(failing).await;
	}

	#[tokio::test]
	async fn test_conversion_failure_aborts_whole_batch() {
		let mut failing = Scripted::new("broken", "x", "x");
		failing.bad_payload = true;
		assert_batch_untouched(failing).await;
	}

	#[tokio::test]
	async fn test_transaction_failure_keeps_old_digests() {
		let store = Arc::new(FakeStore {
			fail: true,
			..Default::default()
		});
		let digests = Arc::new(MemoryDigestStore::new());

		let result = engine(store.clone(), digests.clone())
			.run(vec![Job::digest_gated(Scripted::new("dishes", "v1", "soup"), ())])
			.await;

		assert!(matches!(result, Err(SyncError::TransactionError(_))));
		assert_eq!(digests.get(&ResourceKey::global("dishes")).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_second_run_without_remote_change_is_idempotent() {
		let store = Arc::new(FakeStore::default());
		let digests = Arc::new(MemoryDigestStore::new());
		let engine = engine(store.clone(), digests.clone());

		let first = Scripted::new("dishes", "v1", "soup");
		engine.run(vec![Job::digest_gated(first, ())]).await.unwrap();

		let second = Scripted::new("dishes", "v1", "soup");
		let calls = second.calls.clone();
		let report = engine.run(vec![Job::digest_gated(second, ())]).await.unwrap();

		assert!(report.is_noop());
		assert_eq!(calls.fetches.load(Ordering::SeqCst), 0);
		assert_eq!(calls.applies.load(Ordering::SeqCst), 0);
		assert_eq!(store.transactions.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_bounded_concurrency_still_runs_every_job() {
		let store = Arc::new(FakeStore::default());
		let digests = Arc::new(MemoryDigestStore::new());
		let engine = SyncEngine::new(
			digests,
			store.clone(),
			SyncConfig { max_concurrency: 1 },
		);

		let names = ["a", "b", "c", "d"];
		let jobs = names
			.into_iter()
			.map(|name| Job::digest_gated(Scripted::new(name, "v1", "x"), ()))
			.collect();
		let report = engine.run(jobs).await.unwrap();

		assert_eq!(report.refreshed, names.to_vec());
		assert_eq!(store.tables.lock().unwrap().len(), 4);
	}

	#[tokio::test]
	async fn test_digest_store_read_failure_aborts_whole_batch() {
		let store = Arc::new(FakeStore::default());
		let digests = Arc::new(FlakyDigests {
			fail_reads: true,
			..Default::default()
		});

		let dishes = Scripted::new("dishes", "v1", "soup");
		let info = Scripted::new("info", "-", "open");
		let (dishes_calls, info_calls) = (dishes.calls.clone(), info.calls.clone());

		let result = SyncEngine::new(digests, store.clone(), SyncConfig::default())
			.run(vec![Job::unconditional(info, ()), Job::digest_gated(dishes, ())])
			.await;

		assert!(matches!(result, Err(SyncError::DigestStoreError(_))));
		for calls in [dishes_calls, info_calls] {
			assert_eq!(calls.applies.load(Ordering::SeqCst), 0);
		}
		assert_eq!(store.transactions.load(Ordering::SeqCst), 0);
		assert!(store.tables.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_digest_write_failure_after_commit_still_succeeds() {
		let store = Arc::new(FakeStore::default());
		let digests = Arc::new(FlakyDigests {
			fail_writes: true,
			..Default::default()
		});
		let engine = SyncEngine::new(digests.clone(), store.clone(), SyncConfig::default());

		let report = engine
			.run(vec![Job::digest_gated(Scripted::new("dishes", "v1", "soup"), ())])
			.await
			.unwrap();

		assert_eq!(report.refreshed, vec!["dishes"]);
		assert_eq!(report.digests_persisted, 0);
		assert_eq!(report.digests_failed, 1);
		assert_eq!(store.tables.lock().unwrap().get("dishes").unwrap(), "soup");
		assert_eq!(digests.inner.get(&ResourceKey::global("dishes")).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_failed_batch_emits_no_resource_events() {
		let recorder = Arc::new(Recorder::default());
		let mut dispatcher = EventDispatcher::new();
		dispatcher.register_handler(recorder.clone());

		let digests = Arc::new(MemoryDigestStore::new());
		digests
			.put(&ResourceKey::global("dishes"), &Digest::new("v1"))
			.await
			.unwrap();
		let engine = engine(Arc::new(FakeStore::default()), digests).with_dispatcher(dispatcher);

		let mut broken = Scripted::new("broken", "x", "x");
		broken.content = Err("offline");
		let result = engine
			.run(vec![
				Job::digest_gated(Scripted::new("dishes", "v1", "soup"), ()),
				Job::digest_gated(broken, ()),
			])
			.await;
		assert!(result.is_err());
		assert_eq!(*recorder.events.lock().unwrap(), vec!["started", "failed"]);

		recorder.events.lock().unwrap().clear();
		engine
			.run(vec![
				Job::digest_gated(Scripted::new("dishes", "v1", "soup"), ()),
				Job::unconditional(Scripted::new("info", "-", "open"), ()),
			])
			.await
			.unwrap();
		assert_eq!(
			*recorder.events.lock().unwrap(),
			vec!["started", "skipped", "refreshed", "committed"]
		);
	}

	#[tokio::test]
	async fn test_status_reflects_failure() {
		let (handler, status) = StatusHandler::new();
		let mut dispatcher = EventDispatcher::new();
		dispatcher.register_handler(Arc::new(handler));

		let store = Arc::new(FakeStore::default());
		let engine = SyncEngine::new(
			Arc::new(MemoryDigestStore::new()),
			store,
			SyncConfig::default(),
		)
		.with_dispatcher(dispatcher);

		let mut failing = Scripted::new("dishes", "v1", "soup");
		failing.content = Err("offline");
		let _ = engine.run(vec![Job::digest_gated(failing, ())]).await;

		assert!(matches!(*status.borrow(), SyncStatus::Failed(_)));
	}
}
