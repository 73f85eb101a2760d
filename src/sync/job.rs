//! Jobs: one syncable resource's fetch/convert/apply recipe.
//!
//! A resource kind implements [`Resource`] (and [`DigestedResource`] when the
//! remote side offers a cheap digest probe). [`Job`] binds a resource to its
//! parameters and erases the associated types, so a single batch can mix
//! dishes, pictograms, opening hours and so on.

use crate::sync::types::{ConversionError, Digest, RemoteError, ResourceKey, SyncError};

use std::marker::PhantomData;
use std::sync::Arc;

/// Deferred local mutation produced by a fetched and converted resource.
pub type Mutation<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A remote resource that can be fetched, converted and applied to the local tables `S`.
#[async_trait::async_trait]
pub trait Resource<S>: Send + Sync + 'static {
	/// Scope parameters, e.g. the subsystem id.
	type Params: Send + Sync + 'static;
	/// Wire shape returned by the remote.
	type Payload: Send + 'static;
	/// Storage shape applied to the local tables.
	type Record: Send + 'static;

	fn name(&self) -> &'static str;

	async fn fetch(&self, params: &Self::Params) -> Result<Self::Payload, RemoteError>;

	fn convert(
		&self,
		params: &Self::Params,
		payload: Self::Payload,
	) -> Result<Self::Record, ConversionError>;

	/// Write `record` into the tables. Runs inside the batch transaction.
	fn apply(&self, params: &Self::Params, record: Self::Record, tables: &mut S);
}

/// A resource with a cheap content digest probe.
#[async_trait::async_trait]
pub trait DigestedResource<S>: Resource<S> {
	fn key(&self, params: &Self::Params) -> ResourceKey;

	async fn digest_of(&self, params: &Self::Params) -> Result<Digest, RemoteError>;
}

#[async_trait::async_trait]
trait Refresh<S>: Send + Sync {
	fn name(&self) -> &'static str;

	async fn refresh(&self) -> Result<Mutation<S>, SyncError>;
}

#[async_trait::async_trait]
trait Probe<S>: Refresh<S> {
	fn key(&self) -> &ResourceKey;

	async fn digest(&self) -> Result<Digest, SyncError>;
}

struct Bound<S, R: Resource<S>> {
	resource: Arc<R>,
	params: Arc<R::Params>,
	_tables: PhantomData<fn(&mut S)>,
}

impl<S, R: Resource<S>> Bound<S, R> {
	fn new(resource: R, params: R::Params) -> Self {
		Self {
			resource: Arc::new(resource),
			params: Arc::new(params),
			_tables: PhantomData,
		}
	}
}

#[async_trait::async_trait]
impl<S: 'static, R: Resource<S>> Refresh<S> for Bound<S, R> {
	fn name(&self) -> &'static str {
		self.resource.name()
	}

	async fn refresh(&self) -> Result<Mutation<S>, SyncError> {
		let name = self.resource.name();
		let payload = self
			.resource
			.fetch(&self.params)
			.await
			.map_err(|e| SyncError::remote(name, e))?;
		let record = self.resource.convert(&self.params, payload)?;

		let resource = self.resource.clone();
		let params = self.params.clone();
		Ok(Box::new(move |tables: &mut S| {
			resource.apply(&params, record, tables)
		}))
	}
}

struct Gated<S, R: DigestedResource<S>> {
	bound: Bound<S, R>,
	key: ResourceKey,
}

#[async_trait::async_trait]
impl<S: 'static, R: DigestedResource<S>> Refresh<S> for Gated<S, R> {
	fn name(&self) -> &'static str {
		self.bound.name()
	}

	async fn refresh(&self) -> Result<Mutation<S>, SyncError> {
		self.bound.refresh().await
	}
}

#[async_trait::async_trait]
impl<S: 'static, R: DigestedResource<S>> Probe<S> for Gated<S, R> {
	fn key(&self) -> &ResourceKey {
		&self.key
	}

	async fn digest(&self) -> Result<Digest, SyncError> {
		let resource = &self.bound.resource;
		resource
			.digest_of(&self.bound.params)
			.await
			.map_err(|e| SyncError::remote(resource.name(), e))
	}
}

enum JobKind<S> {
	DigestGated(Box<dyn Probe<S>>),
	Unconditional(Box<dyn Refresh<S>>),
}

/// One resource to sync in a batch. Built fresh for every run.
pub struct Job<S> {
	kind: JobKind<S>,
}

impl<S: 'static> Job<S> {
	/// Job that is skipped when the remote digest matches the stored one.
	pub fn digest_gated<R: DigestedResource<S>>(resource: R, params: R::Params) -> Self {
		let key = resource.key(&params);
		let bound = Bound::new(resource, params);
		Self {
			kind: JobKind::DigestGated(Box::new(Gated { bound, key })),
		}
	}

	/// Job that is refreshed on every run.
	pub fn unconditional<R: Resource<S>>(resource: R, params: R::Params) -> Self {
		Self {
			kind: JobKind::Unconditional(Box::new(Bound::new(resource, params))),
		}
	}

	pub fn name(&self) -> &'static str {
		match &self.kind {
			JobKind::DigestGated(job) => job.name(),
			JobKind::Unconditional(job) => job.name(),
		}
	}

	/// Resource key of a digest-gated job, `None` for unconditional ones.
	pub fn key(&self) -> Option<&ResourceKey> {
		match &self.kind {
			JobKind::DigestGated(job) => Some(job.key()),
			JobKind::Unconditional(_) => None,
		}
	}

	pub(crate) async fn probe(&self) -> Option<Result<Digest, SyncError>> {
		match &self.kind {
			JobKind::DigestGated(job) => Some(job.digest().await),
			JobKind::Unconditional(_) => None,
		}
	}

	pub(crate) async fn refresh(&self) -> Result<Mutation<S>, SyncError> {
		match &self.kind {
			JobKind::DigestGated(job) => job.refresh().await,
			JobKind::Unconditional(job) => job.refresh().await,
		}
	}
}
