use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one syncable resource within one scope.
///
/// Keys are derived from the resource kind and its scope parameters, so the
/// same resource always maps to the same key across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
	/// Key for a resource that exists once per scope (e.g. a subsystem).
	pub fn new(kind: &str, scope: impl fmt::Display) -> Self {
		Self(format!("{}:{}", kind, scope))
	}

	/// Key for a resource that has no scope parameters.
	pub fn global(kind: &str) -> Self {
		Self(format!("{}:*", kind))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ResourceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Opaque content fingerprint supplied by the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Digest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Failures talking to the remote menu service. Transient, no local side effect.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("Unexpected status {status} from {url}")]
	StatusError { status: u16, url: String },

	#[error("No digest header on {0}")]
	MissingDigest(String),
}

/// The payload did not map onto the expected storage shape.
#[derive(Debug, thiserror::Error)]
#[error("Failed to convert {resource}: {reason}")]
pub struct ConversionError {
	pub resource: &'static str,
	pub reason: String,
}

impl ConversionError {
	pub fn new(resource: &'static str, reason: impl Into<String>) -> Self {
		Self {
			resource,
			reason: reason.into(),
		}
	}
}

/// The local store failed to commit a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Snapshot serialization error: {0}")]
	SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DigestStoreError {
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Digest file parse error: {0}")]
	ParseError(#[from] serde_json::Error),
}

/// Single failure signal for a whole sync batch.
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Remote error for {resource}: {source}")]
	RemoteError {
		resource: &'static str,
		#[source]
		source: RemoteError,
	},

	#[error(transparent)]
	ConversionError(#[from] ConversionError),

	#[error("Transaction error: {0}")]
	TransactionError(#[from] TransactionError),

	#[error("Digest store error: {0}")]
	DigestStoreError(#[from] DigestStoreError),
}

impl SyncError {
	pub fn remote(resource: &'static str, source: RemoteError) -> Self {
		Self::RemoteError { resource, source }
	}
}
