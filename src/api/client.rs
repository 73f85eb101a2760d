//!
//! HTTP client for the cafeteria menu API.
//!
//! Every resource is a JSON document under the API base URL. A `HEAD` request
//! on the same URL returns its `ETag`, which serves as the resource digest.

use super::types::Endpoint;
use crate::sync::types::{Digest, RemoteError};

use reqwest::Client;
use reqwest::header::ETAG;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Cafeteria menu API client
#[derive(Clone)]
pub struct MenuApiClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL, always ending in `/`.
	base_url: String,
}

impl MenuApiClient {
	/// Create a new API client.
	///
	/// # Arguments
	/// * `base_url` - Root of the menu API, e.g. `https://menu.example.org/api/v1`.
	/// * `timeout` - Timeout applied to every request.
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		let mut base_url = base_url.to_string();
		if !base_url.ends_with('/') {
			base_url.push('/');
		}

		Ok(Self {
			http_client,
			base_url,
		})
	}

	pub fn url(&self, endpoint: &Endpoint) -> String {
		format!("{}{}", self.base_url, endpoint.path())
	}

	/// Probe the digest of a resource without downloading it.
	///
	/// # Errors
	/// Returns `RemoteError::MissingDigest` if the server sends no usable `ETag`.
	pub async fn digest(&self, endpoint: &Endpoint) -> Result<Digest, RemoteError> {
		let url = self.url(endpoint);
		let response = self.http_client.head(&url).send().await?;

		if !response.status().is_success() {
			return Err(RemoteError::StatusError {
				status: response.status().as_u16(),
				url,
			});
		}

		let etag = response
			.headers()
			.get(ETAG)
			.and_then(|value| value.to_str().ok())
			.ok_or_else(|| RemoteError::MissingDigest(url.clone()))?;

		debug!("Digest of {} is {}", url, etag);
		Ok(Digest::new(etag))
	}

	/// Download and decode a resource.
	pub async fn fetch<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T, RemoteError> {
		let url = self.url(endpoint);
		let response = self
			.http_client
			.get(&url)
			.header("Accept", "application/json")
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(RemoteError::StatusError {
				status: response.status().as_u16(),
				url,
			});
		}

		debug!("Fetched {}", url);
		Ok(response.json().await?)
	}
}
