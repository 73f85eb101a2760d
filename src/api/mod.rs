/// HTTP client for the menu API
pub mod client;
/// Wire types and endpoints
pub mod types;

pub use client::MenuApiClient;
pub use types::Endpoint;
