//! HTTP client for the discovery backend's search and category endpoints.

pub mod client;
pub mod error;
pub(crate) mod retry;

pub use client::DiscoveryClient;
pub use error::ClientError;
