//! HTTP client for the discovery backend.
//!
//! Two endpoints are consumed: `GET {base}/api/search` returning a
//! [`SearchPage`], and `GET {base}/api/categories` returning the category
//! catalog as a JSON array. Transient failures are retried with back-off
//! before being reported.

use std::future::Future;
use std::time::Duration;

use geodisc_core::{AppConfig, BackendError, Category, CategoryCatalog, SearchPage, SearchQuery};
use geodisc_engine::SearchBackend;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::retry::{retry_after, RetryPolicy};

const SEARCH_PATH: &str = "api/search";
const CATEGORIES_PATH: &str = "api/categories";

/// Client for the discovery backend.
///
/// Use [`DiscoveryClient::from_app_config`] in binaries, or
/// [`DiscoveryClient::new`] to point at a mock server in tests.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl DiscoveryClient {
    /// Creates a client without retries.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash so `join` appends instead of replacing
        // the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy::NONE,
        })
    }

    /// Enables up to `max_retries` extra attempts on retriable failures.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(backoff_base_ms),
        };
        self
    }

    /// # Errors
    ///
    /// See [`DiscoveryClient::new`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ClientError> {
        Ok(Self::new(
            &config.api_base_url,
            config.request_timeout_secs,
            &config.user_agent,
        )?
        .with_retries(
            config.max_retries,
            config.retry_backoff_base_secs.saturating_mul(1_000),
        ))
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches one page of search results.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Http`] on network failure.
    /// - [`ClientError::RateLimited`] or [`ClientError::Status`] on a non-2xx
    ///   status. Both network failures and 429/5xx are retried first.
    /// - [`ClientError::Deserialize`] if the body is not a search page.
    pub async fn fetch_page(&self, query: &SearchQuery) -> Result<SearchPage, ClientError> {
        let url = self.search_url(query)?;
        let page: SearchPage = self.retry.run(|| self.request_json(&url)).await?;
        tracing::debug!(
            places = page.places.len(),
            happenings = page.happenings.len(),
            has_page_info = page.page_info.is_some(),
            "search page received"
        );
        Ok(page)
    }

    /// Fetches the category catalog.
    ///
    /// # Errors
    ///
    /// Same as [`DiscoveryClient::fetch_page`].
    pub async fn categories(&self) -> Result<CategoryCatalog, ClientError> {
        let url = self.endpoint(CATEGORIES_PATH)?;
        let categories: Vec<Category> = self.retry.run(|| self.request_json(&url)).await?;
        tracing::debug!(count = categories.len(), "categories received");
        Ok(CategoryCatalog::new(categories))
    }

    /// Builds the search URL with percent-encoded query parameters.
    ///
    /// Empty text, no category and `featured = false` are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if the endpoint path cannot
    /// be joined onto the base URL.
    pub fn search_url(&self, query: &SearchQuery) -> Result<Url, ClientError> {
        let mut url = self.endpoint(SEARCH_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            let text = query.free_text.trim();
            if !text.is_empty() {
                pairs.append_pair("q", text);
            }
            pairs.append_pair("type", query.type_selector.as_str());
            if let Some(slug) = &query.category_slug {
                pairs.append_pair("category", slug);
            }
            if query.featured_only {
                pairs.append_pair("featured", "true");
            }
            pairs.append_pair("limit", &query.page_size.to_string());
            pairs.append_pair("placesOffset", &query.places_offset.to_string());
            pairs.append_pair("happeningsOffset", &query.happenings_offset.to_string());
        }
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sends a GET request, classifies non-2xx statuses, and parses the body.
    async fn request_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ClientError> {
        tracing::debug!(url = %url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: url.path().to_string(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
            context: url.path().to_string(),
            source: e,
        })
    }
}

impl SearchBackend for DiscoveryClient {
    fn search(
        &self,
        query: SearchQuery,
    ) -> impl Future<Output = Result<SearchPage, BackendError>> + Send {
        async move { self.fetch_page(&query).await.map_err(BackendError::from) }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
