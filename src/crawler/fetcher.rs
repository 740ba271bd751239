//! HTTP fetcher implementation
//!
//! This module handles all network retrieval for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Enforcing the per-fetch timeout around request and body read
//! - Classifying every outcome as success, retryable, or permanent
//!
//! The fetcher never retries on its own; the scheduler asks the retry policy.

use crate::config::UserAgentConfig;
use crate::url::ResourceId;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed before the fetch fails permanently
const MAX_REDIRECTS: usize = 10;

/// Why a fetch did not produce content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error: HTTP {0}")]
    ServerError(u16),

    #[error("client error: HTTP {0}")]
    ClientError(u16),

    #[error("unexpected status: HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("redirect error: {0}")]
    Redirect(String),

    #[error("invalid request: {0}")]
    Request(String),
}

impl FailureReason {
    /// Returns true for failures worth another attempt
    ///
    /// | Failure | Retryable |
    /// |---------|-----------|
    /// | Timeout, connection, transport | yes |
    /// | HTTP 5xx | yes |
    /// | HTTP 4xx, other non-success status | no |
    /// | Malformed identifier, invalid request, redirect loop | no |
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect(_) | Self::Transport(_) | Self::ServerError(_)
        )
    }
}

/// Body and metadata of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub body: Vec<u8>,
    pub status: u16,
    pub content_type: Option<String>,
    /// URL after following redirects; relative links resolve against it
    pub final_url: Url,
}

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub enum FetchResult {
    Success(FetchedContent),
    RetryableFailure(FailureReason),
    PermanentFailure(FailureReason),
}

impl FetchResult {
    /// Wraps a failure reason in the variant its classification calls for
    pub fn failure(reason: FailureReason) -> Self {
        if reason.is_retryable() {
            Self::RetryableFailure(reason)
        } else {
            Self::PermanentFailure(reason)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Retrieves the content behind a resource identifier
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `id`, giving up with a retryable timeout after `timeout`
    async fn fetch(&self, id: &ResourceId, timeout: Duration) -> FetchResult;
}

/// Fetcher backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher with a client identifying itself per `config`
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_url(&self, url: &Url) -> FetchResult {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return FetchResult::failure(classify_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResult::failure(classify_status(status));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(body) => FetchResult::Success(FetchedContent {
                body: body.to_vec(),
                status: status.as_u16(),
                content_type,
                final_url,
            }),
            Err(e) => FetchResult::failure(classify_error(&e)),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, id: &ResourceId, timeout: Duration) -> FetchResult {
        let Some(url) = id.url() else {
            return FetchResult::PermanentFailure(FailureReason::MalformedIdentifier(
                id.to_string(),
            ));
        };

        match tokio::time::timeout(timeout, self.fetch_url(url)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("Fetch of {} timed out after {:?}", id, timeout);
                FetchResult::RetryableFailure(FailureReason::Timeout)
            }
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use skimmer::config::UserAgentConfig;
/// use skimmer::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "Skimmer".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // The overall deadline is applied per fetch, so the client only bounds connecting
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a non-success HTTP status to a failure reason
pub fn classify_status(status: StatusCode) -> FailureReason {
    if status.is_server_error() {
        FailureReason::ServerError(status.as_u16())
    } else if status.is_client_error() {
        FailureReason::ClientError(status.as_u16())
    } else {
        FailureReason::UnexpectedStatus(status.as_u16())
    }
}

/// Maps a transport-level `reqwest` error to a failure reason
fn classify_error(e: &reqwest::Error) -> FailureReason {
    if e.is_timeout() {
        FailureReason::Timeout
    } else if e.is_redirect() {
        FailureReason::Redirect(e.to_string())
    } else if e.is_builder() {
        FailureReason::Request(e.to_string())
    } else if e.is_connect() {
        FailureReason::Connect(e.to_string())
    } else if let Some(status) = e.status() {
        classify_status(status)
    } else {
        FailureReason::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::canonicalize;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        let client = build_http_client(&config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            FailureReason::ServerError(503)
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            FailureReason::ClientError(404)
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            FailureReason::ClientError(429)
        );
        assert_eq!(
            classify_status(StatusCode::NOT_MODIFIED),
            FailureReason::UnexpectedStatus(304)
        );
    }

    #[test]
    fn test_retryable_reasons() {
        assert!(FailureReason::Timeout.is_retryable());
        assert!(FailureReason::Connect("refused".into()).is_retryable());
        assert!(FailureReason::Transport("reset".into()).is_retryable());
        assert!(FailureReason::ServerError(502).is_retryable());

        assert!(!FailureReason::ClientError(404).is_retryable());
        assert!(!FailureReason::UnexpectedStatus(304).is_retryable());
        assert!(!FailureReason::Redirect("loop".into()).is_retryable());
        assert!(!FailureReason::MalformedIdentifier("x".into()).is_retryable());
    }

    #[test]
    fn test_failure_wraps_by_classification() {
        assert!(matches!(
            FetchResult::failure(FailureReason::ServerError(500)),
            FetchResult::RetryableFailure(_)
        ));
        assert!(matches!(
            FetchResult::failure(FailureReason::ClientError(403)),
            FetchResult::PermanentFailure(_)
        ));
    }

    #[tokio::test]
    async fn test_malformed_identifier_fails_permanently() {
        let fetcher = HttpFetcher::new(&create_test_config()).unwrap();
        let id = canonicalize("not a url");

        let result = fetcher.fetch(&id, Duration::from_secs(1)).await;

        assert!(matches!(
            result,
            FetchResult::PermanentFailure(FailureReason::MalformedIdentifier(_))
        ));
    }

    // Network behavior is exercised against wiremock in the integration tests
}
