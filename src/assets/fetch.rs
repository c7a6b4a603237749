use std::{future::Future, time::Duration};

use reqwest::StatusCode;

use crate::foundation::{
    config::{CacheConfig, RetryPolicy},
    error::{RouteReelError, RouteReelResult},
    retry::retry_with_backoff,
};

/// Retrieves raw asset bytes for a URL.
pub trait AssetFetcher {
    /// Fetch the full payload behind `url`.
    fn fetch(&self, url: &str) -> impl Future<Output = RouteReelResult<Vec<u8>>>;
}

#[derive(thiserror::Error, Debug)]
enum FetchFailure {
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Permanent(String),
}

fn classify_status(status: StatusCode) -> Option<FetchFailure> {
    if status.is_success() {
        None
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(FetchFailure::Transient(format!("HTTP {status}")))
    } else {
        Some(FetchFailure::Permanent(format!("HTTP {status}")))
    }
}

fn classify_reqwest(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() || err.is_connect() {
        FetchFailure::Transient(err.to_string())
    } else {
        FetchFailure::Permanent(err.to_string())
    }
}

/// HTTP(S) fetcher with a request timeout and retries on transient failures.
///
/// Timeouts, connection errors, 5xx and 429 are retried; any other status fails at once.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Fetcher configured from the cache section of the settings.
    pub fn new(config: &CacheConfig) -> RouteReelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .user_agent(concat!("routereel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RouteReelError::fetch(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(classify_reqwest)?;
        if let Some(failure) = classify_status(response.status()) {
            return Err(failure);
        }
        let bytes = response.bytes().await.map_err(classify_reqwest)?;
        Ok(bytes.to_vec())
    }
}

impl AssetFetcher for HttpFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> RouteReelResult<Vec<u8>> {
        retry_with_backoff(
            &self.retry,
            |e: &FetchFailure| matches!(e, FetchFailure::Transient(_)),
            |_| self.fetch_once(url),
        )
        .await
        .map_err(|e| RouteReelError::fetch(format!("GET {url}: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/fetch.rs"]
mod tests;
