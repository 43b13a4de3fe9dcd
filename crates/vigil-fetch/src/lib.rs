//! Vigil Fetch - resilient retrieval of the upstream API catalogue
//!
//! A primary endpoint is tried first with a short timeout. Transport
//! failures are retried with exponential backoff; an HTTP error status or a
//! malformed body is not. When the primary is exhausted the optional
//! fallback endpoint is tried under the same policy with a longer timeout.

pub mod error;

pub use error::{FetchError, Result};

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use vigil_core::{Backoff, FetchConfig};

/// One upstream URL and its per-request timeout
#[derive(Debug, Clone)]
struct Endpoint {
    url: String,
    timeout: Duration,
}

/// Fetches the JSON catalogue from the primary or fallback endpoint
pub struct ResilientFetcher {
    client: reqwest::Client,
    primary: Endpoint,
    fallback: Option<Endpoint>,
    max_retries: u32,
    retry: Backoff,
}

impl ResilientFetcher {
    /// Build the shared client from config
    pub fn new(config: &FetchConfig) -> Result<Self> {
        if config.primary_url.trim().is_empty() {
            return Err(FetchError::config("primary_url must not be empty"));
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(FetchError::ClientError)?;

        Ok(Self::with_client(config, client))
    }

    /// Create with a custom HTTP client
    pub fn with_client(config: &FetchConfig, client: reqwest::Client) -> Self {
        let fallback = config
            .fallback_url
            .as_ref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| Endpoint {
                url: url.clone(),
                timeout: config.fallback_timeout(),
            });

        Self {
            client,
            primary: Endpoint {
                url: config.primary_url.clone(),
                timeout: config.primary_timeout(),
            },
            fallback,
            max_retries: config.max_retries,
            retry: config.retry_backoff(),
        }
    }

    pub fn primary_url(&self) -> &str {
        &self.primary.url
    }

    pub fn fallback_url(&self) -> Option<&str> {
        self.fallback.as_ref().map(|e| e.url.as_str())
    }

    /// Retrieve the catalogue payload
    pub async fn fetch(&self) -> Result<Value> {
        let primary_err = match self.fetch_endpoint(&self.primary).await {
            Ok(payload) => return Ok(payload),
            Err(e) => e,
        };

        match &self.fallback {
            Some(fallback) => {
                warn!(
                    "Primary endpoint failed ({}), trying fallback {}",
                    primary_err, fallback.url
                );
                let payload = self.fetch_endpoint(fallback).await?;
                info!("Fetched catalogue from fallback {}", fallback.url);
                Ok(payload)
            }
            None => Err(primary_err),
        }
    }

    async fn fetch_endpoint(&self, endpoint: &Endpoint) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.request(endpoint).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    warn!(
                        "{} (retry {}/{} in {:?})",
                        e, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request(&self, endpoint: &Endpoint) -> Result<Value> {
        debug!("GET {}", endpoint.url);

        let response = self
            .client
            .get(&endpoint.url)
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|e| FetchError::transport(&endpoint.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::StatusError {
                url: endpoint.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(&endpoint.url, e))?;

        serde_json::from_slice(&body).map_err(|source| FetchError::InvalidBody {
            url: endpoint.url.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn_server(hits: Arc<AtomicUsize>) -> SocketAddr {
        let ok_hits = hits.clone();
        let fail_hits = hits.clone();
        let garbage_hits = hits;

        let app = Router::new()
            .route(
                "/entries",
                get(move || {
                    ok_hits.fetch_add(1, Ordering::SeqCst);
                    async {
                        Json(json!({
                            "count": 1,
                            "entries": [{"API": "Cat Facts", "Description": "Cats", "Category": "Animals"}]
                        }))
                    }
                }),
            )
            .route(
                "/broken",
                get(move || {
                    fail_hits.fetch_add(1, Ordering::SeqCst);
                    async { StatusCode::INTERNAL_SERVER_ERROR }
                }),
            )
            .route(
                "/garbage",
                get(move || {
                    garbage_hits.fetch_add(1, Ordering::SeqCst);
                    async { "not json" }
                }),
            )
            .route(
                "/agent",
                get(|headers: HeaderMap| async move {
                    let agent = headers
                        .get("user-agent")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({ "agent": agent }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// An address nothing listens on
    fn closed_addr() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    fn config(primary: String, fallback: Option<String>) -> FetchConfig {
        FetchConfig {
            primary_url: primary,
            fallback_url: fallback,
            primary_timeout_secs: 2,
            fallback_timeout_secs: 2,
            max_retries: 2,
            retry_base_ms: 1,
            retry_max_ms: 5,
            ..FetchConfig::default()
        }
    }

    #[test]
    fn test_empty_primary_rejected() {
        let result = ResilientFetcher::new(&config(String::new(), None));
        assert!(matches!(result, Err(FetchError::ConfigError(_))));
    }

    #[test]
    fn test_blank_fallback_ignored() {
        let fetcher = ResilientFetcher::new(&config(
            "http://127.0.0.1:1/entries".into(),
            Some("  ".into()),
        ))
        .unwrap();
        assert!(fetcher.fallback_url().is_none());
    }

    #[tokio::test]
    async fn test_primary_success() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_server(hits.clone()).await;

        let fetcher =
            ResilientFetcher::new(&config(format!("http://{}/entries", addr), None)).unwrap();
        let payload = fetcher.fetch().await.unwrap();

        assert_eq!(payload["entries"][0]["API"], "Cat Facts");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_unreachable() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_server(hits).await;

        let fetcher = ResilientFetcher::new(&config(
            format!("http://{}/entries", closed_addr()),
            Some(format!("http://{}/entries", addr)),
        ))
        .unwrap();

        let payload = fetcher.fetch().await.unwrap();
        assert_eq!(payload["count"], 1);
    }

    #[tokio::test]
    async fn test_primary_error_without_fallback() {
        let fetcher = ResilientFetcher::new(&config(
            format!("http://{}/entries", closed_addr()),
            None,
        ))
        .unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("/entries"));
    }

    #[tokio::test]
    async fn test_fallback_error_reported_when_both_fail() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_server(hits).await;

        let fetcher = ResilientFetcher::new(&config(
            format!("http://{}/entries", closed_addr()),
            Some(format!("http://{}/broken", addr)),
        ))
        .unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::StatusError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_status_error_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_server(hits.clone()).await;

        let fetcher =
            ResilientFetcher::new(&config(format!("http://{}/broken", addr), None)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::StatusError { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_server(hits.clone()).await;

        let fetcher =
            ResilientFetcher::new(&config(format!("http://{}/garbage", addr), None)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidBody { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_user_agent_sent() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_server(hits).await;

        let mut cfg = config(format!("http://{}/agent", addr), None);
        cfg.user_agent = "vigil-test/1.0".into();
        let fetcher = ResilientFetcher::new(&cfg).unwrap();

        let payload = fetcher.fetch().await.unwrap();
        assert_eq!(payload["agent"], "vigil-test/1.0");
    }
}
