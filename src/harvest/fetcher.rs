//! Page fetching
//!
//! This module defines the fetch seam used by the scout and the workers:
//! - `Fetcher` opens a session bound to one egress endpoint
//! - `FetchSession` fetches pages through that endpoint with a timeout
//! - `ScopedSession` closes a session on every exit path
//!
//! `HttpFetcher` is the reqwest-backed implementation.

use crate::config::HttpConfig;
use crate::harvest::endpoint::Endpoint;
use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Raw content of a fetched page
#[derive(Debug, Clone)]
pub struct RawPage {
    /// URL that was requested
    pub url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Page body
    pub body: String,
}

/// Errors produced while opening sessions or fetching pages
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("{url} answered with HTTP {status_code}")]
    Status { url: String, status_code: u16 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("could not open session on {endpoint}: {message}")]
    Session { endpoint: String, message: String },

    #[error("fetch of {url} was cancelled")]
    Cancelled { url: String },
}

/// Opens fetch sessions bound to an endpoint
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn open_session(&self, endpoint: &Endpoint) -> Result<Box<dyn FetchSession>, FetchError>;
}

/// A single fetch session (one endpoint, one client instance)
#[async_trait]
pub trait FetchSession: Send {
    /// Fetches `url`, giving up after `timeout`
    async fn fetch(&mut self, url: &str, timeout: Duration) -> Result<RawPage, FetchError>;

    /// Releases the session's resources. Called exactly once.
    fn close(&mut self);
}

/// Owns a session and closes it when dropped
pub struct ScopedSession {
    session: Box<dyn FetchSession>,
}

impl ScopedSession {
    pub fn new(session: Box<dyn FetchSession>) -> Self {
        Self { session }
    }

    /// Fetches `url`, enforcing `timeout` even if the session ignores it
    pub async fn fetch_bounded(&mut self, url: &str, timeout: Duration) -> Result<RawPage, FetchError> {
        match tokio::time::timeout(timeout, self.session.fetch(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// Builds an HTTP client routed through `endpoint`
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::HttpConfig;
/// use catalog_harvest::harvest::{build_http_client, Endpoint};
///
/// let client = build_http_client(&HttpConfig::default(), &Endpoint::Direct).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig, endpoint: &Endpoint) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    builder = match endpoint {
        Endpoint::Direct => builder.no_proxy(),
        Endpoint::Proxy(proxy_url) => builder.proxy(Proxy::all(proxy_url.as_str())?),
    };

    builder.build()
}

/// reqwest-backed fetcher; every session gets its own client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn open_session(&self, endpoint: &Endpoint) -> Result<Box<dyn FetchSession>, FetchError> {
        let client = build_http_client(&self.config, endpoint).map_err(|e| FetchError::Session {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!("Opened HTTP session via {}", endpoint);

        Ok(Box::new(HttpSession {
            client: Some(client),
            endpoint: endpoint.clone(),
        }))
    }
}

/// One HTTP session; the client is dropped on close
struct HttpSession {
    client: Option<Client>,
    endpoint: Endpoint,
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn fetch(&mut self, url: &str, timeout: Duration) -> Result<RawPage, FetchError> {
        let client = self.client.as_ref().ok_or_else(|| FetchError::Session {
            endpoint: self.endpoint.to_string(),
            message: "session already closed".to_string(),
        })?;

        let response = client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status_code: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;

        Ok(RawPage {
            url: url.to_string(),
            status_code: status.as_u16(),
            body,
        })
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("Closed HTTP session via {}", self.endpoint);
        }
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(url: &str, timeout: Duration, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else if let Some(status) = error.status() {
        FetchError::Status {
            url: url.to_string(),
            status_code: status.as_u16(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Returns true if a status code means the endpoint itself is working
pub(crate) fn is_reachable_status(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_build_direct_client() {
        let client = build_http_client(&HttpConfig::default(), &Endpoint::Direct);
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_proxied_client() {
        let endpoint = Endpoint::Proxy("http://127.0.0.1:3128".to_string());
        let client = build_http_client(&HttpConfig::default(), &endpoint);
        assert!(client.is_ok());
    }

    #[test]
    fn test_reachable_status() {
        assert!(is_reachable_status(StatusCode::OK));
        assert!(is_reachable_status(StatusCode::FOUND));
        assert!(!is_reachable_status(StatusCode::FORBIDDEN));
        assert!(!is_reachable_status(StatusCode::BAD_GATEWAY));
    }

    struct CountingSession {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FetchSession for CountingSession {
        async fn fetch(&mut self, url: &str, _timeout: Duration) -> Result<RawPage, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RawPage {
                url: url.to_string(),
                status_code: 200,
                body: String::new(),
            })
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scoped_session_enforces_timeout() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut session = ScopedSession::new(Box::new(CountingSession {
            closes: Arc::clone(&closes),
        }));

        let result = session
            .fetch_bounded("https://shop.example/slow", Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_scoped_session_closes_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let _session = ScopedSession::new(Box::new(CountingSession {
                closes: Arc::clone(&closes),
            }));
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
