//! Egress endpoints and health checking
//!
//! Each category carries an ordered list of candidate endpoints. Workers
//! pick the first healthy one, starting from an offset derived from their
//! index so siblings spread over the pool. Health results are memoised for
//! the lifetime of one run.

use crate::config::HttpConfig;
use crate::harvest::fetcher::{build_http_client, is_reachable_status};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;

/// An egress network path used for fetching
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// No proxy; requests leave from the local host
    Direct,

    /// Requests are routed through the given proxy URL
    Proxy(String),
}

impl Endpoint {
    /// Builds the candidate list for a category
    ///
    /// An empty proxy list means the category is fetched directly.
    pub fn candidates(proxies: &[String]) -> Vec<Endpoint> {
        if proxies.is_empty() {
            vec![Endpoint::Direct]
        } else {
            proxies.iter().cloned().map(Endpoint::Proxy).collect()
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Proxy(url) => write!(f, "proxy {}", url),
        }
    }
}

/// Decides whether an endpoint is usable
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self, endpoint: &Endpoint, timeout: Duration) -> bool;
}

/// Health check that requests a probe URL through the endpoint
#[derive(Debug, Clone)]
pub struct HttpHealthCheck {
    config: HttpConfig,
}

impl HttpHealthCheck {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, endpoint: &Endpoint, timeout: Duration) -> bool {
        if *endpoint == Endpoint::Direct {
            return true;
        }

        let client = match build_http_client(&self.config, endpoint) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Cannot build client for {}: {}", endpoint, e);
                return false;
            }
        };

        match client
            .get(&self.config.probe_url)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => is_reachable_status(response.status()),
            Err(e) => {
                tracing::debug!("Health check failed for {}: {}", endpoint, e);
                false
            }
        }
    }
}

/// Run-wide memo of endpoint health results
///
/// Each endpoint gets one `OnceCell`, so concurrent callers asking about the
/// same endpoint share a single check while different endpoints are checked
/// independently.
#[derive(Debug, Default)]
pub struct HealthCache {
    cells: Mutex<HashMap<Endpoint, Arc<OnceCell<bool>>>>,
}

impl HealthCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for `endpoint`, running `checker` once if needed
    pub async fn is_healthy(
        &self,
        endpoint: &Endpoint,
        checker: &dyn HealthCheck,
        timeout: Duration,
    ) -> bool {
        let cell = {
            let mut cells = self
                .cells
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(cells.entry(endpoint.clone()).or_default())
        };

        *cell
            .get_or_init(|| async {
                let healthy = checker.check(endpoint, timeout).await;
                if healthy {
                    tracing::debug!("Endpoint {} is healthy", endpoint);
                } else {
                    tracing::warn!("Endpoint {} failed its health check", endpoint);
                }
                healthy
            })
            .await
    }

    /// Number of endpoints checked so far
    pub fn checked_count(&self) -> usize {
        let cells = self
            .cells
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cells.values().filter(|cell| cell.initialized()).count()
    }
}

/// The candidate endpoints of one category
pub struct EndpointPool {
    candidates: Vec<Endpoint>,
    checker: Arc<dyn HealthCheck>,
    cache: Arc<HealthCache>,
    timeout: Duration,
}

impl EndpointPool {
    pub fn new(
        candidates: Vec<Endpoint>,
        checker: Arc<dyn HealthCheck>,
        cache: Arc<HealthCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            candidates,
            checker,
            cache,
            timeout,
        }
    }

    pub fn candidates(&self) -> &[Endpoint] {
        &self.candidates
    }

    /// Selects a healthy endpoint for the worker at `worker_index`
    ///
    /// Candidates are tried in order starting at `worker_index % len`,
    /// wrapping around. Returns None if no candidate passes its check.
    pub async fn select(&self, worker_index: usize) -> Option<Endpoint> {
        if self.candidates.is_empty() {
            return None;
        }

        let offset = worker_index % self.candidates.len();
        for i in 0..self.candidates.len() {
            let endpoint = &self.candidates[(offset + i) % self.candidates.len()];
            if self
                .cache
                .is_healthy(endpoint, self.checker.as_ref(), self.timeout)
                .await
            {
                return Some(endpoint.clone());
            }
        }

        None
    }
}
