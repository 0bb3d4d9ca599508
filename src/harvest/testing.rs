//! In-memory collaborators for unit tests

use crate::config::{HarvestConfig, ScoutConfig};
use crate::harvest::context::{Collaborators, RunContext};
use crate::harvest::endpoint::{Endpoint, HealthCheck};
use crate::harvest::extractor::ListingExtractor;
use crate::harvest::fetcher::{FetchError, FetchSession, Fetcher, RawPage};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Route {
    Page(String),
    Fail,
    Panic,
    Slow(Duration, String),
}

/// Fetcher serving canned pages by exact URL
///
/// Unknown URLs answer with HTTP 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: HashMap<String, Route>,
    refuse_sessions: bool,
    requested: Arc<Mutex<Vec<String>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), Route::Page(body.to_string()));
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Fail);
        self
    }

    /// The session panics when `url` is fetched
    pub fn with_panic(mut self, url: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Panic);
        self
    }

    pub fn with_slow_page(mut self, url: &str, delay: Duration, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), Route::Slow(delay, body.to_string()));
        self
    }

    pub fn refusing_sessions(mut self) -> Self {
        self.refuse_sessions = true;
        self
    }

    /// URLs fetched so far, in request order
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Most sessions that were open at the same time
    pub fn peak_sessions(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn open_session(&self, endpoint: &Endpoint) -> Result<Box<dyn FetchSession>, FetchError> {
        if self.refuse_sessions {
            return Err(FetchError::Session {
                endpoint: endpoint.to_string(),
                message: "refused".to_string(),
            });
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            routes: self.routes.clone(),
            requested: Arc::clone(&self.requested),
            closed: Arc::clone(&self.closed),
            live: Arc::clone(&self.live),
        }))
    }
}

struct MockSession {
    routes: HashMap<String, Route>,
    requested: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl FetchSession for MockSession {
    async fn fetch(&mut self, url: &str, _timeout: Duration) -> Result<RawPage, FetchError> {
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());

        let page = |body: &str| RawPage {
            url: url.to_string(),
            status_code: 200,
            body: body.to_string(),
        };

        match self.routes.get(url).cloned() {
            Some(Route::Page(body)) => Ok(page(&body)),
            Some(Route::Slow(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(page(&body))
            }
            Some(Route::Fail) => Err(FetchError::Network {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
            Some(Route::Panic) => panic!("mock session panicked on {}", url),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status_code: 404,
            }),
        }
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Health check with a fixed set of unhealthy endpoints
#[derive(Debug, Default)]
pub struct StaticHealthCheck {
    unhealthy: HashSet<Endpoint>,
    calls: AtomicUsize,
}

impl StaticHealthCheck {
    pub fn all_healthy() -> Self {
        Self::default()
    }

    pub fn unhealthy(endpoints: Vec<Endpoint>) -> Self {
        Self {
            unhealthy: endpoints.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheck for StaticHealthCheck {
    async fn check(&self, endpoint: &Endpoint, _timeout: Duration) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        !self.unhealthy.contains(endpoint)
    }
}

/// Harvest settings with rate limiting disabled
pub fn test_settings() -> HarvestConfig {
    HarvestConfig {
        workers: 3,
        outer_concurrency: 2,
        requests_per_minute: 0,
        page_timeout_secs: 5,
        health_check_timeout_secs: 1,
        page_param: "p".to_string(),
    }
}

pub fn test_collaborators(fetcher: Arc<dyn Fetcher>, health_check: Arc<dyn HealthCheck>) -> Collaborators {
    Collaborators {
        fetcher,
        extractor: Arc::new(ListingExtractor::default()),
        health_check,
    }
}

pub fn test_context(fetcher: Arc<dyn Fetcher>) -> RunContext {
    test_context_with(fetcher, Arc::new(StaticHealthCheck::all_healthy()))
}

pub fn test_context_with(fetcher: Arc<dyn Fetcher>, health_check: Arc<dyn HealthCheck>) -> RunContext {
    RunContext::new(
        test_settings(),
        ScoutConfig::default(),
        test_collaborators(fetcher, health_check),
        CancellationToken::new(),
    )
}

/// Renders a catalog page with one listing per name
pub fn listing_page(names: &[&str]) -> String {
    let listings: String = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<div class="catalog-product">
                     <div class="catalog-product__name-wrapper"><span>{name}</span></div>
                     <a class="catalog-product__name" href="/product/{i}/">{name}</a>
                     <div class="product-buy__price">{price} ₽</div>
                   </div>"#,
                name = name,
                i = i,
                price = 1000 + i * 100
            )
        })
        .collect();

    format!("<html><body>{}</body></html>", listings)
}

/// Renders a landing page whose last-page control points at `pages`
pub fn landing_page(pages: u32, names: &[&str]) -> String {
    let listings = listing_page(names);
    format!(
        r#"{}<div class="pagination-widget"><a class="pagination-widget__page-link pagination-widget__page-link_last" href="?p={pages}">{pages}</a></div>"#,
        listings,
        pages = pages
    )
}
