//! Shared state of one harvest run

use crate::config::{HarvestConfig, ScoutConfig};
use crate::harvest::endpoint::{Endpoint, EndpointPool, HealthCache, HealthCheck};
use crate::harvest::extractor::Extractor;
use crate::harvest::fetcher::Fetcher;
use crate::harvest::rate_limiter::RateLimiter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// External capabilities the harvest core depends on
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub health_check: Arc<dyn HealthCheck>,
}

/// Everything shared by the coordinators and workers of one run
///
/// The rate limiter and the health cache live exactly as long as the run:
/// a fresh context is built for every orchestrator run.
pub struct RunContext {
    pub settings: HarvestConfig,
    pub scout: ScoutConfig,
    pub collaborators: Collaborators,
    pub limiter: RateLimiter,
    pub health_cache: Arc<HealthCache>,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        settings: HarvestConfig,
        scout: ScoutConfig,
        collaborators: Collaborators,
        cancel: CancellationToken,
    ) -> Self {
        let limiter = RateLimiter::new(settings.requests_per_minute);
        Self {
            settings,
            scout,
            collaborators,
            limiter,
            health_cache: Arc::new(HealthCache::new()),
            cancel,
        }
    }

    /// Builds the endpoint pool for a category's candidate proxies
    pub fn endpoint_pool(&self, proxies: &[String]) -> EndpointPool {
        EndpointPool::new(
            Endpoint::candidates(proxies),
            Arc::clone(&self.collaborators.health_check),
            Arc::clone(&self.health_cache),
            self.settings.health_check_timeout(),
        )
    }
}
