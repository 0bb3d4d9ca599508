//! Harvest module: the concurrent catalog fetch core
//!
//! This module contains everything between a list of categories and the
//! final result map, including:
//! - Global request rate limiting
//! - Page count discovery and page range partitioning
//! - Endpoint selection with cached health checks
//! - Fetch workers, per-category coordinators and the outer orchestrator

mod components;
mod context;
mod coordinator;
mod distributor;
mod endpoint;
mod extractor;
mod fetcher;
mod orchestrator;
mod rate_limiter;
mod scout;
mod worker;

#[cfg(test)]
mod testing;

pub use components::{ComponentKind, FIELD_MODEL};
pub use context::{Collaborators, RunContext};
pub use coordinator::{CategoryCoordinator, CategoryOutcome, CategoryTask};
pub use distributor::{expand_to_urls, partition, PageRange};
pub use endpoint::{Endpoint, EndpointPool, HealthCache, HealthCheck, HttpHealthCheck};
pub use extractor::{
    clean_price, ExtractError, Extractor, ListingExtractor, Record, FIELD_NAME, FIELD_PRICE,
    FIELD_URL,
};
pub use fetcher::{
    build_http_client, FetchError, FetchSession, Fetcher, HttpFetcher, RawPage, ScopedSession,
};
pub use orchestrator::{CatalogOrchestrator, ResultMap};
pub use rate_limiter::RateLimiter;
pub use scout::{count_pages, DiscoverySource, PageCount, PageScout};
pub use worker::{FetchWorker, PartialResult};

use crate::config::Config;
use crate::HarvestError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds the HTTP-backed collaborators described by `config`
pub fn http_collaborators(config: &Config) -> Collaborators {
    Collaborators {
        fetcher: Arc::new(HttpFetcher::new(config.http.clone())),
        extractor: Arc::new(
            ListingExtractor::new(config.extractor.clone()).with_components(
                config
                    .categories
                    .iter()
                    .filter_map(|entry| entry.component.map(|kind| (entry.id.clone(), kind)))
                    .collect(),
            ),
        ),
        health_check: Arc::new(HttpHealthCheck::new(config.http.clone())),
    }
}

/// Runs a complete harvest of every configured category
///
/// This is the main entry point for a run. It will:
/// 1. Build the HTTP fetcher, extractor and health check
/// 2. Turn each `[[category]]` entry into a task
/// 3. Run the orchestrator until every category finishes or `cancel` fires
///
/// # Arguments
///
/// * `config` - A validated configuration
/// * `cancel` - Token that aborts the run when cancelled
///
/// # Returns
///
/// * `Ok(ResultMap)` - One outcome per category
/// * `Err(HarvestError)` - The category list was unusable
pub async fn run_harvest(
    config: &Config,
    cancel: CancellationToken,
) -> Result<ResultMap, HarvestError> {
    let tasks = config.categories.iter().map(CategoryTask::from).collect();
    let orchestrator = CatalogOrchestrator::new(
        config.harvest.clone(),
        config.scout.clone(),
        http_collaborators(config),
    );

    orchestrator.run_with_cancel(tasks, cancel).await
}
