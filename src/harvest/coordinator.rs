//! Category coordinator
//!
//! Harvests one category end to end:
//! - Discovers the page count with the scout
//! - Partitions the pages across the inner worker pool
//! - Runs one worker per partition and waits for every one of them
//! - Merges the partial results into a single outcome

use crate::config::CategoryEntry;
use crate::harvest::context::RunContext;
use crate::harvest::distributor::partition;
use crate::harvest::extractor::Record;
use crate::harvest::scout::{DiscoverySource, PageScout};
use crate::harvest::worker::{FetchWorker, PartialResult};
use crate::HarvestError;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One category to harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTask {
    pub category_id: String,
    pub base_url: String,
    /// Candidate proxy URLs in preference order; empty means direct egress
    pub proxies: Vec<String>,
}

impl CategoryTask {
    pub fn new(category_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            base_url: base_url.into(),
            proxies: Vec::new(),
        }
    }

    pub fn with_proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = proxies;
        self
    }
}

impl From<&CategoryEntry> for CategoryTask {
    fn from(entry: &CategoryEntry) -> Self {
        Self::new(entry.id.as_str(), entry.url.as_str()).with_proxies(entry.proxies.clone())
    }
}

/// Final result for one category
///
/// `success` only says the category ran to completion. A category whose
/// every page failed is still successful; check `pages_failed` and
/// `workers_aborted` to tell it apart from a genuinely empty category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutcome {
    pub category_id: String,
    pub records: Vec<Record>,
    pub success: bool,
    pub error: Option<String>,
    pub total_pages: u32,
    /// None when the category failed before discovery finished
    pub discovery: Option<DiscoverySource>,
    pub pages_attempted: u32,
    pub pages_failed: u32,
    pub workers_aborted: u32,
    /// Messages of contained errors, for reporting
    pub failures: Vec<String>,
}

impl CategoryOutcome {
    /// An unsuccessful outcome with no records
    pub fn failed(category_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            records: Vec::new(),
            success: false,
            error: Some(error.into()),
            total_pages: 0,
            discovery: None,
            pages_attempted: 0,
            pages_failed: 0,
            workers_aborted: 0,
            failures: Vec::new(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// True when the page count was a fallback guess
    pub fn is_degraded(&self) -> bool {
        self.discovery.is_some_and(|source| source.is_degraded())
    }
}

/// Runs the inner worker pool for one category at a time
pub struct CategoryCoordinator {
    ctx: Arc<RunContext>,
}

impl CategoryCoordinator {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }

    /// Harvests `task` with up to `worker_count` workers
    ///
    /// # Returns
    ///
    /// * `Ok(CategoryOutcome)` - The category ran to completion, possibly
    ///   with failed pages or aborted workers
    /// * `Err(HarvestError::Cancelled)` - The run was cancelled
    /// * `Err(HarvestError::CategoryFatal)` - The worker pool itself broke
    pub async fn run(
        &self,
        task: &CategoryTask,
        worker_count: u32,
    ) -> Result<CategoryOutcome, HarvestError> {
        let category = task.category_id.as_str();
        let started = Instant::now();
        let mut failures = Vec::new();

        let pool = Arc::new(self.ctx.endpoint_pool(&task.proxies));

        // Step 1: discover the page count
        let scout_endpoint = pool.select(0).await;
        let count = PageScout::new(&self.ctx)
            .discover_page_count(&task.base_url, scout_endpoint.as_ref())
            .await;
        if count.is_degraded() {
            let degraded = HarvestError::DiscoveryDegraded {
                url: task.base_url.clone(),
                fallback: count.pages,
            };
            tracing::warn!("{}", degraded);
            failures.push(degraded.to_string());
        }

        if self.ctx.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled {
                category: category.to_string(),
            });
        }

        // Step 2: partition
        let ranges = partition(count.pages, worker_count);
        tracing::info!(
            "Category {}: {} pages ({}) across {} workers",
            category,
            count.pages,
            count.source,
            ranges.len()
        );

        // Step 3: launch the bounded worker pool
        let limit = ranges.len().min(worker_count.max(1) as usize);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut workers = JoinSet::new();

        for (index, range) in ranges.into_iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| HarvestError::CategoryFatal {
                    category: category.to_string(),
                    message: format!("worker pool closed: {}", e),
                })?;

            let ctx = Arc::clone(&self.ctx);
            let pool = Arc::clone(&pool);
            let worker = FetchWorker::new(index, category, &task.base_url, range);

            workers.spawn(async move {
                let _permit = permit;
                worker.run(&ctx, &pool).await
            });
        }

        // Step 4: barrier on every worker
        let mut partials: Vec<PartialResult> = Vec::new();
        let mut workers_aborted = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(partial) => partials.push(partial),
                Err(e) => {
                    tracing::error!("Category {}: worker task failed: {}", category, e);
                    workers_aborted += 1;
                    failures.push(format!("worker task failed: {}", e));
                }
            }
        }

        if self.ctx.cancel.is_cancelled() {
            tracing::info!(
                "Category {} cancelled after {:?}",
                category,
                started.elapsed()
            );
            return Err(HarvestError::Cancelled {
                category: category.to_string(),
            });
        }

        // Step 5: merge, keeping each worker's page order
        partials.sort_by_key(|partial| partial.worker);

        let mut outcome = CategoryOutcome {
            category_id: category.to_string(),
            records: Vec::new(),
            success: true,
            error: None,
            total_pages: count.pages,
            discovery: Some(count.source),
            pages_attempted: 0,
            pages_failed: 0,
            workers_aborted,
            failures,
        };

        for partial in partials {
            if partial.is_aborted() {
                outcome.workers_aborted += 1;
            }
            outcome.pages_attempted += partial.pages_attempted;
            outcome.pages_failed += partial.pages_failed;
            for error in &partial.errors {
                if !error.is_contained() {
                    tracing::error!(
                        "Category {}: worker {} reported an unexpected error: {}",
                        category,
                        partial.worker,
                        error
                    );
                }
                outcome.failures.push(error.to_string());
            }
            outcome.records.extend(partial.records);
        }

        tracing::info!(
            "Category {} done: {} records, {}/{} pages failed, {} workers aborted in {:?}",
            category,
            outcome.records.len(),
            outcome.pages_failed,
            outcome.pages_attempted,
            outcome.workers_aborted,
            started.elapsed()
        );

        Ok(outcome)
    }
}
