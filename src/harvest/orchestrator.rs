//! Catalog orchestrator
//!
//! Runs one category coordinator per task under the outer concurrency bound
//! and collects every outcome into a `ResultMap`. A category that fails,
//! panics or is cancelled is recorded as unsuccessful; it never cancels or
//! hides its siblings.

use crate::config::{HarvestConfig, ScoutConfig};
use crate::harvest::context::{Collaborators, RunContext};
use crate::harvest::coordinator::{CategoryCoordinator, CategoryOutcome, CategoryTask};
use crate::{ConfigError, HarvestError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Category id to outcome
pub type ResultMap = HashMap<String, CategoryOutcome>;

/// Entry point of a harvest run
pub struct CatalogOrchestrator {
    settings: HarvestConfig,
    scout: ScoutConfig,
    collaborators: Collaborators,
}

impl CatalogOrchestrator {
    pub fn new(settings: HarvestConfig, scout: ScoutConfig, collaborators: Collaborators) -> Self {
        Self {
            settings,
            scout,
            collaborators,
        }
    }

    /// Harvests every task and returns one outcome per category
    ///
    /// # Returns
    ///
    /// * `Ok(ResultMap)` - One entry per task, including failed categories
    /// * `Err(HarvestError::Config)` - No tasks, or duplicate category ids
    pub async fn run(&self, tasks: Vec<CategoryTask>) -> Result<ResultMap, HarvestError> {
        self.run_with_cancel(tasks, CancellationToken::new()).await
    }

    /// Like `run`, aborting cleanly once `cancel` fires
    ///
    /// Categories that had not finished when the token fired are recorded
    /// as unsuccessful.
    pub async fn run_with_cancel(
        &self,
        tasks: Vec<CategoryTask>,
        cancel: CancellationToken,
    ) -> Result<ResultMap, HarvestError> {
        check_tasks(&tasks)?;

        let started = Instant::now();
        let ctx = Arc::new(RunContext::new(
            self.settings.clone(),
            self.scout.clone(),
            self.collaborators.clone(),
            cancel,
        ));
        let worker_count = self.settings.workers;
        let semaphore = Arc::new(Semaphore::new(self.settings.outer_concurrency.max(1) as usize));

        tracing::info!(
            "Harvesting {} categories ({} at a time, {} workers each, {} requests/min)",
            tasks.len(),
            self.settings.outer_concurrency,
            worker_count,
            self.settings.requests_per_minute
        );

        let mut results = ResultMap::new();
        let mut categories = JoinSet::new();
        let mut running = HashMap::new();

        for task in tasks {
            let permit = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                tracing::info!("Category {} not started: run cancelled", task.category_id);
                let error = HarvestError::Cancelled {
                    category: task.category_id.clone(),
                };
                results.insert(
                    task.category_id.clone(),
                    CategoryOutcome::failed(task.category_id, error.to_string()),
                );
                continue;
            };

            let coordinator = CategoryCoordinator::new(Arc::clone(&ctx));
            let category_id = task.category_id.clone();
            let handle = categories.spawn(async move {
                let _permit = permit;
                coordinator.run(&task, worker_count).await
            });
            running.insert(handle.id(), category_id);
        }

        while let Some(joined) = categories.join_next_with_id().await {
            let (category_id, outcome) = match joined {
                Ok((id, Ok(outcome))) => (running.remove(&id), outcome),
                Ok((id, Err(e))) => {
                    let category_id = running.remove(&id).unwrap_or_default();
                    tracing::error!("Category {} failed: {}", category_id, e);
                    let outcome = CategoryOutcome::failed(category_id.as_str(), e.to_string());
                    (Some(category_id), outcome)
                }
                Err(e) => {
                    let category_id = running.remove(&e.id()).unwrap_or_default();
                    let fatal = HarvestError::CategoryFatal {
                        category: category_id.clone(),
                        message: e.to_string(),
                    };
                    tracing::error!("{}", fatal);
                    let outcome = CategoryOutcome::failed(category_id.as_str(), fatal.to_string());
                    (Some(category_id), outcome)
                }
            };

            if let Some(category_id) = category_id {
                results.insert(category_id, outcome);
            }
        }

        let succeeded = results.values().filter(|o| o.success).count();
        tracing::info!(
            "Harvest finished: {}/{} categories succeeded in {:?}",
            succeeded,
            results.len(),
            started.elapsed()
        );

        Ok(results)
    }
}

/// Rejects task lists that cannot produce a well-formed result map
fn check_tasks(tasks: &[CategoryTask]) -> Result<(), ConfigError> {
    if tasks.is_empty() {
        return Err(ConfigError::Validation(
            "at least one category is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.category_id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category id '{}'",
                task.category_id
            )));
        }
    }

    Ok(())
}
