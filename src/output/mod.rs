//! Output module for harvest summaries
//!
//! This module handles:
//! - Persisting a run's outcomes to the outcome store
//! - Recording and printing harvest statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, CategorySummary, HarvestStatistics};

use crate::harvest::ResultMap;
use crate::storage::{OutcomeStore, RunStatus};
use crate::HarvestError;

/// Stores every outcome of a run and closes the run
///
/// # Arguments
///
/// * `store` - Destination store
/// * `run_id` - Run created before the harvest started
/// * `results` - Outcomes returned by the orchestrator
/// * `interrupted` - Whether the run was cancelled
pub fn persist_results(
    store: &mut dyn OutcomeStore,
    run_id: i64,
    results: &ResultMap,
    interrupted: bool,
) -> Result<(), HarvestError> {
    let mut category_ids: Vec<&String> = results.keys().collect();
    category_ids.sort();
    for category_id in category_ids {
        store.save_outcome(run_id, &results[category_id])?;
    }

    if interrupted {
        store.update_run_status(run_id, RunStatus::Interrupted)?;
    } else {
        store.complete_run(run_id)?;
    }

    tracing::info!("Stored {} category outcomes for run {}", results.len(), run_id);
    Ok(())
}
