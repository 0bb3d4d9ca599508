//! Storage traits and error types

use crate::harvest::{CategoryOutcome, Record};
use crate::storage::{OutcomeRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence of harvest runs and their outcomes
///
/// Outcomes are written once per category after the orchestrator returns;
/// nothing in the harvest core touches storage.
pub trait OutcomeStore {
    // ===== Run Management =====

    /// Creates a new run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Outcomes =====

    /// Stores one category outcome with all of its records
    ///
    /// Saving the same category twice for one run replaces the earlier copy.
    fn save_outcome(&mut self, run_id: i64, outcome: &CategoryOutcome) -> StorageResult<()>;

    /// Loads the outcome summaries of a run, ordered by category id
    fn load_outcomes(&self, run_id: i64) -> StorageResult<Vec<OutcomeRecord>>;

    /// Loads the records of one category in their harvested order
    fn load_records(&self, run_id: i64, category_id: &str) -> StorageResult<Vec<Record>>;

    // ===== Statistics =====

    /// Counts the records stored for a run
    fn count_records(&self, run_id: i64) -> StorageResult<u64>;
}
