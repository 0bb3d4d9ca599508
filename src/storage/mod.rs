//! Storage module for persisting harvest results
//!
//! This module handles all database operations for a harvest, including:
//! - SQLite database initialization and schema management
//! - Run tracking with the hash of the configuration used
//! - Per-category outcome summaries and their contained failures
//! - Extracted records as generic field/value rows

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{OutcomeStore, StorageError, StorageResult};

use crate::harvest::DiscoverySource;
use crate::HarvestError;

use std::path::Path;

/// Opens (or creates) the outcome database at `path`
pub fn open_store(path: &Path) -> Result<SqliteStore, HarvestError> {
    SqliteStore::new(path)
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// The run was cancelled before every category finished
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// Summary row of one persisted category outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub category_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub total_pages: u32,
    pub discovery: Option<DiscoverySource>,
    pub pages_attempted: u32,
    pub pages_failed: u32,
    pub workers_aborted: u32,
    pub record_count: u64,
    pub failures: Vec<String>,
}
