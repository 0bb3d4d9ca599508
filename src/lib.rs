//! Catalog-Harvest: a rate-limited, page-distributed catalog scraper
//!
//! This crate discovers how many result pages each product category spans,
//! splits those pages across a bounded pool of workers, fetches every page
//! under one global rate limit and merges the extracted listings into a
//! per-category outcome that survives individual page and worker failures.

pub mod config;
pub mod harvest;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Catalog-Harvest operations
///
/// The first group of variants is the failure taxonomy of a harvest run.
/// Each one is contained at the smallest scope that can absorb it: page
/// failures stay inside a worker, worker failures inside a category and
/// category failures inside the orchestrator.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Page discovery degraded for {url}: falling back to {fallback} pages")]
    DiscoveryDegraded { url: String, fallback: u32 },

    #[error("No usable endpoint for worker {worker} of category {category}")]
    EndpointUnavailable { category: String, worker: usize },

    #[error("Worker {worker} of category {category} could not open a session: {source}")]
    SessionFailed {
        category: String,
        worker: usize,
        #[source]
        source: harvest::FetchError,
    },

    #[error("Failed to fetch {url}: {source}")]
    PageFetchFailed {
        url: String,
        #[source]
        source: harvest::FetchError,
    },

    #[error("Failed to extract records from {url}: {source}")]
    ExtractionFailed {
        url: String,
        #[source]
        source: harvest::ExtractError,
    },

    #[error("Category {category} failed: {message}")]
    CategoryFatal { category: String, message: String },

    #[error("Harvest of category {category} was cancelled")]
    Cancelled { category: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid worker state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::WorkerState,
        to: state::WorkerState,
    },
}

impl HarvestError {
    /// Returns true for errors that are recorded and absorbed below the
    /// orchestrator instead of ending a category
    pub fn is_contained(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryDegraded { .. }
                | Self::EndpointUnavailable { .. }
                | Self::SessionFailed { .. }
                | Self::PageFetchFailed { .. }
                | Self::ExtractionFailed { .. }
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{CatalogOrchestrator, CategoryOutcome, CategoryTask, ResultMap};
pub use state::WorkerState;
