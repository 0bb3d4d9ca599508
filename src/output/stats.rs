//! Statistics for a finished harvest
//!
//! Statistics can be derived from the in-memory result map right after a
//! run, or from the outcomes persisted for an earlier run.

use crate::harvest::{CategoryOutcome, ResultMap};
use crate::storage::{OutcomeRecord, OutcomeStore};
use crate::HarvestError;

/// Per-category line of the summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category_id: String,
    pub success: bool,
    pub degraded: bool,
    pub records: u64,
    pub total_pages: u32,
    pub pages_attempted: u32,
    pub pages_failed: u32,
    pub workers_aborted: u32,
    pub error: Option<String>,
}

impl From<&CategoryOutcome> for CategorySummary {
    fn from(outcome: &CategoryOutcome) -> Self {
        Self {
            category_id: outcome.category_id.clone(),
            success: outcome.success,
            degraded: outcome.is_degraded(),
            records: outcome.records.len() as u64,
            total_pages: outcome.total_pages,
            pages_attempted: outcome.pages_attempted,
            pages_failed: outcome.pages_failed,
            workers_aborted: outcome.workers_aborted,
            error: outcome.error.clone(),
        }
    }
}

impl From<&OutcomeRecord> for CategorySummary {
    fn from(outcome: &OutcomeRecord) -> Self {
        Self {
            category_id: outcome.category_id.clone(),
            success: outcome.success,
            degraded: outcome.discovery.is_some_and(|source| source.is_degraded()),
            records: outcome.record_count,
            total_pages: outcome.total_pages,
            pages_attempted: outcome.pages_attempted,
            pages_failed: outcome.pages_failed,
            workers_aborted: outcome.workers_aborted,
            error: outcome.error.clone(),
        }
    }
}

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStatistics {
    pub categories_total: usize,
    pub categories_succeeded: usize,
    pub categories_failed: usize,

    /// Categories whose page count was a fallback guess
    pub categories_degraded: usize,

    pub total_records: u64,
    pub pages_attempted: u64,
    pub pages_failed: u64,
    pub workers_aborted: u64,

    /// One line per category, ordered by category id
    pub categories: Vec<CategorySummary>,
}

impl HarvestStatistics {
    /// Summarises the outcomes of a run that just finished
    pub fn from_results(results: &ResultMap) -> Self {
        Self::from_summaries(results.values().map(CategorySummary::from).collect())
    }

    /// Summarises outcomes loaded from storage
    pub fn from_records(records: &[OutcomeRecord]) -> Self {
        Self::from_summaries(records.iter().map(CategorySummary::from).collect())
    }

    fn from_summaries(mut categories: Vec<CategorySummary>) -> Self {
        categories.sort_by(|a, b| a.category_id.cmp(&b.category_id));

        let mut stats = Self {
            categories_total: categories.len(),
            ..Self::default()
        };

        for category in &categories {
            if category.success {
                stats.categories_succeeded += 1;
            } else {
                stats.categories_failed += 1;
            }
            if category.degraded {
                stats.categories_degraded += 1;
            }
            stats.total_records += category.records;
            stats.pages_attempted += u64::from(category.pages_attempted);
            stats.pages_failed += u64::from(category.pages_failed);
            stats.workers_aborted += u64::from(category.workers_aborted);
        }

        stats.categories = categories;
        stats
    }

    /// Share of attempted pages that produced records, in percent
    pub fn page_success_rate(&self) -> f64 {
        if self.pages_attempted == 0 {
            return 0.0;
        }
        let succeeded = self.pages_attempted - self.pages_failed;
        (succeeded as f64 / self.pages_attempted as f64) * 100.0
    }
}

/// Loads statistics for a persisted run
///
/// # Arguments
///
/// * `store` - The storage backend to query
/// * `run_id` - The run to summarise
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query storage
pub fn load_statistics(
    store: &dyn OutcomeStore,
    run_id: i64,
) -> Result<HarvestStatistics, HarvestError> {
    let outcomes = store.load_outcomes(run_id)?;
    Ok(HarvestStatistics::from_records(&outcomes))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Categories: {}", stats.categories_total);
    println!("  Succeeded: {}", stats.categories_succeeded);
    println!("  Failed: {}", stats.categories_failed);
    println!("  Degraded discovery: {}", stats.categories_degraded);
    println!("  Records: {}", stats.total_records);
    println!();

    println!("Categories:");
    for category in &stats.categories {
        let status = match (category.success, category.degraded) {
            (false, _) => "failed",
            (true, true) => "ok (degraded)",
            (true, false) => "ok",
        };
        println!(
            "  {}: {} - {} records, {}/{} pages failed of {}, {} workers aborted",
            category.category_id,
            status,
            category.records,
            category.pages_failed,
            category.pages_attempted,
            category.total_pages,
            category.workers_aborted
        );
        if let Some(error) = &category.error {
            println!("      error: {}", error);
        }
    }
    println!();

    println!(
        "Page Success Rate: {:.1}% ({} / {} pages failed)",
        stats.page_success_rate(),
        stats.pages_failed,
        stats.pages_attempted
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::{DiscoverySource, Record};

    fn outcome(id: &str, records: usize, attempted: u32, failed: u32) -> CategoryOutcome {
        CategoryOutcome {
            category_id: id.to_string(),
            records: vec![Record::new().with("name", "x"); records],
            success: true,
            error: None,
            total_pages: attempted,
            discovery: Some(DiscoverySource::LastPageControl),
            pages_attempted: attempted,
            pages_failed: failed,
            workers_aborted: 0,
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_from_results() {
        let mut degraded = outcome("gpu", 0, 5, 5);
        degraded.discovery = Some(DiscoverySource::Fallback);

        let mut results = ResultMap::new();
        results.insert("ram".to_string(), outcome("ram", 40, 2, 0));
        results.insert("gpu".to_string(), degraded);
        results.insert("cpu".to_string(), CategoryOutcome::failed("cpu", "boom"));

        let stats = HarvestStatistics::from_results(&results);

        assert_eq!(stats.categories_total, 3);
        assert_eq!(stats.categories_succeeded, 2);
        assert_eq!(stats.categories_failed, 1);
        assert_eq!(stats.categories_degraded, 1);
        assert_eq!(stats.total_records, 40);
        assert_eq!(stats.pages_attempted, 7);
        assert_eq!(stats.pages_failed, 5);

        let ids: Vec<&str> = stats.categories.iter().map(|c| c.category_id.as_str()).collect();
        assert_eq!(ids, vec!["cpu", "gpu", "ram"]);
    }

    #[test]
    fn test_capped_discovery_counts_as_degraded() {
        let mut capped = outcome("ssd", 10, 1000, 0);
        capped.discovery = Some(DiscoverySource::Capped);
        assert!(capped.is_degraded());

        let mut results = ResultMap::new();
        results.insert("ssd".to_string(), capped);
        assert_eq!(HarvestStatistics::from_results(&results).categories_degraded, 1);
    }

    #[test]
    fn test_page_success_rate() {
        let mut results = ResultMap::new();
        results.insert("ram".to_string(), outcome("ram", 3, 4, 1));

        let stats = HarvestStatistics::from_results(&results);
        assert!((stats.page_success_rate() - 75.0).abs() < f64::EPSILON);

        assert_eq!(HarvestStatistics::default().page_success_rate(), 0.0);
    }
}
