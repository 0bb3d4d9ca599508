//! Page range partitioning
//!
//! Splits `[1, total_pages]` into contiguous, near-equal ranges, one per
//! worker, and expands a range into the concrete page URLs a worker fetches.

use std::fmt;

/// A contiguous, inclusive range of catalog page indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    /// Creates a range, returning None unless `1 <= start <= end`
    pub fn new(start: u32, end: u32) -> Option<Self> {
        if start >= 1 && start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of pages in the range (always at least one)
    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Page indices in ascending order
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Partitions `[1, total_pages]` across up to `worker_count` workers
///
/// The first `total_pages % workers` ranges get one extra page, so range
/// sizes differ by at most one. The ranges are ascending, pairwise disjoint
/// and cover every page exactly once. Degenerate input (no pages or no
/// workers) yields the single range `1-1` so there is always something to
/// run.
///
/// # Example
///
/// ```
/// use catalog_harvest::harvest::partition;
///
/// let ranges: Vec<String> = partition(7, 3).iter().map(|r| r.to_string()).collect();
/// assert_eq!(ranges, vec!["1-3", "4-5", "6-7"]);
/// ```
pub fn partition(total_pages: u32, worker_count: u32) -> Vec<PageRange> {
    if total_pages == 0 || worker_count == 0 {
        return vec![PageRange { start: 1, end: 1 }];
    }

    let workers = worker_count.min(total_pages);
    let base = total_pages / workers;
    let remainder = total_pages % workers;

    let mut ranges = Vec::with_capacity(workers as usize);
    let mut start = 1;
    for i in 0..workers {
        let size = base + u32::from(i < remainder);
        // `size - 1` first so the last range may end at u32::MAX
        let end = start + (size - 1);
        ranges.push(PageRange { start, end });
        if i + 1 < workers {
            start = end + 1;
        }
    }

    tracing::debug!(
        "Partitioned {} pages across {} workers: {:?}",
        total_pages,
        workers,
        ranges.iter().map(ToString::to_string).collect::<Vec<_>>()
    );

    ranges
}

/// Expands a range into page URLs, in ascending page order
///
/// The page index is appended as `param=N`, joined with `&` when the base
/// URL already has a query string and with `?` otherwise.
pub fn expand_to_urls(base_url: &str, range: PageRange, param: &str) -> Vec<String> {
    let separator = if base_url.contains('?') { '&' } else { '?' };

    range
        .pages()
        .map(|page| format!("{}{}{}={}", base_url, separator, param, page))
        .collect()
}
