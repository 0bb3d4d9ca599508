//! Fetch worker
//!
//! A worker owns one fetch session and walks its page range in ascending
//! order. Every page goes through the global rate limiter, a bounded fetch
//! and the extractor. A failing page is logged, counted and skipped; it
//! never ends the range.

use crate::harvest::context::RunContext;
use crate::harvest::distributor::{expand_to_urls, PageRange};
use crate::harvest::endpoint::EndpointPool;
use crate::harvest::extractor::Record;
use crate::harvest::fetcher::{FetchError, ScopedSession};
use crate::state::WorkerState;
use crate::HarvestError;
use std::time::Instant;

/// What one worker produced for its page range
#[derive(Debug)]
pub struct PartialResult {
    pub category_id: String,
    pub worker: usize,
    pub range: PageRange,
    pub records: Vec<Record>,
    pub pages_attempted: u32,
    pub pages_failed: u32,
    /// Contained errors, in the order they happened
    pub errors: Vec<HarvestError>,
    /// Terminal state the worker ended in
    pub state: WorkerState,
}

impl PartialResult {
    fn new(category_id: &str, worker: usize, range: PageRange) -> Self {
        Self {
            category_id: category_id.to_string(),
            worker,
            range,
            records: Vec::new(),
            pages_attempted: 0,
            pages_failed: 0,
            errors: Vec::new(),
            state: WorkerState::Starting,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.state == WorkerState::Aborted
    }
}

/// Fetches one page range of one category
pub struct FetchWorker {
    index: usize,
    category_id: String,
    base_url: String,
    range: PageRange,
    state: WorkerState,
}

impl FetchWorker {
    pub fn new(index: usize, category_id: &str, base_url: &str, range: PageRange) -> Self {
        Self {
            index,
            category_id: category_id.to_string(),
            base_url: base_url.to_string(),
            range,
            state: WorkerState::Starting,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, next: WorkerState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::trace!(
            "Worker {}/{} {} -> {}",
            self.category_id,
            self.index,
            self.state,
            next
        );
        self.state = next;
        Ok(())
    }

    fn advance(&mut self, next: WorkerState, result: &mut PartialResult) {
        if let Err(e) = self.transition(next) {
            tracing::error!("Worker {}/{}: {}", self.category_id, self.index, e);
            result.errors.push(e);
        }
        result.state = self.state;
    }

    /// Runs the worker to a terminal state
    ///
    /// Never fails: session setup problems end in `Aborted` with the error
    /// recorded and no pages attempted, page problems are counted in
    /// `pages_failed`.
    pub async fn run(mut self, ctx: &RunContext, pool: &EndpointPool) -> PartialResult {
        let mut result = PartialResult::new(&self.category_id, self.index, self.range);
        let started = Instant::now();

        let Some(endpoint) = pool.select(self.index).await else {
            tracing::warn!(
                "Worker {}/{} found no usable endpoint; skipping pages {}",
                self.category_id,
                self.index,
                self.range
            );
            result.errors.push(HarvestError::EndpointUnavailable {
                category: self.category_id.clone(),
                worker: self.index,
            });
            self.advance(WorkerState::Aborted, &mut result);
            return result;
        };

        let session = match ctx.collaborators.fetcher.open_session(&endpoint).await {
            Ok(session) => session,
            Err(source) => {
                tracing::warn!(
                    "Worker {}/{} could not open a session via {}: {}",
                    self.category_id,
                    self.index,
                    endpoint,
                    source
                );
                result.errors.push(HarvestError::SessionFailed {
                    category: self.category_id.clone(),
                    worker: self.index,
                    source,
                });
                self.advance(WorkerState::Aborted, &mut result);
                return result;
            }
        };
        let mut session = ScopedSession::new(session);

        self.advance(WorkerState::Running, &mut result);
        tracing::debug!(
            "Worker {}/{} fetching pages {} via {}",
            self.category_id,
            self.index,
            self.range,
            endpoint
        );

        let urls = expand_to_urls(&self.base_url, self.range, &ctx.settings.page_param);
        for url in urls {
            if ctx.cancel.is_cancelled() {
                tracing::info!(
                    "Worker {}/{} cancelled before {}",
                    self.category_id,
                    self.index,
                    url
                );
                break;
            }

            let granted = tokio::select! {
                _ = ctx.cancel.cancelled() => false,
                _ = ctx.limiter.acquire() => true,
            };
            if !granted {
                continue;
            }

            result.pages_attempted += 1;
            match self.harvest_page(ctx, &mut session, &url).await {
                Ok(records) => {
                    tracing::debug!("{}: {} records", url, records.len());
                    result.records.extend(records);
                }
                Err(e) => {
                    tracing::warn!("Skipping page: {}", e);
                    result.pages_failed += 1;
                    result.errors.push(e);
                }
            }
        }

        self.advance(WorkerState::Draining, &mut result);
        drop(session);
        self.advance(WorkerState::Done, &mut result);

        tracing::info!(
            "Worker {}/{} finished pages {}: {} records, {}/{} pages failed in {:?}",
            self.category_id,
            self.index,
            self.range,
            result.records.len(),
            result.pages_failed,
            result.pages_attempted,
            started.elapsed()
        );

        result
    }

    /// Fetches and extracts a single page
    async fn harvest_page(
        &self,
        ctx: &RunContext,
        session: &mut ScopedSession,
        url: &str,
    ) -> Result<Vec<Record>, HarvestError> {
        let fetched = tokio::select! {
            _ = ctx.cancel.cancelled() => Err(FetchError::Cancelled { url: url.to_string() }),
            result = session.fetch_bounded(url, ctx.settings.page_timeout()) => result,
        };

        let page = fetched.map_err(|source| HarvestError::PageFetchFailed {
            url: url.to_string(),
            source,
        })?;

        ctx.collaborators
            .extractor
            .extract(&self.category_id, &page)
            .map_err(|source| HarvestError::ExtractionFailed {
                url: url.to_string(),
                source,
            })
    }
}
