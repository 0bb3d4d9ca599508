//! Page count discovery
//!
//! The scout loads a category's landing page once and tries a fixed series
//! of heuristics against it, keeping the first positive answer:
//! 1. the label of the "last page" control
//! 2. the largest number among the page-number controls
//! 3. the largest page index among pagination links (query parameter or label)
//! 4. `ceil(TOTAL / page_size)` from an "N of TOTAL" product count caption
//!
//! When every heuristic comes up empty, or the page cannot be loaded at all,
//! discovery degrades to a configured default instead of failing. An
//! under-estimate only means fewer pages get harvested.

use crate::config::ScoutConfig;
use crate::harvest::context::RunContext;
use crate::harvest::endpoint::Endpoint;
use crate::harvest::fetcher::{FetchError, RawPage, ScopedSession};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

/// Which heuristic produced a page count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoverySource {
    LastPageControl,
    PageNumbers,
    PaginationLinks,
    ProductCount,
    /// A heuristic reported more pages than `max-pages`; the cap was used
    Capped,
    /// No heuristic succeeded; the configured default was used
    Fallback,
}

impl DiscoverySource {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::LastPageControl => "last_page_control",
            Self::PageNumbers => "page_numbers",
            Self::PaginationLinks => "pagination_links",
            Self::ProductCount => "product_count",
            Self::Capped => "capped",
            Self::Fallback => "fallback",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "last_page_control" => Some(Self::LastPageControl),
            "page_numbers" => Some(Self::PageNumbers),
            "pagination_links" => Some(Self::PaginationLinks),
            "product_count" => Some(Self::ProductCount),
            "capped" => Some(Self::Capped),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }

    /// True when the page count was not read from the page as-is
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Capped | Self::Fallback)
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Result of page count discovery; `pages` is always at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
    pub pages: u32,
    pub source: DiscoverySource,
}

impl PageCount {
    pub fn fallback(config: &ScoutConfig) -> Self {
        Self {
            pages: config.default_page_count.max(1),
            source: DiscoverySource::Fallback,
        }
    }

    /// True when the count is a guess rather than read from the page
    pub fn is_degraded(&self) -> bool {
        self.source.is_degraded()
    }
}

/// Discovers how many result pages a category spans
pub struct PageScout<'a> {
    ctx: &'a RunContext,
}

impl<'a> PageScout<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Discovers the page count for `base_url`
    ///
    /// Never fails. Without a usable endpoint, or when the landing page
    /// cannot be fetched, the configured default is returned and a warning
    /// is logged.
    pub async fn discover_page_count(&self, base_url: &str, endpoint: Option<&Endpoint>) -> PageCount {
        let Some(endpoint) = endpoint else {
            tracing::warn!(
                "No usable endpoint to inspect {}; assuming {} pages",
                base_url,
                self.ctx.scout.default_page_count
            );
            return PageCount::fallback(&self.ctx.scout);
        };

        let page = match self.load_landing_page(base_url, endpoint).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    "Could not load {} for page discovery ({}); assuming {} pages",
                    base_url,
                    e,
                    self.ctx.scout.default_page_count
                );
                return PageCount::fallback(&self.ctx.scout);
            }
        };

        let count = count_pages(
            &page.body,
            base_url,
            &self.ctx.scout,
            &self.ctx.settings.page_param,
        );

        if count.is_degraded() {
            tracing::warn!(
                "No pagination found on {}; assuming {} pages",
                base_url,
                count.pages
            );
        } else {
            tracing::info!("Found {} pages for {} (via {})", count.pages, base_url, count.source);
        }

        count
    }

    async fn load_landing_page(&self, url: &str, endpoint: &Endpoint) -> Result<RawPage, FetchError> {
        let session = self.ctx.collaborators.fetcher.open_session(endpoint).await?;
        let mut session = ScopedSession::new(session);
        let cancelled = || FetchError::Cancelled {
            url: url.to_string(),
        };

        tokio::select! {
            _ = self.ctx.cancel.cancelled() => return Err(cancelled()),
            _ = self.ctx.limiter.acquire() => {}
        }

        tokio::select! {
            _ = self.ctx.cancel.cancelled() => Err(cancelled()),
            result = session.fetch_bounded(url, self.ctx.settings.page_timeout()) => result,
        }
    }
}

/// Runs the discovery heuristics against landing page HTML
pub fn count_pages(html: &str, base_url: &str, config: &ScoutConfig, page_param: &str) -> PageCount {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let heuristics: [(DiscoverySource, Option<u32>); 4] = [
        (
            DiscoverySource::LastPageControl,
            from_last_page_control(&document, &config.last_page_selector),
        ),
        (
            DiscoverySource::PageNumbers,
            from_page_numbers(&document, &config.page_number_selector),
        ),
        (
            DiscoverySource::PaginationLinks,
            from_pagination_links(&document, &config.pagination_selector, base.as_ref(), page_param),
        ),
        (
            DiscoverySource::ProductCount,
            from_product_count(&document, &config.product_count_selector, config.page_size),
        ),
    ];

    let Some(count) = heuristics
        .into_iter()
        .find_map(|(source, pages)| pages.filter(|&p| p > 0).map(|pages| PageCount { pages, source }))
    else {
        return PageCount::fallback(config);
    };

    if count.pages > config.max_pages {
        tracing::warn!(
            "{} reported {} pages on {}, capping at {}",
            count.source,
            count.pages,
            base_url,
            config.max_pages
        );
        return PageCount {
            pages: config.max_pages.max(1),
            source: DiscoverySource::Capped,
        };
    }

    count
}

fn select_all<'d>(document: &'d Html, selector: &str) -> Vec<ElementRef<'d>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(e) => {
            tracing::debug!("Ignoring invalid scout selector '{}': {:?}", selector, e);
            Vec::new()
        }
    }
}

fn label(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parses a label made only of ASCII digits
fn parse_page_label(text: &str) -> Option<u32> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn from_last_page_control(document: &Html, selector: &str) -> Option<u32> {
    select_all(document, selector)
        .first()
        .and_then(|element| parse_page_label(&label(element)))
}

fn from_page_numbers(document: &Html, selector: &str) -> Option<u32> {
    select_all(document, selector)
        .iter()
        .filter_map(|element| parse_page_label(&label(element)))
        .max()
}

fn from_pagination_links(
    document: &Html,
    selector: &str,
    base: Option<&Url>,
    page_param: &str,
) -> Option<u32> {
    select_all(document, selector)
        .iter()
        .flat_map(|element| {
            let from_href = element
                .value()
                .attr("href")
                .and_then(|href| page_index_from_href(href, base, page_param));
            let from_label = parse_page_label(&label(element));
            [from_href, from_label]
        })
        .flatten()
        .max()
}

fn page_index_from_href(href: &str, base: Option<&Url>, page_param: &str) -> Option<u32> {
    let url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    url.query_pairs()
        .find(|(name, _)| name == page_param)
        .and_then(|(_, value)| parse_page_label(value.trim()))
}

fn product_count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\s\d{3})*)\s*(?:из|of)\s*(\d+(?:\s\d{3})*)")
            .expect("product count pattern is valid")
    })
}

fn from_product_count(document: &Html, selector: &str, page_size: u32) -> Option<u32> {
    let caption = select_all(document, selector)
        .first()
        .map(|element| element.text().collect::<String>())?;
    let captures = product_count_pattern().captures(&caption)?;
    let digits: String = captures
        .get(2)?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    let total: u32 = digits.parse().ok()?;

    Some(total.div_ceil(page_size.max(1)).max(1))
}
