use crate::harvest::ComponentKind;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub scout: ScoutConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryEntry>,
}

/// Pool sizing, rate limit and timeouts for a harvest run
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Workers per category (inner pool)
    pub workers: u32,

    /// Categories harvested at the same time (outer pool)
    #[serde(rename = "outer-concurrency")]
    pub outer_concurrency: u32,

    /// Global request budget shared by every worker of every category
    #[serde(rename = "requests-per-minute")]
    pub requests_per_minute: u32,

    /// Timeout for a single page fetch (seconds)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Timeout for a single endpoint health check (seconds)
    #[serde(
        rename = "health-check-timeout-secs",
        default = "default_health_check_timeout"
    )]
    pub health_check_timeout_secs: u64,

    /// Query parameter carrying the page index
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,
}

impl HarvestConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }
}

/// Page count discovery settings
///
/// Selectors are CSS selectors evaluated against the category landing page.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoutConfig {
    /// Listings per catalog page, used when estimating from the product count
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Page count assumed when no heuristic produces a result
    #[serde(rename = "default-page-count", default = "default_page_count")]
    pub default_page_count: u32,

    /// Upper bound on any discovered page count
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(rename = "last-page-selector", default = "default_last_page_selector")]
    pub last_page_selector: String,

    #[serde(
        rename = "page-number-selector",
        default = "default_page_number_selector"
    )]
    pub page_number_selector: String,

    #[serde(rename = "pagination-selector", default = "default_pagination_selector")]
    pub pagination_selector: String,

    #[serde(
        rename = "product-count-selector",
        default = "default_product_count_selector"
    )]
    pub product_count_selector: String,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            default_page_count: default_page_count(),
            max_pages: default_max_pages(),
            last_page_selector: default_last_page_selector(),
            page_number_selector: default_page_number_selector(),
            pagination_selector: default_pagination_selector(),
            product_count_selector: default_product_count_selector(),
        }
    }
}

/// HTTP client settings shared by the fetcher and the health check
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// URL requested through an endpoint to decide whether it is usable
    #[serde(rename = "probe-url", default = "default_probe_url")]
    pub probe_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            probe_url: default_probe_url(),
        }
    }
}

/// Listing selectors used by the record extractor
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    #[serde(flatten)]
    pub selectors: ListingSelectors,

    /// Per-category selector overrides keyed by category id
    #[serde(default)]
    pub overrides: HashMap<String, ListingSelectors>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            selectors: ListingSelectors::default(),
            overrides: HashMap::new(),
        }
    }
}

/// CSS selectors locating the parts of a product listing
#[derive(Debug, Clone, Deserialize)]
pub struct ListingSelectors {
    #[serde(rename = "name-selector", default = "default_name_selector")]
    pub name: String,

    #[serde(rename = "price-selector", default = "default_price_selector")]
    pub price: String,

    #[serde(rename = "link-selector", default = "default_link_selector")]
    pub link: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            name: default_name_selector(),
            price: default_price_selector(),
            link: default_link_selector(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One category to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    /// Category identifier (e.g., "ram")
    pub id: String,

    /// Landing URL of the category listing
    pub url: String,

    /// Candidate proxy endpoints; empty means direct egress
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Product family whose specifications are read from listing names.
    /// When unset it is inferred from `id` (e.g. "ram", "cpu-cooler").
    #[serde(default)]
    pub component: Option<ComponentKind>,
}

fn default_page_timeout() -> u64 {
    30
}

fn default_health_check_timeout() -> u64 {
    10
}

fn default_page_param() -> String {
    "p".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_page_count() -> u32 {
    5
}

fn default_max_pages() -> u32 {
    1000
}

fn default_last_page_selector() -> String {
    ".pagination-widget a.pagination-widget__page-link_last".to_string()
}

fn default_page_number_selector() -> String {
    ".pagination-widget a.pagination-widget__page-link".to_string()
}

fn default_pagination_selector() -> String {
    ".pagination-widget a".to_string()
}

fn default_product_count_selector() -> String {
    ".products-count".to_string()
}

fn default_user_agent() -> String {
    format!("catalog-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_probe_url() -> String {
    "https://www.example.com/".to_string()
}

fn default_name_selector() -> String {
    ".catalog-product__name-wrapper span".to_string()
}

fn default_price_selector() -> String {
    ".product-buy__price".to_string()
}

fn default_link_selector() -> String {
    "a.catalog-product__name".to_string()
}
