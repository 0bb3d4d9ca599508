//! Record extraction from catalog pages
//!
//! `Extractor` turns the raw content of one page into zero or more records.
//! It is a pure transform; all concurrency lives in the workers.

use crate::config::{ExtractorConfig, ListingSelectors};
use crate::harvest::components::ComponentKind;
use crate::harvest::fetcher::RawPage;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use url::Url;

/// One structured listing, as ordered field name to value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Errors produced while extracting records
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("malformed listing #{index}: {message}")]
    Malformed { index: usize, message: String },
}

/// Turns raw page content into records for a known category
pub trait Extractor: Send + Sync {
    fn extract(&self, category: &str, page: &RawPage) -> Result<Vec<Record>, ExtractError>;
}

/// Field names produced by `ListingExtractor`
pub const FIELD_NAME: &str = "name";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_URL: &str = "url";

/// Extracts name/price/link listings with CSS selectors
///
/// Names, prices and links are collected as three lists and paired up by
/// position; a listing with no matching price or link keeps an empty value.
/// When the category is a known product family, the specifications in each
/// name are added as extra fields.
#[derive(Debug, Clone, Default)]
pub struct ListingExtractor {
    config: ExtractorConfig,
    components: HashMap<String, ComponentKind>,
}

impl ListingExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            components: HashMap::new(),
        }
    }

    /// Assigns product families to categories whose id does not name one
    pub fn with_components(mut self, components: HashMap<String, ComponentKind>) -> Self {
        self.components = components;
        self
    }

    fn component_for(&self, category: &str) -> Option<ComponentKind> {
        self.components
            .get(category)
            .copied()
            .or_else(|| ComponentKind::from_name(category))
    }

    fn selectors_for(&self, category: &str) -> &ListingSelectors {
        self.config
            .overrides
            .get(category)
            .unwrap_or(&self.config.selectors)
    }
}

impl Extractor for ListingExtractor {
    fn extract(&self, category: &str, page: &RawPage) -> Result<Vec<Record>, ExtractError> {
        let selectors = self.selectors_for(category);
        let name_selector = parse_selector(&selectors.name)?;
        let price_selector = parse_selector(&selectors.price)?;
        let link_selector = parse_selector(&selectors.link)?;

        let component = self.component_for(category);
        let document = Html::parse_document(&page.body);
        let base_url = Url::parse(&page.url).ok();

        let names: Vec<String> = document.select(&name_selector).map(element_text).collect();
        let prices: Vec<String> = document
            .select(&price_selector)
            .map(|e| clean_price(&element_text(e)))
            .collect();
        let links: Vec<String> = document
            .select(&link_selector)
            .filter_map(|e| e.value().attr("href"))
            .map(|href| resolve_href(href, base_url.as_ref()))
            .collect();

        let mut records = Vec::with_capacity(names.len());
        for (index, name) in names.into_iter().enumerate() {
            if name.is_empty() {
                return Err(ExtractError::Malformed {
                    index,
                    message: "listing has an empty name".to_string(),
                });
            }

            let mut record = Record::new();
            if let Some(component) = component {
                for (field, value) in component.parse_fields(&name) {
                    record.insert(field, value);
                }
            }
            records.push(
                record
                    .with(FIELD_NAME, name)
                    .with(FIELD_PRICE, prices.get(index).cloned().unwrap_or_default())
                    .with(FIELD_URL, links.get(index).cloned().unwrap_or_default()),
            );
        }

        tracing::trace!("Extracted {} {} listings from {}", records.len(), category, page.url);
        Ok(records)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Collapses an element's text into one trimmed line
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_href(href: &str, base_url: Option<&Url>) -> String {
    base_url
        .and_then(|base| base.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Strips grouping spaces and currency marks from a price label
///
/// # Example
///
/// ```
/// use catalog_harvest::harvest::clean_price;
///
/// assert_eq!(clean_price("12\u{202f}499 ₽"), "12499");
/// ```
pub fn clean_price(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| !matches!(c, '₽' | 'P' | '$' | '€'))
        .collect()
}
