use crate::config::types::{
    CategoryEntry, Config, HarvestConfig, HttpConfig, OutputConfig, ScoutConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_scout_config(&config.scout)?;
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    validate_categories(&config.categories)?;
    Ok(())
}

/// Keeps only the categories named in `ids`, in configuration order
///
/// Unknown ids are rejected so a typo never silently shrinks a run.
pub fn select_categories(config: &mut Config, ids: &[String]) -> Result<(), ConfigError> {
    let known: HashSet<&str> = config.categories.iter().map(|c| c.id.as_str()).collect();
    if let Some(unknown) = ids.iter().find(|id| !known.contains(id.as_str())) {
        return Err(ConfigError::Validation(format!(
            "unknown category '{}'",
            unknown
        )));
    }

    config.categories.retain(|c| ids.contains(&c.id));
    Ok(())
}

/// Validates pool sizes, rate limit and timeouts
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.outer_concurrency < 1 || config.outer_concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "outer_concurrency must be between 1 and 32, got {}",
            config.outer_concurrency
        )));
    }

    if config.requests_per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "requests_per_minute must be >= 1, got {}",
            config.requests_per_minute
        )));
    }

    if config.page_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "page_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.health_check_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "health_check_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.page_param.is_empty()
        || !config
            .page_param
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "page_param must be a non-empty query parameter name, got '{}'",
            config.page_param
        )));
    }

    Ok(())
}

fn validate_scout_config(config: &ScoutConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "scout page_size must be >= 1".to_string(),
        ));
    }

    if config.default_page_count < 1 {
        return Err(ConfigError::Validation(
            "scout default_page_count must be >= 1".to_string(),
        ));
    }

    if config.max_pages < config.default_page_count {
        return Err(ConfigError::Validation(format!(
            "scout max_pages ({}) must be >= default_page_count ({})",
            config.max_pages, config.default_page_count
        )));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    validate_http_url(&config.probe_url, "probe_url")?;
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the category list
///
/// An empty list is rejected here: it is the one configuration problem that
/// must stop the process before any work starts.
fn validate_categories(categories: &[CategoryEntry]) -> Result<(), ConfigError> {
    if categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[category]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for entry in categories {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(entry.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category id '{}'",
                entry.id
            )));
        }

        validate_http_url(&entry.url, &format!("url of category '{}'", entry.id))?;

        for proxy in &entry.proxies {
            Url::parse(proxy).map_err(|e| {
                ConfigError::InvalidUrl(format!(
                    "Invalid proxy '{}' for category '{}': {}",
                    proxy, entry.id, e
                ))
            })?;
        }
    }

    Ok(())
}

fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: &str, url: &str) -> CategoryEntry {
        CategoryEntry {
            id: id.to_string(),
            url: url.to_string(),
            proxies: vec![],
            component: None,
        }
    }

    #[test]
    fn test_select_categories() {
        let mut config = crate::config::parse_config(
            r#"
            [harvest]
            workers = 2
            outer-concurrency = 1
            requests-per-minute = 30

            [output]
            database-path = "h.db"

            [[category]]
            id = "ram"
            url = "https://shop.example/ram"

            [[category]]
            id = "cpu"
            url = "https://shop.example/cpu"
            "#,
        )
        .unwrap();

        assert!(select_categories(&mut config.clone(), &["gpu".to_string()]).is_err());

        select_categories(&mut config, &["cpu".to_string()]).unwrap();
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[0].id, "cpu");
    }

    #[test]
    fn test_validate_categories_rejects_empty_list() {
        let err = validate_categories(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_validate_categories_rejects_duplicates() {
        let categories = vec![
            category("ram", "https://shop.example/ram"),
            category("ram", "https://shop.example/ram2"),
        ];
        assert!(validate_categories(&categories).is_err());
    }

    #[test]
    fn test_validate_categories_rejects_bad_proxy() {
        let mut entry = category("cpu", "https://shop.example/cpu");
        entry.proxies.push("not a proxy".to_string());
        let err = validate_categories(&[entry]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("https://shop.example/cpu", "url").is_ok());
        assert!(validate_http_url("http://127.0.0.1:8080/", "url").is_ok());

        assert!(validate_http_url("ftp://shop.example/", "url").is_err());
        assert!(validate_http_url("shop.example", "url").is_err());
    }

    #[test]
    fn test_validate_harvest_config_bounds() {
        let mut config = HarvestConfig {
            workers: 3,
            outer_concurrency: 2,
            requests_per_minute: 30,
            page_timeout_secs: 30,
            health_check_timeout_secs: 10,
            page_param: "p".to_string(),
        };
        assert!(validate_harvest_config(&config).is_ok());

        config.workers = 0;
        assert!(validate_harvest_config(&config).is_err());

        config.workers = 3;
        config.requests_per_minute = 0;
        assert!(validate_harvest_config(&config).is_err());

        config.requests_per_minute = 30;
        config.page_param = "p&x".to_string();
        assert!(validate_harvest_config(&config).is_err());
    }

    #[test]
    fn test_validate_scout_config_page_cap() {
        let mut config = ScoutConfig::default();
        assert!(validate_scout_config(&config).is_ok());

        config.max_pages = 4;
        let err = validate_scout_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_pages"));

        config.max_pages = 5;
        assert!(validate_scout_config(&config).is_ok());
    }
}
