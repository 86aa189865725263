use crate::config::types::{ApiConfig, BootstrapConfig, Config, CrawlConfig, QueryConfig, RetryConfig};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_api_config(&config.api)?;
    validate_query_config(&config.query)?;
    validate_retry_config(&config.retry)?;
    validate_bootstrap_config(&config.bootstrap)?;
    validate_crawl_config(&config.crawl)?;

    if config.output.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("endpoint", &config.endpoint)?;
    validate_http_url("search-page", &config.search_page)?;

    if config.doc_id.is_empty() {
        return Err(ConfigError::Validation("doc-id cannot be empty".to_string()));
    }

    if config.friendly_name.is_empty() {
        return Err(ConfigError::Validation(
            "friendly-name cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_query_config(config: &QueryConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.country.is_empty() {
        return Err(ConfigError::Validation("country cannot be empty".to_string()));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

fn validate_bootstrap_config(config: &BootstrapConfig) -> Result<(), ConfigError> {
    if config.debug_markup_cap == 0 {
        return Err(ConfigError::Validation(
            "debug-markup-cap must be > 0".to_string(),
        ));
    }

    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(ConfigError::Validation(format!(
            "viewport must be non-zero, got {}x{}",
            config.viewport_width, config.viewport_height
        )));
    }

    if config.navigation_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigation-timeout-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.default_target < 1 {
        return Err(ConfigError::Validation(
            "default-target must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a URL parses and uses an HTTP scheme
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
