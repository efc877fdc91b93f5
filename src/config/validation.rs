use crate::config::types::{
    Config, CrawlerConfig, LocationEntry, OutputConfig, ProxyConfig, RoutingConfig, SiteConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_routing_config(&config.routing)?;
    if let Some(proxy) = &config.proxy {
        validate_proxy_config(proxy)?;
    }
    validate_output_config(&config.output)?;
    validate_locations(&config.locations)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 100, got {}",
            config.max_workers
        )));
    }

    if config.pages < 1 {
        return Err(ConfigError::Validation(
            "pages must be >= 1, got 0".to_string(),
        ));
    }

    if config.batch_limit < 1 {
        return Err(ConfigError::Validation(
            "batch_limit must be >= 1, got 0".to_string(),
        ));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be >= 1, got 0".to_string(),
        ));
    }

    if config.retry_backoff_max_ms < config.retry_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "retry_backoff_max_ms ({}) must not be below retry_backoff_ms ({})",
            config.retry_backoff_max_ms, config.retry_backoff_ms
        )));
    }

    Ok(())
}

/// Validates the target site
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("base_url", &config.base_url)
}

fn validate_routing_config(config: &RoutingConfig) -> Result<(), ConfigError> {
    if config.country.trim().is_empty() {
        return Err(ConfigError::Validation(
            "routing country cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates proxy configuration
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    validate_http_url("proxy endpoint", &config.endpoint)?;

    if config.api_key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "proxy api_key cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates location entries
fn validate_locations(locations: &[LocationEntry]) -> Result<(), ConfigError> {
    if locations.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[location]] entry is required".to_string(),
        ));
    }

    for entry in locations {
        if entry.locality.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Location {} must have a locality",
                entry.id_number
            )));
        }

        if entry.state.trim().is_empty()
            || !entry.state.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::Validation(format!(
                "Location '{}' has invalid state code '{}'",
                entry.locality, entry.state
            )));
        }
    }

    Ok(())
}

/// Checks that `value` parses as an http(s) URL
fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(state: &str, locality: &str) -> LocationEntry {
        LocationEntry {
            id_number: 12572,
            state: state.to_string(),
            locality: locality.to_string(),
        }
    }

    #[test]
    fn test_validate_locations() {
        assert!(validate_locations(&[location("SC", "Myrtle Beach")]).is_ok());

        assert!(validate_locations(&[]).is_err());
        assert!(validate_locations(&[location("SC", "  ")]).is_err());
        assert!(validate_locations(&[location("", "Myrtle Beach")]).is_err());
        assert!(validate_locations(&[location("S/C", "Myrtle Beach")]).is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("base_url", "https://www.redfin.com").is_ok());
        assert!(validate_http_url("base_url", "http://127.0.0.1:8080").is_ok());

        assert!(validate_http_url("base_url", "not a url").is_err());
        assert!(validate_http_url("base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_proxy_requires_key() {
        let proxy = ProxyConfig {
            endpoint: "https://proxy.example.com/v1/".to_string(),
            api_key: " ".to_string(),
            wait_ms: 3000,
        };
        assert!(matches!(
            validate_proxy_config(&proxy),
            Err(ConfigError::Validation(_))
        ));
    }
}
