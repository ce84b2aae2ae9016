//! Configuration validation with aggregated errors.
//! Every issue is collected into one Vec<String> so a broken config is
//! reported in a single pass.

use reqwest::Url;
use tracing::{error, info};

use crate::config::settings::{LoggingConfig, RefreshConfig, ServiceConfig, SettingsConfig, SlotType};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);

    if errors.is_empty() {
        info!("config is valid");
        Ok(())
    } else {
        for e in &errors {
            error!("config error: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    validate_http_url("settings.base_url", &settings.base_url, errors);

    if settings.request_timeout_ms == 0 {
        errors.push("settings.request_timeout_ms must be > 0".to_string());
    }

    validate_refresh(&settings.refresh, errors);

    if settings.credential.slot == SlotType::File
        && settings.credential.path.as_deref().map_or(true, |p| p.trim().is_empty())
    {
        errors.push("settings.credential.path is required when slot is 'file'".to_string());
    }

    if let Some(logging) = &settings.logging {
        validate_logging(logging, errors);
    }
}

fn validate_refresh(refresh: &RefreshConfig, errors: &mut Vec<String>) {
    validate_http_url("settings.refresh.url", &refresh.url, errors);

    if refresh.timeout_ms == 0 {
        errors.push("settings.refresh.timeout_ms must be > 0".to_string());
    }
    if !refresh.token_pointer.starts_with('/') {
        errors.push(format!(
            "settings.refresh.token_pointer '{}' must be a JSON pointer starting with '/'",
            refresh.token_pointer
        ));
    }
}

fn validate_logging(logging: &LoggingConfig, errors: &mut Vec<String>) {
    if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
        errors.push(format!(
            "settings.logging.level '{}' must be one of {:?}",
            logging.level, LOG_LEVELS
        ));
    }
}

fn validate_http_url(field: &str, value: &str, errors: &mut Vec<String>) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!("{} scheme '{}' must be http or https", field, url.scheme())),
        Err(e) => errors.push(format!("{} '{}' is not a valid url: {}", field, value, e)),
    }
}
