use std::path::Path;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::proc_validator::validate_service_config;
use crate::config::settings::{LogFormat, LoggingConfig, ServiceConfig};

/// Load, default and validate config from a YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;

    let expanded = expand_env_vars(&content)?;
    parse_config(expanded)
}

pub fn parse_config(content: String) -> Result<ServiceConfig> {
    let mut service_config: ServiceConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| error!("parse config error: {}", e))?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::new("info".to_owned(), LogFormat::Compact));
    }

    debug!("validation config ...");
    validate_service_config(&service_config)
        .map_err(|errors| anyhow!("config is not valid: {}", errors.join("; ")))?;

    Ok(service_config)
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}")?;
    let expanded = re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    });
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::SlotType;
    use http::Method;
    use serial_test::serial;

    const MINIMAL: &str = r#"
settings:
  base_url: "https://api.example.com"
  refresh:
    url: "https://api.example.com/auth/refresh"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse_config(MINIMAL.to_owned()).unwrap();
        let settings = &config.settings;

        assert_eq!(settings.request_timeout_ms, 30_000);
        assert_eq!(settings.refresh.method, Method::POST);
        assert_eq!(settings.refresh.token_pointer, "/token");
        assert_eq!(settings.refresh.timeout_ms, 10_000);
        assert_eq!(settings.credential.slot, SlotType::Memory);
        assert_eq!(settings.logging.as_ref().unwrap().format, LogFormat::Compact);
        assert!(!settings.metrics.is_enabled);
    }

    #[test]
    fn invalid_config_reports_every_issue() {
        let content = r#"
settings:
  base_url: "not a url"
  request_timeout_ms: 0
  refresh:
    url: "ftp://example.com/refresh"
    token_pointer: "token"
  credential:
    slot: file
"#;
        let err = parse_config(content.to_owned()).unwrap_err().to_string();

        assert!(err.starts_with("config is not valid"));
        assert!(err.contains("settings.base_url"));
        assert!(err.contains("settings.request_timeout_ms"));
        assert!(err.contains("settings.refresh.url"));
        assert!(err.contains("settings.refresh.token_pointer"));
        assert!(err.contains("settings.credential.path"));
    }

    #[tokio::test]
    #[serial]
    async fn file_config_expands_env_vars() {
        std::env::set_var("BEARER_PIPELINE_TEST_API", "https://env.example.com");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
settings:
  base_url: "${BEARER_PIPELINE_TEST_API}"
  refresh:
    url: "${BEARER_PIPELINE_TEST_REFRESH:https://fallback.example.com/refresh}"
    method: GET
"#,
        )
        .unwrap();

        let config = file_to_config(&path).await.unwrap();
        std::env::remove_var("BEARER_PIPELINE_TEST_API");

        assert_eq!(config.settings.base_url, "https://env.example.com");
        assert_eq!(config.settings.refresh.url, "https://fallback.example.com/refresh");
        assert_eq!(config.settings.refresh.method, Method::GET);
    }
}
