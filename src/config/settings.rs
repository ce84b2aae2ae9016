use http::Method;
use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_REFRESH_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TOKEN_POINTER,
};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
}

/// ================================
/// Global settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    /// prefix for relative request urls
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// treat the credential as expired this many seconds early
    pub safety_margin_seconds: Option<u64>,
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// ================================
/// Refresh endpoint
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    pub url: String,
    #[serde(with = "http_serde::method", default = "default_refresh_method")]
    pub method: Method,
    /// JSON pointer to the new token in the response body
    #[serde(default = "default_token_pointer")]
    pub token_pointer: String,
    /// bound on a single refresh call; a timed out refresh counts as failed
    #[serde(default = "default_refresh_timeout_ms")]
    pub timeout_ms: u64,
}

/// ================================
/// Credential slot
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialConfig {
    #[serde(default)]
    pub slot: SlotType,
    /// required for `file`
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub is_enabled: bool,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_refresh_timeout_ms() -> u64 {
    DEFAULT_REFRESH_TIMEOUT_MS
}

fn default_refresh_method() -> Method {
    Method::POST
}

fn default_token_pointer() -> String {
    DEFAULT_TOKEN_POINTER.to_owned()
}
