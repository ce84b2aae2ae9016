use std::future::Future;

use http::Method;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::settings::RefreshConfig;
use crate::errors::RefreshError;

/// The network operation that renews the credential.
///
/// Implementations return the new raw token on success; any other shape is a
/// failure.
pub trait RefreshEndpoint: Send + Sync + 'static {
    fn refresh(&self) -> impl Future<Output = Result<String, RefreshError>> + Send;
}

/// Refresh over HTTP, relying on ambient session state (cookies) and no body.
#[derive(Debug, Clone)]
pub struct HttpRefreshEndpoint {
    client: Client,
    url: String,
    method: Method,
    token_pointer: String,
}

impl HttpRefreshEndpoint {
    pub fn new(client: Client, refresh_config: &RefreshConfig) -> Self {
        Self {
            client,
            url: refresh_config.url.to_owned(),
            method: refresh_config.method.to_owned(),
            token_pointer: refresh_config.token_pointer.to_owned(),
        }
    }
}

impl RefreshEndpoint for HttpRefreshEndpoint {
    async fn refresh(&self) -> Result<String, RefreshError> {
        debug!(url = %self.url, method = %self.method, "calling refresh endpoint");
        let response = self.client.request(self.method.clone(), &self.url).send().await?;
        if !response.status().is_success() {
            return Err(RefreshError::Status(response.status()));
        }
        let body = response.text().await?;
        extract_token(&body, &self.token_pointer)
    }
}

fn extract_token(body: &str, token_pointer: &str) -> Result<String, RefreshError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| RefreshError::InvalidResponse(format!("body is not valid JSON: {}", e)))?;

    json.pointer(token_pointer)
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(|token| token.to_owned())
        .ok_or_else(|| {
            RefreshError::InvalidResponse(format!(
                "field '{}' not found or not a non-empty string",
                token_pointer
            ))
        })
}
