use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderValue, AUTHORIZATION};
use http::{Method, StatusCode};
use reqwest::{Client, Response, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credential::store::CredentialStore;
use crate::credential::token::Credential;
use crate::errors::PipelineError;
use crate::observability::metrics::get_metrics;
use crate::pipeline::context::RequestContext;
use crate::refresh::coordinator::{RefreshCoordinator, RefreshOutcome};
use crate::refresh::endpoint::RefreshEndpoint;
use crate::utils::constants::DEFAULT_REQUEST_TIMEOUT_MS;

static OK_MSG: &str = "ok";
static STATUS_MSG: &str = "status";
static AUTH_REJECTED_MSG: &str = "auth_rejected";
static RETRY_EXHAUSTED_MSG: &str = "retry_exhausted";
static TRANSPORT_MSG: &str = "transport";

/// What the pre-send hook did to the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreSend {
    AsStored,
    Refreshed,
    RefreshFailed,
}

/// Authentication-aware wrapper around every outbound call.
///
/// Reads the credential, refreshes it up front when it looks stale, and on a
/// 401 refreshes and resends the same request exactly once. A call never
/// causes more than one refresh: when the credential was already refreshed
/// before sending, a 401 is final. It never writes the credential store itself.
pub struct RequestPipeline<E: RefreshEndpoint> {
    client: Client,
    base_url: String,
    default_timeout: Duration,
    store: Arc<CredentialStore>,
    coordinator: RefreshCoordinator<E>,
}

impl<E: RefreshEndpoint> Clone for RequestPipeline<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            default_timeout: self.default_timeout,
            store: Arc::clone(&self.store),
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<E: RefreshEndpoint> RequestPipeline<E> {
    pub fn new(client: Client, base_url: &str, coordinator: RefreshCoordinator<E>) -> Result<Self, PipelineError> {
        Url::parse(base_url).map_err(|e| PipelineError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            default_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            store: Arc::clone(coordinator.store()),
            coordinator,
        })
    }

    pub fn with_default_timeout(mut self, default_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<E> {
        &self.coordinator
    }

    pub async fn request(&self, method: Method, url: &str, body: Option<Value>) -> Result<Response, PipelineError> {
        let mut context = RequestContext::new(method, url);
        context.body = body;
        self.send(context).await
    }

    pub async fn send(&self, mut context: RequestContext) -> Result<Response, PipelineError> {
        let metrics = get_metrics();
        let (mut credential, pre_send) = self.credential_for_send().await;

        loop {
            let response = self
                .dispatch(&context, credential.as_ref())
                .await
                .inspect_err(|_| metrics.requests.with_label_values(&[TRANSPORT_MSG]).inc())?;

            let status = response.status();
            if status != StatusCode::UNAUTHORIZED {
                return finish(response).await;
            }

            // one refresh per original call: a pre-send refresh counts
            match pre_send {
                PreSend::RefreshFailed => {
                    debug!(method = %context.method, url = %context.url, "rejected after failed refresh");
                    metrics.requests.with_label_values(&[AUTH_REJECTED_MSG]).inc();
                    return Err(PipelineError::AuthenticationRejected { status });
                }
                PreSend::Refreshed => context.mark_retried(),
                PreSend::AsStored => {}
            }

            if context.retried() {
                warn!(method = %context.method, url = %context.url, "rejected with a fresh credential, giving up");
                metrics.requests.with_label_values(&[RETRY_EXHAUSTED_MSG]).inc();
                return Err(PipelineError::RetryExhausted { status });
            }

            context.mark_retried();
            info!(method = %context.method, url = %context.url, "server rejected credential, refreshing");
            match self.coordinator.refresh().await {
                RefreshOutcome::Refreshed(_) => {
                    metrics.request_retries.inc();
                    credential = self.store.get();
                }
                RefreshOutcome::Failed => {
                    metrics.requests.with_label_values(&[AUTH_REJECTED_MSG]).inc();
                    return Err(PipelineError::AuthenticationRejected { status });
                }
            }
        }
    }

    /// Pre-send hook: the credential to attach, refreshed first if stale.
    async fn credential_for_send(&self) -> (Option<Credential>, PreSend) {
        let Some(credential) = self.store.get() else {
            return (None, PreSend::AsStored);
        };
        if !self.store.is_expired(&credential) {
            return (Some(credential), PreSend::AsStored);
        }

        debug!(expires_at = ?credential.expires_at, "credential expired, refreshing before send");
        match self.coordinator.refresh().await {
            RefreshOutcome::Refreshed(_) => (self.store.get(), PreSend::Refreshed),
            RefreshOutcome::Failed => (None, PreSend::RefreshFailed),
        }
    }

    async fn dispatch(&self, context: &RequestContext, credential: Option<&Credential>) -> Result<Response, PipelineError> {
        let url = self.resolve_url(&context.url)?;

        let mut headers = context.headers.clone();
        headers.remove(AUTHORIZATION);
        if let Some(credential) = credential {
            match HeaderValue::from_str(&credential.authorization_value()) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("credential is not a valid header value, sending without it"),
            }
        }

        debug!(
            method = %context.method,
            url = %url,
            authenticated = headers.contains_key(AUTHORIZATION),
            retried = context.retried(),
            "sending request"
        );

        let mut request = self
            .client
            .request(context.method.clone(), url)
            .headers(headers)
            .timeout(context.timeout.unwrap_or(self.default_timeout));
        if let Some(body) = &context.body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    fn resolve_url(&self, url: &str) -> Result<Url, PipelineError> {
        if let Ok(absolute) = Url::parse(url) {
            if matches!(absolute.scheme(), "http" | "https") {
                return Ok(absolute);
            }
        }
        let full = format!("{}/{}", self.base_url, url.trim_start_matches('/'));
        Url::parse(&full).map_err(|e| PipelineError::InvalidUrl {
            url: full.clone(),
            reason: e.to_string(),
        })
    }
}

async fn finish(response: Response) -> Result<Response, PipelineError> {
    let metrics = get_metrics();
    let status = response.status();
    if status.is_success() {
        metrics.requests.with_label_values(&[OK_MSG]).inc();
        return Ok(response);
    }

    metrics.requests.with_label_values(&[STATUS_MSG]).inc();
    let body = response
        .text()
        .await
        .inspect_err(|err| warn!(%status, "reading error response body failed: {}", err))?;
    Err(PipelineError::Status { status, body })
}
