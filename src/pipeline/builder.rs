use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tracing::info;

use crate::config::settings::{ServiceConfig, SlotType};
use crate::credential::slot::{CredentialSlot, FileSlot, MemorySlot};
use crate::credential::store::CredentialStore;
use crate::helpers::time::get_token_safety_margin_seconds;
use crate::pipeline::pipeline::RequestPipeline;
use crate::refresh::coordinator::RefreshCoordinator;
use crate::refresh::endpoint::HttpRefreshEndpoint;

/// Wire store, coordinator and pipeline from configuration.
///
/// One client with a cookie store serves both the API and the refresh
/// endpoint, so the session cookie set at login reaches the refresh call.
pub fn build_pipeline(service_config: &ServiceConfig) -> Result<RequestPipeline<HttpRefreshEndpoint>> {
    let settings = &service_config.settings;

    let client = Client::builder()
        .cookie_store(true)
        .build()
        .context("failed to build HTTP client")?;

    let slot: Arc<dyn CredentialSlot> = match settings.credential.slot {
        SlotType::Memory => Arc::new(MemorySlot::new()),
        SlotType::File => {
            let path = settings
                .credential
                .path
                .as_ref()
                .ok_or_else(|| anyhow!("credential.path is required for a file slot"))?;
            Arc::new(FileSlot::new(path))
        }
    };
    let safety_margin_seconds = get_token_safety_margin_seconds(settings.safety_margin_seconds);
    let store = Arc::new(CredentialStore::with_slot(slot).with_safety_margin(safety_margin_seconds));

    let endpoint = HttpRefreshEndpoint::new(client.clone(), &settings.refresh);
    let coordinator = RefreshCoordinator::new(store, endpoint, Duration::from_millis(settings.refresh.timeout_ms));

    let pipeline = RequestPipeline::new(client, &settings.base_url, coordinator)?
        .with_default_timeout(Duration::from_millis(settings.request_timeout_ms));

    info!(base_url = %settings.base_url, refresh_url = %settings.refresh.url, "request pipeline ready");
    Ok(pipeline)
}
