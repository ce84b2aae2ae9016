//! # Bearer Pipeline Library
//!
//! Authenticated HTTP transport: attaches the bearer credential to every
//! outbound call, renews it single-flight when it goes stale, and retries a
//! request exactly once when the server rejects it as unauthenticated.
//!
//! Modules:
//! - `credential` — credential decoding, persisted slot and store
//! - `refresh` — refresh endpoint and single-flight coordinator
//! - `pipeline` — request context and the authentication-aware pipeline
//! - `config` — YAML configuration and validation

pub mod config;
pub mod credential;
pub mod errors;
pub mod helpers;
pub mod observability;
pub mod pipeline;
pub mod refresh;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::settings::ServiceConfig;
pub use crate::credential::store::CredentialStore;
pub use crate::credential::token::Credential;
pub use crate::errors::PipelineError;
pub use crate::pipeline::context::RequestContext;
pub use crate::pipeline::pipeline::RequestPipeline;
pub use crate::refresh::coordinator::{RefreshCoordinator, RefreshOutcome};
pub use crate::refresh::endpoint::{HttpRefreshEndpoint, RefreshEndpoint};
