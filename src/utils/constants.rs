//! Shared constants and invariants

pub const DEFAULT_SAFETY_MARGIN_SECONDS: u64 = 0;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TOKEN_POINTER: &str = "/token";

pub const AUTHORIZATION_SCHEME: &str = "Bearer";
