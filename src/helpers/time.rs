use chrono::Utc;

use crate::utils::constants::DEFAULT_SAFETY_MARGIN_SECONDS;

/// Effective margin: explicit settings value, otherwise the crate default.
pub fn get_token_safety_margin_seconds(safety_margin_seconds_settings: Option<u64>) -> u64 {
    safety_margin_seconds_settings.unwrap_or(DEFAULT_SAFETY_MARGIN_SECONDS)
}

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}
