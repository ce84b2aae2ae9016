use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// Bearer credential with the expiry decoded from its `exp` claim.
///
/// `expires_at` is `None` when the claim is absent or the token is not a
/// decodable JWT; such credentials are always considered expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub raw_value: String,
    pub expires_at: Option<i64>, // UNIX TIMESTAMP
}

#[derive(Debug, Deserialize)]
struct ExpClaim {
    exp: Option<i64>,
}

impl Credential {
    pub fn parse(raw_value: impl Into<String>) -> Self {
        let raw_value = raw_value.into();
        let expires_at = decode_exp_claim(&raw_value).ok().flatten();
        Self { raw_value, expires_at }
    }

    /// `true` once `expires_at - safety_margin <= now`, or when expiry is unknown.
    pub fn is_expired_at(&self, now: i64, safety_margin_seconds: u64) -> bool {
        match self.expires_at {
            Some(exp) => exp.saturating_sub(safety_margin_seconds as i64) <= now,
            None => true,
        }
    }

    pub fn authorization_value(&self) -> String {
        format!("{} {}", crate::utils::constants::AUTHORIZATION_SCHEME, self.raw_value)
    }
}

fn decode_exp_claim(token: &str) -> Result<Option<i64>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(anyhow!("invalid JWT format"));
    }

    // some issuers keep the padding
    let payload = parts[1].trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| anyhow!("base64 decode error: {}", e))?;

    serde_json::from_slice::<ExpClaim>(&decoded)
        .map(|claims| claims.exp)
        .map_err(|e| anyhow!("invalid JWT payload: {}", e))
}

#[cfg(test)]
pub(crate) fn sample_jwt(exp: i64) -> String {
    // minimal unsigned JWT for tests: {"exp": exp}
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
    format!("{}.{}.sig", header, payload)
}
