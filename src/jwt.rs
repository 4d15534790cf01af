//! Unverified reads of JWT claims.
//!
//! The client only uses the `exp` claim to decide when to refresh ahead of
//! time. Signatures are never checked here; the API remains the authority.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Returns the `exp` claim of `token`, or `None` when the payload is unreadable.
pub fn expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.exp?;
    let millis = (exp * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

/// True when `token` expires within `lookahead` of `now`.
///
/// Unreadable tokens count as expiring so that a refresh is attempted.
pub fn expires_within(token: &str, now: DateTime<Utc>, lookahead: Duration) -> bool {
    match expiry(token) {
        Some(exp) => {
            let lookahead = chrono::Duration::from_std(lookahead).unwrap_or(chrono::Duration::MAX);
            exp - now < lookahead
        }
        None => true,
    }
}

/// Builds an unsigned token carrying `exp`. Used by tests and local fixtures.
#[cfg(test)]
pub fn unsigned_token(exp: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let exp_secs = exp.timestamp_millis() as f64 / 1000.0;
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp_secs},"user_id":1}}"#));
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_exp_claim() {
        let exp = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let token = unsigned_token(exp);
        assert_eq!(expiry(&token), Some(exp));
    }

    #[test]
    fn half_second_left_is_within_one_second_lookahead() {
        let now = Utc::now();
        let token = unsigned_token(now + chrono::Duration::milliseconds(500));
        assert!(expires_within(&token, now, Duration::from_secs(1)));
    }

    #[test]
    fn fresh_token_is_not_expiring() {
        let now = Utc::now();
        let token = unsigned_token(now + chrono::Duration::minutes(5));
        assert!(!expires_within(&token, now, Duration::from_secs(1)));
    }

    #[test]
    fn garbage_token_counts_as_expiring() {
        assert!(expires_within("not-a-jwt", Utc::now(), Duration::from_secs(1)));
        assert!(expiry("a.!!!.c").is_none());
    }
}
