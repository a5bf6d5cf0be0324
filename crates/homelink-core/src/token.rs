// ── Token clock ──
//
// Expiry arithmetic for bearer tokens. Tokens are opaque apart from the
// `exp` claim in their middle segment; nothing here verifies signatures.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

/// Default safety margin subtracted from a token's expiry.
pub const DEFAULT_EXPIRY_MARGIN_MS: i64 = 30_000;

#[derive(Deserialize)]
struct ExpClaim {
    exp: f64,
}

/// Decode the `exp` claim of a three-segment base64url token, returned
/// as epoch milliseconds. Any malformed input yields `None`.
pub fn decode_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    // Tolerate padded encoders.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpClaim = serde_json::from_slice(&bytes).ok()?;
    if !claim.exp.is_finite() || claim.exp < 0.0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    let millis = (claim.exp * 1000.0) as i64;
    Some(millis)
}

/// True when `expires_at_ms` is absent or `now_ms` is past the expiry
/// minus `margin_ms`.
pub fn is_expired(expires_at_ms: Option<i64>, now_ms: i64, margin_ms: i64) -> bool {
    match expires_at_ms {
        None => true,
        Some(expires_at) => now_ms > expires_at.saturating_sub(margin_ms),
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned token whose payload is `claims`.
    pub(crate) fn token_with(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn decodes_exp_seconds_to_millis() {
        let token = token_with(&serde_json::json!({ "sub": "7", "exp": 1_700_000_000 }));
        assert_eq!(decode_expiry(&token), Some(1_700_000_000_000));
    }

    #[test]
    fn malformed_tokens_have_no_expiry() {
        let tokens = vec![
            String::new(),
            "not-a-token".to_owned(),
            "a.b".to_owned(),
            "a.b.c.d".to_owned(),
            "a.!!!.c".to_owned(),
            token_with(&serde_json::json!({ "sub": "7" })),
            token_with(&serde_json::json!({ "exp": "soon" })),
            token_with(&serde_json::json!({ "exp": -5 })),
        ];
        for token in &tokens {
            assert_eq!(decode_expiry(token), None, "token {token:?}");
        }
    }

    #[test]
    fn missing_expiry_counts_as_expired() {
        assert!(is_expired(None, 0, DEFAULT_EXPIRY_MARGIN_MS));
    }

    #[test]
    fn margin_boundary() {
        let expires_at = 1_000_000;
        let margin = DEFAULT_EXPIRY_MARGIN_MS;
        // now == expires_at - margin is still valid; one ms later is not.
        assert!(!is_expired(Some(expires_at), expires_at - margin, margin));
        assert!(is_expired(Some(expires_at), expires_at - margin + 1, margin));
        assert!(!is_expired(Some(expires_at), 0, margin));
        assert!(is_expired(Some(expires_at), expires_at + 1, margin));
    }
}
