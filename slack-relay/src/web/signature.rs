//! Slack request signature verification.
//!
//! Slack signs every request with HMAC-SHA256 over `v0:<timestamp>:<body>` and
//! sends the hex digest as `X-Slack-Signature: v0=<hex>`.
//! Reference: https://api.slack.com/authentication/verifying-requests-from-slack

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Unix timestamp the request was signed at.
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Header carrying the `v0=` signature.
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Maximum allowed distance between the request timestamp and now, in seconds.
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 300;

const VERSION_PREFIX: &str = "v0=";

/// Slack signing secret.
///
/// An empty secret disables verification entirely.
#[derive(Clone, Default)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    /// A secret that accepts every request.
    pub fn disabled() -> Self {
        Self(Vec::new())
    }

    pub fn is_enabled(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Verify a Slack request signature against the current system time.
///
/// Returns `true` when the secret is empty. Otherwise both headers must be
/// present, the timestamp must be within [`MAX_TIMESTAMP_SKEW_SECS`] of now in
/// either direction, and the signature must match.
pub fn verify_slack_signature(
    body: &[u8],
    timestamp: &str,
    signature: &str,
    secret: &SigningSecret,
) -> bool {
    verify_slack_signature_at(body, timestamp, signature, secret, unix_now())
}

/// Same as [`verify_slack_signature`] with an explicit "now" in Unix seconds.
pub fn verify_slack_signature_at(
    body: &[u8],
    timestamp: &str,
    signature: &str,
    secret: &SigningSecret,
    now: i64,
) -> bool {
    if !secret.is_enabled() {
        return true;
    }

    if timestamp.is_empty() || signature.is_empty() {
        return false;
    }

    let request_time: i64 = match timestamp.parse() {
        Ok(t) => t,
        Err(_) => return false,
    };

    if now.abs_diff(request_time) > MAX_TIMESTAMP_SKEW_SECS {
        return false;
    }

    let provided = match signature.strip_prefix(VERSION_PREFIX) {
        Some(hash) => hash,
        None => return false,
    };

    let expected = match compute_digest(secret.as_bytes(), timestamp, body) {
        Some(digest) => digest,
        None => return false,
    };

    constant_time_compare(&expected, provided)
}

/// Produce the `v0=<hex>` signature Slack would send for this body.
pub fn sign(body: &[u8], timestamp: &str, secret: &SigningSecret) -> Option<String> {
    compute_digest(secret.as_bytes(), timestamp, body).map(|d| format!("{VERSION_PREFIX}{d}"))
}

fn compute_digest(key: &[u8], timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
///
/// Only the length check exits early; the digest length is public.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"type":"event_callback","event":{"type":"message"}}"#;

    fn secret() -> SigningSecret {
        SigningSecret::new("8f742231b10e8888abcd99yyyzzz85a5")
    }

    fn signed(timestamp: &str) -> String {
        sign(BODY, timestamp, &secret()).unwrap()
    }

    #[test]
    fn test_verify_signature_valid() {
        let ts = NOW.to_string();
        assert!(verify_slack_signature_at(BODY, &ts, &signed(&ts), &secret(), NOW));
    }

    #[test]
    fn test_verify_signature_against_system_clock() {
        let ts = unix_now().to_string();
        assert!(verify_slack_signature(BODY, &ts, &signed(&ts), &secret()));
    }

    #[test]
    fn test_known_vector() {
        // Example request from Slack's signing documentation.
        let secret = SigningSecret::new("8f742231b10e8888abcd99yyyzzz85a5");
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let ts = "1531420618";
        assert_eq!(
            sign(body, ts, &secret).unwrap(),
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503"
        );
        assert!(verify_slack_signature_at(
            body,
            ts,
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503",
            &secret,
            1_531_420_618,
        ));
    }

    #[test]
    fn test_flipped_byte_rejected() {
        let ts = NOW.to_string();
        let good = signed(&ts);

        for i in VERSION_PREFIX.len()..good.len() {
            let mut bytes = good.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let bad = String::from_utf8(bytes).unwrap();
            assert!(
                !verify_slack_signature_at(BODY, &ts, &bad, &secret(), NOW),
                "flipped byte {i} accepted"
            );
        }
    }

    #[test]
    fn test_tampered_body_rejected() {
        let ts = NOW.to_string();
        let sig = signed(&ts);
        assert!(!verify_slack_signature_at(b"{}", &ts, &sig, &secret(), NOW));
    }

    #[test]
    fn test_replay_window() {
        let ts = NOW.to_string();
        let sig = signed(&ts);

        assert!(verify_slack_signature_at(BODY, &ts, &sig, &secret(), NOW + 300));
        assert!(verify_slack_signature_at(BODY, &ts, &sig, &secret(), NOW - 300));
        assert!(!verify_slack_signature_at(BODY, &ts, &sig, &secret(), NOW + 301));
        assert!(!verify_slack_signature_at(BODY, &ts, &sig, &secret(), NOW - 301));
    }

    #[test]
    fn test_verify_signature_stale() {
        // Very old timestamp (year 2000), correctly signed
        let ts = "946684800";
        assert!(!verify_slack_signature(BODY, ts, &signed(ts), &secret()));
    }

    #[test]
    fn test_verify_signature_missing_fields() {
        let ts = NOW.to_string();
        assert!(!verify_slack_signature_at(BODY, "", &signed(&ts), &secret(), NOW));
        assert!(!verify_slack_signature_at(BODY, &ts, "", &secret(), NOW));
    }

    #[test]
    fn test_verify_signature_invalid_timestamp() {
        assert!(!verify_slack_signature_at(BODY, "not-a-number", "v0=00", &secret(), NOW));
    }

    #[test]
    fn test_verify_signature_wrong_prefix() {
        let ts = NOW.to_string();
        let sig = signed(&ts).replacen("v0=", "v1=", 1);
        assert!(!verify_slack_signature_at(BODY, &ts, &sig, &secret(), NOW));

        let bare = signed(&ts).trim_start_matches("v0=").to_string();
        assert!(!verify_slack_signature_at(BODY, &ts, &bare, &secret(), NOW));
    }

    #[test]
    fn test_disabled_secret_accepts_anything() {
        let secret = SigningSecret::disabled();
        assert!(verify_slack_signature(BODY, "", "", &secret));
        assert!(verify_slack_signature(b"garbage", "abc", "v0=nope", &secret));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_secret_debug_hides_bytes() {
        let debug = format!("{:?}", secret());
        assert!(!debug.contains("8f742231"));
        assert!(debug.contains("enabled: true"));
    }
}
