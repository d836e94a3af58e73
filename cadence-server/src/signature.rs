//! Webhook signature verification.
//!
//! Providers sign webhook deliveries with an HMAC-SHA256 over
//! `"{id}.{timestamp}.{body}"`, keyed by a shared `whsec_`-prefixed,
//! base64-encoded secret. The signature header may carry several
//! space-separated candidates (`v1,<base64>`), any one of which may match
//! after a key rotation. Verification fails closed: anything missing or
//! undecodable rejects the request.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn signing_key(secret: &str) -> Vec<u8> {
    let trimmed = secret.strip_prefix("whsec_").unwrap_or(secret);
    // Secrets are normally base64; tolerate raw keys.
    STANDARD
        .decode(trimmed)
        .unwrap_or_else(|_| trimmed.as_bytes().to_vec())
}

fn signed_content_mac(secret: &str, msg_id: &str, timestamp: &str, body: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(&signing_key(secret)).ok()?;
    mac.update(msg_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    Some(mac)
}

/// Check a signature header against the signed content.
///
/// Returns `true` only if some candidate in the header matches the
/// HMAC of `"{msg_id}.{timestamp}.{body}"` under `secret`.
#[must_use]
pub fn verify(secret: &str, msg_id: &str, timestamp: &str, signature_header: &str, body: &str) -> bool {
    let Some(mac) = signed_content_mac(secret, msg_id, timestamp, body) else {
        return false;
    };

    signature_header.split_whitespace().any(|candidate| {
        let encoded = candidate.strip_prefix("v1,").unwrap_or(candidate);
        STANDARD
            .decode(encoded)
            .is_ok_and(|decoded| mac.clone().verify_slice(&decoded).is_ok())
    })
}

/// Produce the `v1,<base64>` signature a provider would send.
///
/// Used by tests and local tooling to fabricate verifiable deliveries.
#[must_use]
pub fn sign(secret: &str, msg_id: &str, timestamp: &str, body: &str) -> String {
    signed_content_mac(secret, msg_id, timestamp, body).map_or_else(String::new, |mac| {
        format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    #[test]
    fn test_roundtrip_verifies() {
        let body = r#"{"type":"email.opened","data":{"email_id":"re_1"}}"#;
        let signature = sign(SECRET, "msg_1", "1700000000", body);
        assert!(verify(SECRET, "msg_1", "1700000000", &signature, body));
    }

    #[test]
    fn test_tampered_body_fails() {
        let signature = sign(SECRET, "msg_1", "1700000000", "original");
        assert!(!verify(SECRET, "msg_1", "1700000000", &signature, "tampered"));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let signature = sign(SECRET, "msg_1", "1700000000", "body");
        assert!(!verify(
            "whsec_c29tZW90aGVyc2VjcmV0",
            "msg_1",
            "1700000000",
            &signature,
            "body"
        ));
    }

    #[test]
    fn test_any_candidate_in_header_matches() {
        let body = "body";
        let good = sign(SECRET, "msg_1", "1700000000", body);
        let header = format!("v1,Zm9yZWlnbg== {good}");
        assert!(verify(SECRET, "msg_1", "1700000000", &header, body));
    }

    #[test]
    fn test_garbage_header_fails_closed() {
        assert!(!verify(SECRET, "msg_1", "1700000000", "", "body"));
        assert!(!verify(SECRET, "msg_1", "1700000000", "not base64 at all", "body"));
    }

    #[test]
    fn test_raw_secret_is_tolerated() {
        let signature = sign("plain-secret", "msg_1", "1700000000", "body");
        assert!(verify("plain-secret", "msg_1", "1700000000", &signature, "body"));
    }
}
