use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify an `X-PagerDuty-Signature` header against the raw delivery body.
///
/// The header carries one or more comma-separated signatures of the form
/// `v1=<hex>`; rotation means several may be present and any single match
/// accepts the delivery.
pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> bool {
    signature_header
        .split(',')
        .map(str::trim)
        .filter_map(|entry| entry.strip_prefix("v1="))
        .any(|signature_hex| {
            let Ok(signature) = hex::decode(signature_hex) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
                return false;
            };
            mac.update(body);
            mac.verify_slice(&signature).is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_valid_signature() {
        let body = br#"{"event":{"id":"01ABC"}}"#;
        let header = sign("shhh", body);
        assert!(verify_signature("shhh", body, &header));
    }

    #[test]
    fn accepts_any_match_in_a_rotated_list() {
        let body = b"payload";
        let header = format!("v1=deadbeef, {}", sign("current", body));
        assert!(verify_signature("current", body, &header));
    }

    #[test]
    fn rejects_wrong_secret_and_malformed_entries() {
        let body = b"payload";
        let header = sign("expected", body);
        assert!(!verify_signature("other", body, &header));
        assert!(!verify_signature("expected", body, "v1=nothex"));
        assert!(!verify_signature("expected", body, "v2=deadbeef"));
        assert!(!verify_signature("expected", body, ""));
    }
}
