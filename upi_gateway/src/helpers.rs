//! The gateway's HMAC-SHA256 signature scheme.
//!
//! Synchronous confirmations are signed over the string `"{intent_id}|{payment_id}"` with the API secret; webhook
//! deliveries are signed over the *raw* request body with the (distinct) webhook secret. Signatures are lowercase
//! hex digests. Comparisons go through [`hmac::Mac::verify_slice`], which is constant-time, so a forged signature
//! cannot be guessed byte-by-byte from timing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the lowercase hex HMAC-SHA256 of `data` under `secret`.
pub fn calculate_hmac_hex(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    hex_encode(&mac.finalize().into_bytes())
}

/// Verifies a lowercase-hex signature over `data`. Returns `false` for malformed hex as well as for a mismatch.
pub fn verify_hmac_hex(secret: &str, data: &[u8], signature_hex: &str) -> bool {
    let signature = match hex_decode(signature_hex) {
        Some(bytes) => bytes,
        None => return false,
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.verify_slice(&signature).is_ok()
}

/// Verifies the signature of a synchronous payment confirmation: HMAC over `"{intent_id}|{payment_id}"`.
pub fn verify_payment_signature(secret: &str, intent_id: &str, payment_id: &str, signature_hex: &str) -> bool {
    let message = format!("{intent_id}|{payment_id}");
    verify_hmac_hex(secret, message.as_bytes(), signature_hex)
}

/// Signs a synchronous payment confirmation. The server only needs this for tests and tooling; the gateway is the
/// normal signer.
pub fn sign_payment(secret: &str, intent_id: &str, payment_id: &str) -> String {
    let message = format!("{intent_id}|{payment_id}");
    calculate_hmac_hex(secret, message.as_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len()).step_by(2).map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok()).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "gw_secret_test";

    #[test]
    fn sign_and_verify_round_trip() {
        let signature = sign_payment(SECRET, "intent_1", "pay_42");
        assert!(verify_payment_signature(SECRET, "intent_1", "pay_42", &signature));
    }

    #[test]
    fn tampered_ids_fail_verification() {
        let signature = sign_payment(SECRET, "intent_1", "pay_42");
        assert!(!verify_payment_signature(SECRET, "intent_1", "pay_43", &signature));
        assert!(!verify_payment_signature(SECRET, "intent_2", "pay_42", &signature));
        assert!(!verify_payment_signature("other_secret", "intent_1", "pay_42", &signature));
    }

    #[test]
    fn malformed_signatures_are_rejected_not_panicked() {
        assert!(!verify_payment_signature(SECRET, "intent_1", "pay_42", "zz-not-hex"));
        assert!(!verify_payment_signature(SECRET, "intent_1", "pay_42", "abc"));
        assert!(!verify_payment_signature(SECRET, "intent_1", "pay_42", ""));
    }

    #[test]
    fn webhook_body_signature_covers_raw_bytes() {
        let body = br#"{"event":"payment.captured","payload":{}}"#;
        let signature = calculate_hmac_hex(SECRET, body);
        assert!(verify_hmac_hex(SECRET, body, &signature));
        let tampered = br#"{"event":"payment.captured","payload":{} }"#;
        assert!(!verify_hmac_hex(SECRET, tampered, &signature));
    }
}
