//! Inbound request authentication: the shared trigger secret and the
//! HMAC-SHA256 webhook signature. All comparisons are constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the `sha256=<hex>` signature for a payload. Returns `None` when
/// no secret is configured, which must never validate.
pub fn signature_for(secret: &str, payload: &[u8]) -> Option<String> {
    if secret.is_empty() {
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    Some(format!("sha256={}", to_hex(&digest)))
}

/// Verify an `X-Hub-Signature-256` header against the raw payload bytes.
pub fn verify_webhook_signature(
    secret: &str,
    payload: &[u8],
    signature_header: Option<&str>,
) -> bool {
    let Some(signature) = signature_header else {
        return false;
    };
    let Some(expected) = signature_for(secret, payload) else {
        return false;
    };
    bool::from(expected.as_bytes().ct_eq(signature.as_bytes()))
}

/// Verify a provided shared secret. An empty configured secret rejects
/// everything.
pub fn verify_shared_secret(expected: &str, provided: Option<&str>) -> bool {
    if expected.is_empty() {
        return false;
    }
    let Some(provided) = provided else {
        return false;
    };
    bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
