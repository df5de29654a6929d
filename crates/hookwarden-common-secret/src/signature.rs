//! Webhook payload signatures.
//!
//! GitHub signs every delivery with HMAC-SHA256 over the raw request body and
//! sends the result as `X-Hub-Signature-256: sha256=<hex>`.

use ::hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the `X-Hub-Signature-256` header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

fn keyed(secret: &[u8]) -> HmacSha256 {
    // HMAC is defined for keys of any length.
    <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC accepts keys of any length")
}

/// Compute the header value for `body` signed with `secret`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = keyed(secret);
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Check a header value against `body`.
///
/// The comparison is constant time. Malformed headers (wrong prefix, bad
/// hex, wrong length) never verify.
pub fn verify(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let Some(encoded) = signature.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(encoded) else {
        return false;
    };

    let mut mac = keyed(secret);
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
