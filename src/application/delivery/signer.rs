//! HMAC-SHA256 payload signing for outbound deliveries.
//!
//! Receivers verify the `X-Webhook-Signature: sha256=<hex>` header by
//! recomputing the signature over the raw request body with the shared
//! subscription secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature. Lowercase, as it goes on the wire.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Compute the hex-encoded HMAC-SHA256 of a payload body.
///
/// Deterministic: the same secret and body always produce the same
/// signature, and any change to either changes it.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Format the signature as sent in the outbound header.
pub fn signature_header_value(secret: &str, body: &[u8]) -> String {
    format!("sha256={}", sign(secret, body))
}
