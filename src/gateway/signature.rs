//! Canonical-field HMAC signatures shared by both gateways.
//!
//! A payload is authenticated by serializing a fixed set of fields as
//! `key=value` pairs in alphabetical key order joined with `&`, then applying
//! HMAC-SHA256 with the shared secret. This is the sole authentication
//! mechanism for inbound webhooks, so verification must not leak timing.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;

use crate::utils::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Deterministic serialization: alphabetical by key, `key=value` joined by `&`.
pub fn canonical_string(fields: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = fields.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);
    sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Amounts are normalized before signing so `80000` and `80000.00` canonicalize
/// identically on both sides.
pub fn amount_field(amount: Decimal) -> String {
    amount.normalize().to_string()
}

pub fn sign(secret: &str, fields: &[(&str, String)]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InternalServerError("Invalid signing key".to_string()))?;
    mac.update(canonical_string(fields).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time verification via `Mac::verify_slice`.
pub fn verify(secret: &str, fields: &[(&str, String)], signature: &str) -> Result<(), AppError> {
    let provided = hex::decode(signature)
        .map_err(|_| AppError::SecurityError("Malformed webhook signature".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InternalServerError("Invalid signing key".to_string()))?;
    mac.update(canonical_string(fields).as_bytes());
    mac.verify_slice(&provided)
        .map_err(|_| AppError::SecurityError("Webhook signature mismatch".to_string()))
}
