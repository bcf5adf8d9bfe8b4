//! Payment request signatures.
//!
//! The gateway verifies an RSA-SHA256 (PKCS#1 v1.5) signature over
//! `merchantCode ⧺ orderReference ⧺ currency ⧺ amount ⧺ callbackUrl`,
//! base64-encoded.

use crate::error::{GatewayError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::Sha256;

/// Keys this short cannot be a PEM-encoded RSA key; they are placeholders.
pub const MIN_PRIVATE_KEY_LEN: usize = 250;

/// The exact string the gateway expects to be signed.
pub fn signature_payload(
    merchant_code: &str,
    order_reference: &str,
    currency: &str,
    amount: &str,
    callback_url: &str,
) -> String {
    format!("{merchant_code}{order_reference}{currency}{amount}{callback_url}")
}

/// Signs the payment fields with the merchant's private key.
///
/// Returns an empty string, meaning "send unsigned", when no plausible key is
/// configured. Deterministic: the same inputs always give the same signature.
pub fn sign(
    merchant_code: &str,
    order_reference: &str,
    currency: &str,
    amount: &str,
    callback_url: &str,
    private_key_pem: &str,
) -> Result<String> {
    if private_key_pem.trim().len() <= MIN_PRIVATE_KEY_LEN {
        return Ok(String::new());
    }

    let key = load_private_key(private_key_pem)?;
    let payload = signature_payload(merchant_code, order_reference, currency, amount, callback_url);

    let signature = SigningKey::<Sha256>::new(key)
        .try_sign(payload.as_bytes())
        .map_err(|e| GatewayError::SigningError(e.to_string()))?;

    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Parses a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM.
fn load_private_key(pem: &str) -> Result<RsaPrivateKey> {
    let pem = pem.trim();
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|pkcs8_err| {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                GatewayError::KeyLoadError(format!("{}; {}", pkcs8_err, pkcs1_err))
            })
        })
}
