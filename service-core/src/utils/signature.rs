use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the shared-secret proof on every proxied request.
pub const TRUSTED_PROXY_HEADER: &str = "x-trusted-proxy";

fn sign_nonce(secret: &str, nonce: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    // Keys serialize in sorted order, the canonical form upstream verifies.
    let message: BTreeMap<&str, &str> =
        BTreeMap::from([("nonce", nonce), ("shared_secret", secret)]);
    let payload = serde_json::to_vec(&message)?;

    mac.update(&payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Generate a trust token of the form `{nonce}:{hex hmac}`.
///
/// The nonce is the current unix time in seconds unless one is supplied.
/// An empty secret is rejected.
pub fn generate_trust_token(secret: &str, nonce: Option<&str>) -> Result<String, anyhow::Error> {
    if secret.is_empty() {
        anyhow::bail!("shared secret is not set");
    }

    let nonce = match nonce {
        Some(n) => n.to_string(),
        None => std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs()
            .to_string(),
    };

    let signature = sign_nonce(secret, &nonce)?;
    Ok(format!("{}:{}", nonce, signature))
}

/// Verify a trust token using constant-time comparison
pub fn verify_trust_token(secret: &str, token: &str) -> Result<bool, anyhow::Error> {
    let Some((nonce, signature)) = token.split_once(':') else {
        return Ok(false);
    };

    let expected_signature = sign_nonce(secret, nonce)?;
    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}
