use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;

use crate::config::JwtConfig;

const KEY_BITS: usize = 2048;

/// RS256 signer for identity assertions.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key_pem: String,
    issuer: String,
    audience: String,
    expiry_minutes: i64,
}

/// Registered claims wrapped around every assertion body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signed<T> {
    pub version: u32,
    pub iss: String,
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    #[serde(flatten)]
    pub claims: T,
}

impl JwtService {
    /// Load the key pair from the configured PEM files, or generate a fresh
    /// one when no paths are set.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        match (&config.private_key_path, &config.public_key_path) {
            (Some(private_path), Some(public_path)) => {
                let private_key_pem = fs::read_to_string(private_path).map_err(|e| {
                    anyhow::anyhow!("Failed to read private key from {}: {}", private_path, e)
                })?;
                let public_key_pem = fs::read_to_string(public_path).map_err(|e| {
                    anyhow::anyhow!("Failed to read public key from {}: {}", public_path, e)
                })?;

                tracing::info!(path = %private_path, "Loaded RS256 signing key from file");
                Self::from_pem(config, &private_key_pem, &public_key_pem)
            }
            _ => Self::generate(config),
        }
    }

    /// Generate a process-lifetime key pair.
    pub fn generate(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), KEY_BITS)
            .map_err(|e| anyhow::anyhow!("Failed to generate RSA key: {}", e))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_key_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| anyhow::anyhow!("Failed to encode private key: {}", e))?;
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| anyhow::anyhow!("Failed to encode public key: {}", e))?;

        tracing::info!(bits = KEY_BITS, "Generated RS256 signing key pair");
        Self::from_pem(config, &private_key_pem, &public_key_pem)
    }

    pub fn from_pem(
        config: &JwtConfig,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<Self, anyhow::Error> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            public_key_pem: public_key_pem.to_string(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            expiry_minutes: config.expiry_minutes,
        })
    }

    /// SubjectPublicKeyInfo PEM of the verification key.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn sign<T: Serialize>(&self, claims: T) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.expiry_minutes);

        let signed = Signed {
            version: 1,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            claims,
        };

        encode(&Header::new(Algorithm::RS256), &signed, &self.encoding_key)
    }

    /// Verify signature, expiry, issuer and audience.
    pub fn validate<T: DeserializeOwned>(&self, token: &str) -> Result<Signed<T>, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data = decode::<Signed<T>>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid identity assertion: {}", e))?;

        Ok(token_data.claims)
    }
}
