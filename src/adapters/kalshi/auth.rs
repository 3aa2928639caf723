//! Kalshi Authentication - RSA-PSS Request Signing
//!
//! The primary scheme signs every request with the account's API key:
//! `KALSHI_API_KEY_ID` plus an RSA private key read from the PEM file at
//! `KALSHI_RSA_PRIVATE_KEY_PATH`. Each request carries three headers:
//!
//! - `KALSHI-ACCESS-KEY`: the key id
//! - `KALSHI-ACCESS-TIMESTAMP`: Unix time in milliseconds
//! - `KALSHI-ACCESS-SIGNATURE`: base64 RSA-PSS/SHA-256 signature over
//!   `timestamp + METHOD + path` (path without query string)
//!
//! Email/password session login (`KALSHI_EMAIL`, `KALSHI_PASSWORD`) is
//! kept as a fallback when no API key is configured. Secrets never appear
//! in `Debug` output.

use anyhow::{Context, Result};
use base64::Engine;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::{BlindedSigningKey, Signature};
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use sha2::Sha256;

pub const ACCESS_KEY_HEADER: &str = "KALSHI-ACCESS-KEY";
pub const ACCESS_TIMESTAMP_HEADER: &str = "KALSHI-ACCESS-TIMESTAMP";
pub const ACCESS_SIGNATURE_HEADER: &str = "KALSHI-ACCESS-SIGNATURE";

/// Signs trade API requests with an RSA API key.
#[derive(Clone)]
pub struct ApiKeySigner {
    key_id: String,
    signing_key: BlindedSigningKey<Sha256>,
}

impl ApiKeySigner {
    pub fn new(key_id: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: BlindedSigningKey::<Sha256>::new(private_key),
        }
    }

    /// Parse a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`) PEM.
    pub fn from_pem(key_id: impl Into<String>, pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .context("RSA private key is neither PKCS#8 nor PKCS#1 PEM")?;
        Ok(Self::new(key_id, key))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Base64 signature over `timestamp + method + path`.
    pub fn sign(&self, timestamp_ms: &str, method: &str, path: &str) -> String {
        let message = format!("{timestamp_ms}{method}{path}");
        let signature: Signature = self
            .signing_key
            .sign_with_rng(&mut rand::thread_rng(), message.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(signature.to_bytes())
    }

    /// All three auth headers for a request, stamped now.
    ///
    /// `path` is the full URL path, API prefix included.
    pub fn auth_headers(&self, method: &str, path: &str) -> [(&'static str, String); 3] {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp, method, path);
        [
            (ACCESS_KEY_HEADER, self.key_id.clone()),
            (ACCESS_TIMESTAMP_HEADER, timestamp),
            (ACCESS_SIGNATURE_HEADER, signature),
        ]
    }
}

impl std::fmt::Debug for ApiKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeySigner")
            .field("key_id", &self.key_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// How the client authenticates.
#[derive(Clone)]
pub enum KalshiCredentials {
    /// Per-request RSA signatures.
    ApiKey(ApiKeySigner),
    /// Legacy session login; the token is sent as a bearer header.
    Login { email: String, password: String },
}

impl KalshiCredentials {
    pub fn api_key(signer: ApiKeySigner) -> Self {
        Self::ApiKey(signer)
    }

    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Login {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Load credentials from environment variables.
    ///
    /// Uses the API key when `KALSHI_API_KEY_ID` is set, otherwise falls
    /// back to `KALSHI_EMAIL` / `KALSHI_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        if let Ok(key_id) = std::env::var("KALSHI_API_KEY_ID") {
            anyhow::ensure!(!key_id.trim().is_empty(), "KALSHI_API_KEY_ID is empty");
            let path = std::env::var("KALSHI_RSA_PRIVATE_KEY_PATH")
                .context("KALSHI_API_KEY_ID is set but KALSHI_RSA_PRIVATE_KEY_PATH is not")?;
            let pem = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read RSA private key: {path}"))?;
            let signer = ApiKeySigner::from_pem(key_id.trim(), &pem)
                .with_context(|| format!("Invalid RSA private key: {path}"))?;
            return Ok(Self::ApiKey(signer));
        }

        let email = std::env::var("KALSHI_EMAIL")
            .context("Neither KALSHI_API_KEY_ID nor KALSHI_EMAIL is set")?;
        let password = std::env::var("KALSHI_PASSWORD").context("KALSHI_PASSWORD not set")?;
        anyhow::ensure!(!email.trim().is_empty(), "KALSHI_EMAIL is empty");
        anyhow::ensure!(!password.is_empty(), "KALSHI_PASSWORD is empty");
        Ok(Self::login(email, password))
    }

    /// Whether requests need a session token from `POST /login`.
    pub fn uses_session(&self) -> bool {
        matches!(self, Self::Login { .. })
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api_key",
            Self::Login { .. } => "login",
        }
    }
}

impl std::fmt::Debug for KalshiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(signer) => f.debug_tuple("ApiKey").field(signer).finish(),
            Self::Login { email, .. } => f
                .debug_struct("Login")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
