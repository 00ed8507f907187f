//! HTTP basic authentication check (`type: http`, `scheme: basic`)
//!
//! Stored records carry a `salt` and a `password` column. The password column
//! holds the hex-encoded HMAC-SHA256 of an empty message, keyed with the salt
//! followed by the clear-text password.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::connectors::CredentialStore;
use crate::application::AuthCheck;
use crate::core::{Error, GatewayRequest, Result};

type HmacSha256 = Hmac<Sha256>;

/// Credentials presented in an `Authorization: Basic` header
pub struct BasicCredentials {
    pub user: String,
    pub password: Zeroizing<String>,
}

impl BasicCredentials {
    /// Decodes the `Authorization` header value; `None` when it is not basic auth
    pub fn parse(authorization: &str) -> Option<Self> {
        let (scheme, encoded) = authorization.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).ok()?);
        let decoded = std::str::from_utf8(&decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some(Self {
            user: user.to_string(),
            password: Zeroizing::new(password.to_string()),
        })
    }
}

/// Computes the stored form of a password
pub fn password_hash(salt: &str, password: &str) -> Result<String> {
    Ok(hex::encode(keyed_mac(salt, password)?.finalize().into_bytes()))
}

fn keyed_mac(salt: &str, password: &str) -> Result<HmacSha256> {
    let key = Zeroizing::new(format!("{salt}{password}"));
    HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| Error::config(format!("Unable to initialize HMAC: {e}")))
}

/// Accepts requests whose user exists and whose password matches the record
pub struct HttpBasicCheck {
    store: Box<dyn CredentialStore>,
}

impl HttpBasicCheck {
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthCheck for HttpBasicCheck {
    async fn check(&self, request: &GatewayRequest) -> Result<()> {
        let credentials = request
            .header("authorization")
            .and_then(BasicCredentials::parse)
            .ok_or_else(|| Error::auth("Unauthorized (missing HTTP basic auth)"))?;

        let record = self.store.get(&credentials.user).ok_or_else(|| {
            Error::auth(format!(
                "Unauthorized (user {} does not exist)",
                credentials.user
            ))
        })?;

        let salt = record.get("salt").map(String::as_str).unwrap_or_default();
        let stored = record
            .get("password")
            .and_then(|stored| hex::decode(stored).ok())
            .ok_or_else(|| Error::auth("Unauthorized (invalid password)"))?;

        keyed_mac(salt, &credentials.password)?
            .verify_slice(&stored)
            .map_err(|_| Error::auth("Unauthorized (invalid password)"))
    }
}
