//! HS256 access tokens issued by `/authentication`.

use super::{error::AccountError, model::Account};
use anyhow::Context;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl JwtKeys {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_seconds,
        }
    }

    /// Sign an access token for `account`.
    ///
    /// # Errors
    /// Returns an internal error if signing fails.
    pub fn issue(&self, account: &Account) -> Result<String, AccountError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            iat: now,
            exp: now + self.ttl_seconds,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .context("failed to sign access token")?;
        Ok(token)
    }

    /// Validate signature and expiry.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidAuthToken`] for any invalid token.
    pub fn verify(&self, token: &str) -> Result<Claims, AccountError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AccountError::InvalidAuthToken)
    }
}
