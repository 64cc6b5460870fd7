//! Verification and reset token generation, hashing and parsing.
//!
//! Long tokens carry 256 bits from the OS RNG, encoded base64url without
//! padding. Short tokens are six decimal digits for manual entry. Reset long
//! tokens prefix the account id so the account can be resolved directly:
//! `{id}__{secret}`.

use super::{
    error::AccountError,
    model::{AccountId, PendingReset, PendingVerification, VerifyChanges},
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};

pub const RESET_TOKEN_DELIMITER: &str = "__";

const LONG_TOKEN_BYTES: usize = 32;
const LONG_TOKEN_LEN: usize = 43;
const SHORT_TOKEN_DIGITS: usize = 6;

/// Generate a random long token.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub fn generate_long_token() -> Result<String> {
    let mut bytes = [0u8; LONG_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to read from the OS RNG")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[must_use]
pub fn generate_short_token() -> String {
    (0..SHORT_TOKEN_DIGITS)
        .map(|_| char::from(b'0' + OsRng.gen_range(0..10u8)))
        .collect()
}

/// Digest stored in place of a raw token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

fn is_long_token_shape(value: &str) -> bool {
    value.len() == LONG_TOKEN_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// A reset token split into the account it points at and its raw value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetToken {
    account_id: AccountId,
    raw: String,
}

impl ResetToken {
    /// Parse `{id}__{secret}`, rejecting anything else before a lookup happens.
    ///
    /// # Errors
    /// Returns [`AccountError::TokenFormat`] if the token is not shaped as issued.
    pub fn parse(token: &str) -> Result<Self, AccountError> {
        let (id, secret) = token
            .split_once(RESET_TOKEN_DELIMITER)
            .ok_or(AccountError::TokenFormat)?;

        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AccountError::TokenFormat);
        }
        let account_id = id
            .parse::<AccountId>()
            .map_err(|_| AccountError::TokenFormat)?;
        if account_id <= 0 || !is_long_token_shape(secret) {
            return Err(AccountError::TokenFormat);
        }

        Ok(Self {
            account_id,
            raw: token.to_string(),
        })
    }

    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        self.account_id
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Raw tokens of one issuance, kept only until the notifier has used them.
#[derive(Clone, Debug)]
pub struct IssuedTokens {
    pub long: String,
    pub short: String,
    pub expires: DateTime<Utc>,
}

impl IssuedTokens {
    /// Fresh verification tokens valid for `ttl`.
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails.
    pub fn verification(ttl: Duration) -> Result<Self> {
        Ok(Self {
            long: generate_long_token()?,
            short: generate_short_token(),
            expires: Utc::now() + ttl,
        })
    }

    /// Fresh reset tokens for `account_id` valid for `ttl`.
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails.
    pub fn reset(account_id: AccountId, ttl: Duration) -> Result<Self> {
        Ok(Self {
            long: format!("{account_id}{RESET_TOKEN_DELIMITER}{}", generate_long_token()?),
            short: generate_short_token(),
            expires: Utc::now() + ttl,
        })
    }

    #[must_use]
    pub fn pending_verification(&self, changes: Option<VerifyChanges>) -> PendingVerification {
        PendingVerification {
            token: hash_token(&self.long),
            short_token: hash_token(&self.short),
            expires: self.expires,
            changes,
        }
    }

    #[must_use]
    pub fn pending_reset(&self) -> PendingReset {
        PendingReset {
            token: hash_token(&self.long),
            short_token: hash_token(&self.short),
            expires: self.expires,
        }
    }
}
