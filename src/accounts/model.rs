use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type AccountId = i64;

/// Field changes waiting for confirmation through the verify token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyChanges {
    pub email: String,
}

/// Persisted account row. Token fields hold digests, never raw tokens.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub verify_token: Option<String>,
    pub verify_short_token: Option<String>,
    pub verify_expires: Option<DateTime<Utc>>,
    pub verify_changes: Option<VerifyChanges>,
    pub reset_token: Option<String>,
    pub reset_short_token: Option<String>,
    pub reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A pending verification is honored only strictly before its expiry.
    #[must_use]
    pub fn verify_expired(&self, now: DateTime<Utc>) -> bool {
        self.verify_expires.map_or(true, |expires| now >= expires)
    }

    #[must_use]
    pub fn reset_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_expires.map_or(true, |expires| now >= expires)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingVerification {
    pub token: String,
    pub short_token: String,
    pub expires: DateTime<Utc>,
    pub changes: Option<VerifyChanges>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReset {
    pub token: String,
    pub short_token: String,
    pub expires: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub verification: PendingVerification,
}

/// Partial update. `Some(None)` clears a pending verification or reset.
#[derive(Clone, Debug, Default)]
pub struct AccountChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_verified: Option<bool>,
    pub verification: Option<Option<PendingVerification>>,
    pub reset: Option<Option<PendingReset>>,
}

impl AccountChanges {
    /// Apply the changes to an in-memory copy of the row.
    pub fn apply(&self, account: &mut Account, now: DateTime<Utc>) {
        if let Some(email) = &self.email {
            account.email.clone_from(email);
        }
        if let Some(hash) = &self.password_hash {
            account.password_hash.clone_from(hash);
        }
        if let Some(is_verified) = self.is_verified {
            account.is_verified = is_verified;
        }
        if let Some(verification) = &self.verification {
            let verification = verification.clone();
            account.verify_token = verification.as_ref().map(|v| v.token.clone());
            account.verify_short_token = verification.as_ref().map(|v| v.short_token.clone());
            account.verify_expires = verification.as_ref().map(|v| v.expires);
            account.verify_changes = verification.and_then(|v| v.changes);
        }
        if let Some(reset) = &self.reset {
            account.reset_token = reset.as_ref().map(|r| r.token.clone());
            account.reset_short_token = reset.as_ref().map(|r| r.short_token.clone());
            account.reset_expires = reset.as_ref().map(|r| r.expires);
        }
        account.updated_at = now;
    }
}

/// Token digest the row must still hold for a guarded update to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenGuard {
    Verify(String),
    Reset(String),
}

impl TokenGuard {
    #[must_use]
    pub fn holds(&self, account: &Account) -> bool {
        match self {
            Self::Verify(digest) => account.verify_token.as_deref() == Some(digest.as_str()),
            Self::Reset(digest) => account.reset_token.as_deref() == Some(digest.as_str()),
        }
    }
}

/// The externally visible account. Hashes, tokens and pending changes never leave the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: AccountId,
    pub email: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for PublicAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            is_verified: account.is_verified,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}
