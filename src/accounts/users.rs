//! Account CRUD behind `/users`.
//!
//! Signup is open; everything else is called with an authenticated
//! [`Principal`]. Callers may only patch or delete their own account; any
//! other id is reported as not found so account ids cannot be probed.

use super::{
    error::AccountError,
    gate,
    model::{AccountChanges, AccountId, NewAccount, PublicAccount},
    notifier::{AccountSnapshot, Notifier, NotifierType},
    password::Passwords,
    store::{AccountStore, CreateOutcome, UpdateOutcome},
    tokens::IssuedTokens,
};
use chrono::Duration;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

/// Authenticated caller, resolved from a bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: AccountId,
    pub email: String,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    notifier: Arc<Notifier>,
    passwords: Arc<Passwords>,
    token_ttl: Duration,
}

impl AccountService {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        notifier: Arc<Notifier>,
        passwords: Arc<Passwords>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            passwords,
            token_ttl,
        }
    }

    /// Create an unverified account and mail its verification link.
    ///
    /// # Errors
    /// Criteria errors before anything is stored, [`AccountError::DuplicateEmail`]
    /// if the email exists, internal errors for store or mail failures.
    pub async fn signup(&self, request: SignupRequest) -> Result<PublicAccount, AccountError> {
        gate::check_signup(request.email.as_deref(), request.password.as_deref())?;
        let (Some(email), Some(password)) = (request.email, request.password) else {
            return Err(AccountError::EmailCriteria);
        };

        let issued = IssuedTokens::verification(self.token_ttl)?;
        let new = NewAccount {
            email: email.trim().to_string(),
            password_hash: self.passwords.hash(&password).await?,
            verification: issued.pending_verification(None),
        };

        let account = match self.store.create(new).await? {
            CreateOutcome::Created(account) => account,
            CreateOutcome::EmailTaken => return Err(AccountError::DuplicateEmail),
        };

        self.notifier
            .notify(
                NotifierType::ResendVerifySignup,
                &AccountSnapshot::of(&account).with_verify_tokens(&issued),
            )
            .await?;

        info!("account {} created", account.id);
        Ok(PublicAccount::from(&account))
    }

    /// # Errors
    /// Returns an internal error if the store fails.
    pub async fn list(&self, _principal: &Principal) -> Result<Vec<PublicAccount>, AccountError> {
        let accounts = self.store.list().await?;
        Ok(accounts.iter().map(PublicAccount::from).collect())
    }

    /// # Errors
    /// Returns [`AccountError::NotFound`] for unknown ids.
    pub async fn get(
        &self,
        _principal: &Principal,
        id: AccountId,
    ) -> Result<PublicAccount, AccountError> {
        let account = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id))?;
        Ok(PublicAccount::from(&account))
    }

    /// Full replacement is never allowed.
    ///
    /// # Errors
    /// Always returns [`AccountError::MethodNotAllowed`].
    pub fn replace(&self, _id: AccountId) -> Result<PublicAccount, AccountError> {
        Err(AccountError::MethodNotAllowed)
    }

    /// Apply an external partial update; only `password` may change.
    ///
    /// # Errors
    /// Protected-field and criteria errors, [`AccountError::NotFound`] for
    /// ids other than the caller's.
    pub async fn patch(
        &self,
        principal: &Principal,
        id: AccountId,
        patch: &Map<String, Value>,
    ) -> Result<PublicAccount, AccountError> {
        let password = gate::check_patch(patch)?;
        if principal.id != id {
            return Err(AccountError::NotFound(id));
        }

        let changes = AccountChanges {
            password_hash: Some(self.passwords.hash(&password).await?),
            ..AccountChanges::default()
        };
        match self.store.update(id, &changes, None).await? {
            UpdateOutcome::Updated(account) => {
                info!("account {} patched", account.id);
                Ok(PublicAccount::from(&account))
            }
            _ => Err(AccountError::NotFound(id)),
        }
    }

    /// # Errors
    /// Returns [`AccountError::NotFound`] for ids other than the caller's.
    pub async fn remove(
        &self,
        principal: &Principal,
        id: AccountId,
    ) -> Result<PublicAccount, AccountError> {
        if principal.id != id {
            return Err(AccountError::NotFound(id));
        }
        let account = self
            .store
            .remove(id)
            .await?
            .ok_or(AccountError::NotFound(id))?;
        info!("account {} removed", account.id);
        Ok(PublicAccount::from(&account))
    }
}
