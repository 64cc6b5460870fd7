//! `local` (email + password) and `jwt` authentication strategies.

use super::{
    error::AccountError,
    jwt::JwtKeys,
    model::{Account, AccountId, PublicAccount},
    password::Passwords,
    store::AccountStore,
    users::Principal,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest {
    pub strategy: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub access_token: String,
    pub user: PublicAccount,
}

pub struct Authentication {
    store: Arc<dyn AccountStore>,
    passwords: Arc<Passwords>,
    keys: Arc<JwtKeys>,
}

impl Authentication {
    #[must_use]
    pub fn new(store: Arc<dyn AccountStore>, passwords: Arc<Passwords>, keys: Arc<JwtKeys>) -> Self {
        Self {
            store,
            passwords,
            keys,
        }
    }

    /// Run the requested strategy.
    ///
    /// # Errors
    /// Returns a `NotAuthenticated` class error for a missing or unknown
    /// strategy and for bad credentials.
    pub async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AccountError> {
        match request.strategy.as_deref() {
            None | Some("") => Err(AccountError::NoAuthToken),
            Some("local") => {
                self.local(request.email.as_deref(), request.password.as_deref())
                    .await
            }
            Some("jwt") => {
                let token = request
                    .access_token
                    .as_deref()
                    .ok_or(AccountError::NoAuthToken)?;
                let account = self.account_for(token).await?;
                Ok(AuthenticationResponse {
                    access_token: token.to_string(),
                    user: PublicAccount::from(&account),
                })
            }
            Some(other) => Err(AccountError::StrategyNotPermitted(other.to_string())),
        }
    }

    async fn local(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<AuthenticationResponse, AccountError> {
        let (Some(email), Some(password)) = (email, password) else {
            return Err(AccountError::InvalidLogin);
        };
        let Some(account) = self.store.find_by_email(email).await? else {
            debug!("local authentication: unknown email");
            return Err(AccountError::InvalidLogin);
        };
        if !self.passwords.verify(password, &account.password_hash).await {
            debug!("local authentication: password mismatch");
            return Err(AccountError::InvalidLogin);
        }

        Ok(AuthenticationResponse {
            access_token: self.keys.issue(&account)?,
            user: PublicAccount::from(&account),
        })
    }

    /// End a session. Access tokens are stateless, so this re-validates the
    /// token and echoes it back with its account; clients drop it afterwards.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidAuthToken`] if the token is invalid or
    /// its account no longer exists.
    pub async fn logout(&self, token: &str) -> Result<AuthenticationResponse, AccountError> {
        let account = self.account_for(token).await?;
        debug!("session ended for account {}", account.id);
        Ok(AuthenticationResponse {
            access_token: token.to_string(),
            user: PublicAccount::from(&account),
        })
    }

    /// Resolve a bearer token to the account it names.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidAuthToken`] if the token is invalid or
    /// its account no longer exists.
    pub async fn principal(&self, token: &str) -> Result<Principal, AccountError> {
        let account = self.account_for(token).await?;
        Ok(Principal {
            id: account.id,
            email: account.email,
        })
    }

    async fn account_for(&self, token: &str) -> Result<Account, AccountError> {
        let claims = self.keys.verify(token)?;
        let id: AccountId = claims
            .sub
            .parse()
            .map_err(|_| AccountError::InvalidAuthToken)?;
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AccountError::InvalidAuthToken)
    }
}
