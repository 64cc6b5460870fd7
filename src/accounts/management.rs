//! Account-management state machine.
//!
//! Flow Overview:
//! 1) Decode `{action, value}` into a [`Transition`].
//! 2) Run the gate checks for that transition.
//! 3) Check preconditions against the store and fail fast.
//! 4) Apply the mutation (guarded when a token is being consumed).
//! 5) Notify, awaiting delivery, and return the sanitized account.
//!
//! Token check-and-clear is a single conditional update: the row only changes
//! while it still holds the digest that was checked, so a token can be
//! consumed at most once even under concurrent requests.

use super::{
    error::AccountError,
    gate,
    model::{Account, AccountChanges, AccountId, PublicAccount, TokenGuard, VerifyChanges},
    notifier::{AccountSnapshot, Notifier, NotifierType},
    password::Passwords,
    store::{AccountStore, UpdateOutcome},
    tokens::{hash_token, IssuedTokens, ResetToken},
};
use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CheckUniqueValue {
    pub email: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmailValue {
    pub email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserRef {
    pub email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerifyShortValue {
    pub user: UserRef,
    pub token: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResetLongValue {
    pub token: String,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResetShortValue {
    pub user: UserRef,
    pub token: String,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeValue {
    pub user: UserRef,
    pub old_password: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IdentityChanges {
    pub email: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IdentityChangeValue {
    pub user: UserRef,
    pub password: Option<String>,
    #[serde(default)]
    pub changes: IdentityChanges,
}

/// One variant per action; each carries only its own payload.
#[derive(Clone, Debug)]
pub enum Transition {
    CheckUnique(CheckUniqueValue),
    ResendVerifySignup(EmailValue),
    VerifySignupLong(String),
    VerifySignupShort(VerifyShortValue),
    SendResetPwd(EmailValue),
    ResetPwdLong(ResetLongValue),
    ResetPwdShort(ResetShortValue),
    PasswordChange(PasswordChangeValue),
    IdentityChange(IdentityChangeValue),
}

fn payload<T: DeserializeOwned>(action: &str, value: Value) -> Result<T, AccountError> {
    serde_json::from_value(value).map_err(|err| AccountError::InvalidPayload {
        action: action.to_string(),
        reason: err.to_string(),
    })
}

impl Transition {
    /// Decode the `{action, value}` envelope.
    ///
    /// # Errors
    /// Returns a criteria error from the gate first, then
    /// [`AccountError::UnknownAction`] for unrecognized actions and
    /// [`AccountError::InvalidPayload`] when `value` does not fit the action.
    pub fn decode(action: &str, value: Value) -> Result<Self, AccountError> {
        gate::check_payload(action, &value)?;

        let transition = match action {
            "checkUnique" => Self::CheckUnique(if value.is_null() {
                CheckUniqueValue::default()
            } else {
                payload(action, value)?
            }),
            "resendVerifySignup" => Self::ResendVerifySignup(payload(action, value)?),
            "verifySignupLong" => Self::VerifySignupLong(payload(action, value)?),
            "verifySignupShort" => Self::VerifySignupShort(payload(action, value)?),
            "sendResetPwd" => Self::SendResetPwd(payload(action, value)?),
            "resetPwdLong" => Self::ResetPwdLong(payload(action, value)?),
            "resetPwdShort" => Self::ResetPwdShort(payload(action, value)?),
            "passwordChange" => Self::PasswordChange(payload(action, value)?),
            "identityChange" => Self::IdentityChange(payload(action, value)?),
            other => return Err(AccountError::UnknownAction(other.to_string())),
        };
        Ok(transition)
    }

    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::CheckUnique(_) => "checkUnique",
            Self::ResendVerifySignup(_) => "resendVerifySignup",
            Self::VerifySignupLong(_) => "verifySignupLong",
            Self::VerifySignupShort(_) => "verifySignupShort",
            Self::SendResetPwd(_) => "sendResetPwd",
            Self::ResetPwdLong(_) => "resetPwdLong",
            Self::ResetPwdShort(_) => "resetPwdShort",
            Self::PasswordChange(_) => "passwordChange",
            Self::IdentityChange(_) => "identityChange",
        }
    }
}

/// Result of a successful transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// `checkUnique` found no conflict; nothing to return.
    Unique,
    Account(PublicAccount),
}

fn expect_updated(outcome: UpdateOutcome) -> Result<Account, AccountError> {
    match outcome {
        UpdateOutcome::Updated(account) => Ok(account),
        UpdateOutcome::GuardFailed => Err(AccountError::UserNotFound),
        UpdateOutcome::EmailTaken => Err(AccountError::ValuesTaken),
    }
}

pub struct AuthManagement {
    store: Arc<dyn AccountStore>,
    notifier: Arc<Notifier>,
    passwords: Arc<Passwords>,
    token_ttl: Duration,
}

impl AuthManagement {
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

    /// Gate and run one transition.
    ///
    /// # Errors
    /// Returns the gate or precondition failure, or an internal error when the
    /// store, hashing or mail delivery fails.
    pub async fn apply(&self, transition: Transition) -> Result<Outcome, AccountError> {
        gate::check_transition(&transition)?;
        debug!("authManagement action: {}", transition.action());

        match transition {
            Transition::CheckUnique(value) => self.check_unique(value.email.as_deref()).await,
            Transition::ResendVerifySignup(value) => self.resend_verify_signup(&value.email).await,
            Transition::VerifySignupLong(token) => self.verify_signup_long(&token).await,
            Transition::VerifySignupShort(value) => {
                self.verify_signup_short(&value.user.email, &value.token)
                    .await
            }
            Transition::SendResetPwd(value) => self.send_reset_pwd(&value.email).await,
            Transition::ResetPwdLong(value) => {
                let password = value.password.ok_or(AccountError::PasswordCriteria)?;
                self.reset_pwd_long(&value.token, &password).await
            }
            Transition::ResetPwdShort(value) => {
                let password = value.password.ok_or(AccountError::PasswordCriteria)?;
                self.reset_pwd_short(&value.user.email, &value.token, &password)
                    .await
            }
            Transition::PasswordChange(value) => {
                let password = value.password.ok_or(AccountError::PasswordCriteria)?;
                let old_password = value.old_password.ok_or(AccountError::ExpectedString)?;
                self.password_change(&value.user.email, &old_password, &password)
                    .await
            }
            Transition::IdentityChange(value) => {
                let email = value.changes.email.ok_or(AccountError::EmailCriteria)?;
                let password = value.password.ok_or(AccountError::ExpectedString)?;
                self.identity_change(&value.user.email, &password, email)
                    .await
            }
        }
    }

    async fn check_unique(&self, email: Option<&str>) -> Result<Outcome, AccountError> {
        let Some(email) = email else {
            return Ok(Outcome::Unique);
        };
        if self.store.find_by_email(email).await?.is_some() {
            return Err(AccountError::ValuesTaken);
        }
        Ok(Outcome::Unique)
    }

    async fn resend_verify_signup(&self, email: &str) -> Result<Outcome, AccountError> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        if account.is_verified {
            return Err(AccountError::AlreadyVerified);
        }

        let issued = IssuedTokens::verification(self.token_ttl)?;
        let changes = AccountChanges {
            verification: Some(Some(
                issued.pending_verification(account.verify_changes.clone()),
            )),
            ..AccountChanges::default()
        };
        let updated = expect_updated(self.store.update(account.id, &changes, None).await?)?;

        self.notifier
            .notify(
                NotifierType::ResendVerifySignup,
                &AccountSnapshot::of(&updated).with_verify_tokens(&issued),
            )
            .await?;

        info!("verification resent for account {}", updated.id);
        Ok(Outcome::Account(PublicAccount::from(&updated)))
    }

    async fn verify_signup_long(&self, token: &str) -> Result<Outcome, AccountError> {
        let digest = hash_token(token);
        let account = self
            .store
            .find_by_verify_token(&digest)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        self.finish_verification(account, digest).await
    }

    async fn verify_signup_short(&self, email: &str, token: &str) -> Result<Outcome, AccountError> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let (Some(digest), Some(short_digest)) = (
            account.verify_token.clone(),
            account.verify_short_token.as_deref(),
        ) else {
            return Err(if account.is_verified {
                AccountError::AlreadyVerified
            } else {
                AccountError::InvalidToken
            });
        };
        if short_digest != hash_token(token) {
            // A wrong code clears the pending pair; the caller has to request a new one.
            let clear = AccountChanges {
                verification: Some(None),
                ..AccountChanges::default()
            };
            self.store
                .update(account.id, &clear, Some(&TokenGuard::Verify(digest)))
                .await?;
            debug!("short verify token mismatch for account {}", account.id);
            return Err(AccountError::InvalidToken);
        }

        self.finish_verification(account, digest).await
    }

    async fn finish_verification(
        &self,
        account: Account,
        digest: String,
    ) -> Result<Outcome, AccountError> {
        let guard = TokenGuard::Verify(digest);

        if account.verify_expired(Utc::now()) {
            let clear = AccountChanges {
                verification: Some(None),
                ..AccountChanges::default()
            };
            self.store.update(account.id, &clear, Some(&guard)).await?;
            debug!("verify token expired for account {}", account.id);
            return Err(AccountError::VerifyTokenExpired);
        }

        let changes = AccountChanges {
            email: account.verify_changes.as_ref().map(|c| c.email.clone()),
            is_verified: Some(true),
            verification: Some(None),
            ..AccountChanges::default()
        };
        let updated =
            expect_updated(self.store.update(account.id, &changes, Some(&guard)).await?)?;

        self.notifier
            .notify(NotifierType::VerifySignup, &AccountSnapshot::of(&updated))
            .await?;

        info!("account {} verified", updated.id);
        Ok(Outcome::Account(PublicAccount::from(&updated)))
    }

    async fn send_reset_pwd(&self, email: &str) -> Result<Outcome, AccountError> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        if !account.is_verified {
            return Err(AccountError::NotVerified);
        }

        let issued = IssuedTokens::reset(account.id, self.token_ttl)?;
        let changes = AccountChanges {
            reset: Some(Some(issued.pending_reset())),
            ..AccountChanges::default()
        };
        let updated = expect_updated(self.store.update(account.id, &changes, None).await?)?;

        self.notifier
            .notify(
                NotifierType::SendResetPwd,
                &AccountSnapshot::of(&updated).with_reset_tokens(&issued),
            )
            .await?;

        info!("password reset issued for account {}", updated.id);
        Ok(Outcome::Account(PublicAccount::from(&updated)))
    }

    async fn reset_pwd_long(&self, token: &str, password: &str) -> Result<Outcome, AccountError> {
        let token = ResetToken::parse(token)?;
        let account = self
            .store
            .find_by_id(token.account_id())
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let digest = hash_token(token.as_str());
        if account.reset_token.as_deref() != Some(digest.as_str()) {
            return Err(AccountError::InvalidToken);
        }

        self.finish_reset(account.id, account.reset_expired(Utc::now()), digest, password)
            .await
    }

    async fn reset_pwd_short(
        &self,
        email: &str,
        token: &str,
        password: &str,
    ) -> Result<Outcome, AccountError> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let (Some(digest), Some(short_digest)) = (
            account.reset_token.clone(),
            account.reset_short_token.as_deref(),
        ) else {
            return Err(AccountError::InvalidToken);
        };
        if short_digest != hash_token(token) {
            let clear = AccountChanges {
                reset: Some(None),
                ..AccountChanges::default()
            };
            self.store
                .update(account.id, &clear, Some(&TokenGuard::Reset(digest)))
                .await?;
            debug!("short reset token mismatch for account {}", account.id);
            return Err(AccountError::InvalidToken);
        }

        self.finish_reset(account.id, account.reset_expired(Utc::now()), digest, password)
            .await
    }

    async fn finish_reset(
        &self,
        id: AccountId,
        expired: bool,
        digest: String,
        password: &str,
    ) -> Result<Outcome, AccountError> {
        let guard = TokenGuard::Reset(digest);

        if expired {
            let clear = AccountChanges {
                reset: Some(None),
                ..AccountChanges::default()
            };
            self.store.update(id, &clear, Some(&guard)).await?;
            debug!("reset token expired for account {id}");
            return Err(AccountError::ResetTokenExpired);
        }

        let changes = AccountChanges {
            password_hash: Some(self.passwords.hash(password).await?),
            reset: Some(None),
            ..AccountChanges::default()
        };
        let updated = expect_updated(self.store.update(id, &changes, Some(&guard)).await?)?;

        self.notifier
            .notify(NotifierType::ResetPwd, &AccountSnapshot::of(&updated))
            .await?;

        info!("password reset for account {}", updated.id);
        Ok(Outcome::Account(PublicAccount::from(&updated)))
    }

    /// Look up the account a signed-in caller acts on. A miss here means the
    /// caller's identity no longer maps to a row, which is a server-side fault.
    async fn resolve(&self, email: &str) -> Result<Account, AccountError> {
        self.store.find_by_email(email).await?.ok_or_else(|| {
            error!("authManagement could not resolve account by email");
            AccountError::Unresolved
        })
    }

    async fn password_change(
        &self,
        email: &str,
        old_password: &str,
        password: &str,
    ) -> Result<Outcome, AccountError> {
        let account = self.resolve(email).await?;
        if !self.passwords.verify(old_password, &account.password_hash).await {
            return Err(AccountError::CurrentPasswordIncorrect);
        }

        let changes = AccountChanges {
            password_hash: Some(self.passwords.hash(password).await?),
            ..AccountChanges::default()
        };
        let updated = match self.store.update(account.id, &changes, None).await? {
            UpdateOutcome::Updated(account) => account,
            _ => return Err(AccountError::Unresolved),
        };

        self.notifier
            .notify(NotifierType::PasswordChange, &AccountSnapshot::of(&updated))
            .await?;

        info!("password changed for account {}", updated.id);
        Ok(Outcome::Account(PublicAccount::from(&updated)))
    }

    async fn identity_change(
        &self,
        email: &str,
        password: &str,
        new_email: String,
    ) -> Result<Outcome, AccountError> {
        let account = self.resolve(email).await?;
        if !self.passwords.verify(password, &account.password_hash).await {
            return Err(AccountError::PasswordIncorrect);
        }
        if self.store.find_by_email(&new_email).await?.is_some() {
            return Err(AccountError::ValuesTaken);
        }

        let issued = IssuedTokens::verification(self.token_ttl)?;
        let changes = AccountChanges {
            verification: Some(Some(
                issued.pending_verification(Some(VerifyChanges { email: new_email })),
            )),
            ..AccountChanges::default()
        };
        let updated = match self.store.update(account.id, &changes, None).await? {
            UpdateOutcome::Updated(account) => account,
            _ => return Err(AccountError::Unresolved),
        };

        self.notifier
            .notify(
                NotifierType::IdentityChange,
                &AccountSnapshot::of(&updated).with_verify_tokens(&issued),
            )
            .await?;

        info!("identity change pending for account {}", updated.id);
        Ok(Outcome::Account(PublicAccount::from(&updated)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        accounts::{
            notifier::tests::RecordingMailer,
            password::tests::fast_passwords,
            store::{CreateOutcome, MemoryAccountStore},
            tokens::IssuedTokens,
        },
        mailer::MailRequest,
    };
    use crate::accounts::model::NewAccount;
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryAccountStore>,
        mailer: Arc<RecordingMailer>,
        passwords: Arc<Passwords>,
        management: AuthManagement,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryAccountStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let passwords = Arc::new(fast_passwords());
        let notifier = Arc::new(Notifier::new(
            mailer.clone(),
            "mailer@server.io".to_string(),
            "http://localhost:4200",
        ));
        let management = AuthManagement::new(
            store.clone(),
            notifier,
            passwords.clone(),
            Duration::days(5),
        );
        Harness {
            store,
            mailer,
            passwords,
            management,
        }
    }

    impl Harness {
        /// Seed an account and return it with its raw verify token.
        async fn seed(&self, email: &str, verified: bool) -> (Account, IssuedTokens) {
            let issued = IssuedTokens::verification(Duration::days(5)).unwrap();
            let new = NewAccount {
                email: email.to_string(),
                password_hash: self.passwords.hash("pwd").await.unwrap(),
                verification: issued.pending_verification(None),
            };
            let CreateOutcome::Created(account) = self.store.create(new).await.unwrap() else {
                panic!("seed email taken");
            };
            if !verified {
                return (account, issued);
            }
            let changes = AccountChanges {
                is_verified: Some(true),
                verification: Some(None),
                ..AccountChanges::default()
            };
            let account = expect_updated(self.store.update(account.id, &changes, None).await.unwrap())
                .unwrap();
            (account, issued)
        }

        async fn run(&self, action: &str, value: Value) -> Result<Outcome, AccountError> {
            self.management
                .apply(Transition::decode(action, value)?)
                .await
        }

        fn sent(&self) -> Vec<MailRequest> {
            self.mailer.sent()
        }

        /// Raw token from the last mailed link.
        fn last_link_token(&self) -> String {
            let sent = self.sent();
            let html = &sent.last().unwrap().html;
            html.rsplit('/').next().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn decode_rejects_unknown_action_and_bad_payload() {
        assert!(matches!(
            Transition::decode("nope", json!({})),
            Err(AccountError::UnknownAction(ref a)) if a == "nope"
        ));
        assert!(matches!(
            Transition::decode("verifySignupLong", json!({"token": "x"})),
            Err(AccountError::InvalidPayload { .. })
        ));
        assert!(matches!(
            Transition::decode("checkUnique", Value::Null),
            Ok(Transition::CheckUnique(_))
        ));
        assert!(matches!(
            Transition::decode("resetPwdLong", json!({"password": ""})),
            Err(AccountError::PasswordCriteria)
        ));
    }

    #[tokio::test]
    async fn check_unique() {
        let h = harness();
        h.seed("a@a.com", false).await;
        assert_eq!(
            h.run("checkUnique", json!({"email": "b@b.com"})).await.unwrap(),
            Outcome::Unique
        );
        assert!(matches!(
            h.run("checkUnique", json!({"email": "a@a.com"})).await,
            Err(AccountError::ValuesTaken)
        ));
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn resend_then_verify_long() {
        let h = harness();
        let (account, old) = h.seed("a@a.com", false).await;

        let Outcome::Account(resent) = h
            .run("resendVerifySignup", json!({"email": "a@a.com"}))
            .await
            .unwrap()
        else {
            panic!("expected account");
        };
        assert!(!resent.is_verified);
        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Verify Signup");
        assert!(sent[0]
            .html
            .starts_with("http://localhost:4200/signup/verify/"));

        // The previous token was replaced.
        assert!(matches!(
            h.run("verifySignupLong", json!(old.long)).await,
            Err(AccountError::UserNotFound)
        ));

        let token = h.last_link_token();
        let Outcome::Account(verified) = h.run("verifySignupLong", json!(token)).await.unwrap()
        else {
            panic!("expected account");
        };
        assert!(verified.is_verified);
        assert_eq!(h.sent().last().unwrap().subject, "Confirm Signup");

        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(stored.verify_token.is_none());
        assert!(stored.verify_short_token.is_none());
        assert!(stored.verify_expires.is_none());

        // Tokens are single use.
        assert!(matches!(
            h.run("verifySignupLong", json!(token)).await,
            Err(AccountError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn resend_for_verified_or_missing() {
        let h = harness();
        let (account, _) = h.seed("a@a.com", true).await;
        assert!(matches!(
            h.run("resendVerifySignup", json!({"email": "a@a.com"})).await,
            Err(AccountError::AlreadyVerified)
        ));
        assert!(matches!(
            h.run("resendVerifySignup", json!({"email": "x@a.com"})).await,
            Err(AccountError::UserNotFound)
        ));
        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(stored.is_verified);
        assert!(stored.verify_token.is_none());
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn expired_verify_token_is_rejected_and_cleared() {
        let h = harness();
        let (account, issued) = h.seed("a@a.com", false).await;
        let mut pending = issued.pending_verification(None);
        pending.expires = Utc::now() - Duration::seconds(1);
        let changes = AccountChanges {
            verification: Some(Some(pending)),
            ..AccountChanges::default()
        };
        h.store.update(account.id, &changes, None).await.unwrap();

        assert!(matches!(
            h.run("verifySignupLong", json!(issued.long)).await,
            Err(AccountError::VerifyTokenExpired)
        ));
        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(!stored.is_verified);
        assert!(stored.verify_token.is_none());
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn verify_short() {
        let h = harness();
        let (_, issued) = h.seed("a@a.com", false).await;

        let Outcome::Account(verified) = h
            .run(
                "verifySignupShort",
                json!({"user": {"email": "a@a.com"}, "token": issued.short}),
            )
            .await
            .unwrap()
        else {
            panic!("expected account");
        };
        assert!(verified.is_verified);

        assert!(matches!(
            h.run(
                "verifySignupShort",
                json!({"user": {"email": "a@a.com"}, "token": issued.short})
            )
            .await,
            Err(AccountError::AlreadyVerified)
        ));
    }

    #[tokio::test]
    async fn verify_short_mismatch_clears_pending_verification() {
        let h = harness();
        let (account, issued) = h.seed("a@a.com", false).await;

        assert!(matches!(
            h.run(
                "verifySignupShort",
                json!({"user": {"email": "a@a.com"}, "token": "000000x"})
            )
            .await,
            Err(AccountError::InvalidToken)
        ));
        assert!(matches!(
            h.run(
                "verifySignupShort",
                json!({"user": {"email": "a@a.com"}, "token": issued.short})
            )
            .await,
            Err(AccountError::InvalidToken)
        ));
        assert!(matches!(
            h.run("verifySignupLong", json!(issued.long)).await,
            Err(AccountError::UserNotFound)
        ));

        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(!stored.is_verified);
        assert!(stored.verify_token.is_none());
        assert!(stored.verify_short_token.is_none());
    }

    #[tokio::test]
    async fn send_reset_requires_verified() {
        let h = harness();
        h.seed("a@a.com", false).await;
        assert!(matches!(
            h.run("sendResetPwd", json!({"email": "a@a.com"})).await,
            Err(AccountError::NotVerified)
        ));
        assert!(matches!(
            h.run("sendResetPwd", json!({"email": "x@a.com"})).await,
            Err(AccountError::UserNotFound)
        ));
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn reset_long_round_trip() {
        let h = harness();
        let (account, _) = h.seed("a@a.com", true).await;

        h.run("sendResetPwd", json!({"email": "a@a.com"}))
            .await
            .unwrap();
        let token = h.last_link_token();
        assert!(token.starts_with(&format!("{}__", account.id)));
        assert_eq!(h.sent()[0].subject, "Reset Password");

        assert!(matches!(
            h.run("resetPwdLong", json!({"token": token, "password": "  "}))
                .await,
            Err(AccountError::PasswordCriteria)
        ));

        h.run("resetPwdLong", json!({"token": token, "password": "new-pwd"}))
            .await
            .unwrap();
        assert_eq!(
            h.sent().last().unwrap().subject,
            "Reset Password Confirmation"
        );

        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(h.passwords.verify("new-pwd", &stored.password_hash).await);
        assert!(stored.reset_token.is_none());
        assert!(stored.reset_expires.is_none());

        assert!(matches!(
            h.run("resetPwdLong", json!({"token": token, "password": "again"}))
                .await,
            Err(AccountError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn reset_long_rejects_malformed_before_lookup() {
        let h = harness();
        assert!(matches!(
            h.run(
                "resetPwdLong",
                json!({"token": "5__1214se54575", "password": "pwd"})
            )
            .await,
            Err(AccountError::TokenFormat)
        ));
        let well_formed = format!("99__{}", "a".repeat(43));
        assert!(matches!(
            h.run("resetPwdLong", json!({"token": well_formed, "password": "pwd"}))
                .await,
            Err(AccountError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn reset_expired() {
        let h = harness();
        let (account, _) = h.seed("a@a.com", true).await;
        let issued = IssuedTokens::reset(account.id, Duration::seconds(-1)).unwrap();
        let changes = AccountChanges {
            reset: Some(Some(issued.pending_reset())),
            ..AccountChanges::default()
        };
        h.store.update(account.id, &changes, None).await.unwrap();

        assert!(matches!(
            h.run(
                "resetPwdLong",
                json!({"token": issued.long, "password": "new"})
            )
            .await,
            Err(AccountError::ResetTokenExpired)
        ));
        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(stored.reset_token.is_none());
        assert!(h.passwords.verify("pwd", &stored.password_hash).await);
    }

    #[tokio::test]
    async fn reset_short() {
        let h = harness();
        let (account, _) = h.seed("a@a.com", true).await;
        let issued = IssuedTokens::reset(account.id, Duration::days(1)).unwrap();
        let changes = AccountChanges {
            reset: Some(Some(issued.pending_reset())),
            ..AccountChanges::default()
        };
        h.store.update(account.id, &changes, None).await.unwrap();

        let value = json!({"user": {"email": "a@a.com"}, "token": issued.short, "password": "short-pwd"});
        h.run("resetPwdShort", value.clone()).await.unwrap();
        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(h.passwords.verify("short-pwd", &stored.password_hash).await);
        assert!(matches!(
            h.run("resetPwdShort", value).await,
            Err(AccountError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn reset_short_mismatch_clears_pending_reset() {
        let h = harness();
        let (account, _) = h.seed("a@a.com", true).await;
        let issued = IssuedTokens::reset(account.id, Duration::days(1)).unwrap();
        let changes = AccountChanges {
            reset: Some(Some(issued.pending_reset())),
            ..AccountChanges::default()
        };
        h.store.update(account.id, &changes, None).await.unwrap();

        let wrong = if issued.short == "000000" { "111111" } else { "000000" };
        assert!(matches!(
            h.run(
                "resetPwdShort",
                json!({"user": {"email": "a@a.com"}, "token": wrong, "password": "new"})
            )
            .await,
            Err(AccountError::InvalidToken)
        ));
        assert!(matches!(
            h.run(
                "resetPwdLong",
                json!({"token": issued.long, "password": "new"})
            )
            .await,
            Err(AccountError::InvalidToken)
        ));

        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(stored.reset_token.is_none());
        assert!(stored.reset_expires.is_none());
        assert!(h.passwords.verify("pwd", &stored.password_hash).await);
    }

    #[tokio::test]
    async fn password_change() {
        let h = harness();
        let (account, _) = h.seed("a@a.com", true).await;
        let user = json!({"email": "a@a.com"});

        assert!(matches!(
            h.run("passwordChange", json!({"user": user, "password": "new"}))
                .await,
            Err(AccountError::ExpectedString)
        ));
        assert!(matches!(
            h.run(
                "passwordChange",
                json!({"user": user, "oldPassword": "pwd", "password": ""})
            )
            .await,
            Err(AccountError::PasswordCriteria)
        ));
        assert!(matches!(
            h.run(
                "passwordChange",
                json!({"user": user, "oldPassword": "wrong", "password": "new"})
            )
            .await,
            Err(AccountError::CurrentPasswordIncorrect)
        ));
        assert!(matches!(
            h.run(
                "passwordChange",
                json!({"user": {"email": "x@a.com"}, "oldPassword": "", "password": "new"})
            )
            .await,
            Err(AccountError::Unresolved)
        ));

        h.run(
            "passwordChange",
            json!({"user": user, "oldPassword": "pwd", "password": "new"}),
        )
        .await
        .unwrap();
        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(h.passwords.verify("new", &stored.password_hash).await);
        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Change Password");
    }

    #[tokio::test]
    async fn identity_change_waits_for_verification() {
        let h = harness();
        let (account, _) = h.seed("a@a.com", true).await;
        h.seed("taken@a.com", false).await;
        let user = json!({"email": "a@a.com"});

        assert!(matches!(
            h.run(
                "identityChange",
                json!({"user": user, "password": "pwd", "changes": {"email": "bad"}})
            )
            .await,
            Err(AccountError::EmailCriteria)
        ));
        assert!(matches!(
            h.run(
                "identityChange",
                json!({"user": user, "password": "nope", "changes": {"email": "b@b.com"}})
            )
            .await,
            Err(AccountError::PasswordIncorrect)
        ));
        assert!(matches!(
            h.run(
                "identityChange",
                json!({"user": user, "password": "pwd", "changes": {"email": "taken@a.com"}})
            )
            .await,
            Err(AccountError::ValuesTaken)
        ));
        assert!(h.sent().is_empty());

        let Outcome::Account(pending) = h
            .run(
                "identityChange",
                json!({"user": user, "password": "pwd", "changes": {"email": "b@b.com"}}),
            )
            .await
            .unwrap()
        else {
            panic!("expected account");
        };
        assert_eq!(pending.email, "a@a.com");

        let sent = h.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@a.com");
        assert_eq!(sent[1].to, "b@b.com");

        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "a@a.com");
        assert_eq!(
            stored.verify_changes,
            Some(VerifyChanges {
                email: "b@b.com".to_string()
            })
        );
    }

    #[tokio::test]
    async fn identity_change_applies_on_verify() {
        let h = harness();
        let (account, _) = h.seed("a@a.com", true).await;
        let issued = IssuedTokens::verification(Duration::days(1)).unwrap();
        let changes = AccountChanges {
            verification: Some(Some(issued.pending_verification(Some(VerifyChanges {
                email: "b@b.com".to_string(),
            })))),
            ..AccountChanges::default()
        };
        h.store.update(account.id, &changes, None).await.unwrap();

        let Outcome::Account(verified) = h
            .run("verifySignupLong", json!(issued.long))
            .await
            .unwrap()
        else {
            panic!("expected account");
        };
        assert_eq!(verified.email, "b@b.com");
        let stored = h.store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(stored.verify_changes.is_none());
        assert_eq!(h.sent()[0].to, "b@b.com");
    }
}
