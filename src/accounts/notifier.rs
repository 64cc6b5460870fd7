//! Maps a transition and the post-mutation account snapshot to outbound mail.
//!
//! The snapshot carries the raw tokens issued by the transition, so the links
//! in the mail are the only place those values ever appear.

use super::{
    error::AccountError,
    model::{Account, AccountId, VerifyChanges},
    tokens::IssuedTokens,
};
use crate::mailer::{MailRequest, Mailer};
use anyhow::anyhow;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, Instrument};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotifierType {
    ResendVerifySignup,
    VerifySignup,
    SendResetPwd,
    ResetPwd,
    PasswordChange,
    IdentityChange,
}

impl NotifierType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResendVerifySignup => "resendVerifySignup",
            Self::VerifySignup => "verifySignup",
            Self::SendResetPwd => "sendResetPwd",
            Self::ResetPwd => "resetPwd",
            Self::PasswordChange => "passwordChange",
            Self::IdentityChange => "identityChange",
        }
    }
}

/// Account view handed to the notifier, raw tokens included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub email: String,
    pub is_verified: bool,
    pub verify_token: Option<String>,
    pub verify_short_token: Option<String>,
    pub verify_changes: Option<VerifyChanges>,
    pub reset_token: Option<String>,
    pub reset_short_token: Option<String>,
}

impl AccountSnapshot {
    #[must_use]
    pub fn of(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            is_verified: account.is_verified,
            verify_token: None,
            verify_short_token: None,
            verify_changes: account.verify_changes.clone(),
            reset_token: None,
            reset_short_token: None,
        }
    }

    #[must_use]
    pub fn with_verify_tokens(mut self, issued: &IssuedTokens) -> Self {
        self.verify_token = Some(issued.long.clone());
        self.verify_short_token = Some(issued.short.clone());
        self
    }

    #[must_use]
    pub fn with_reset_tokens(mut self, issued: &IssuedTokens) -> Self {
        self.reset_token = Some(issued.long.clone());
        self.reset_short_token = Some(issued.short.clone());
        self
    }
}

/// Called with every notification before dispatch.
pub trait NotifyObserver: Send + Sync {
    fn on_notify(&self, kind: NotifierType, snapshot: &AccountSnapshot);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl NotifyObserver for NoopObserver {
    fn on_notify(&self, _kind: NotifierType, _snapshot: &AccountSnapshot) {}
}

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    link_base: String,
    observer: Arc<dyn NotifyObserver>,
}

impl Notifier {
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, from: String, link_base: &str) -> Self {
        Self {
            mailer,
            from,
            link_base: link_base.trim_end_matches('/').to_string(),
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn NotifyObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn mail(&self, to: &str, subject: &str, html: String) -> MailRequest {
        MailRequest {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            html,
        }
    }

    /// Compose the mail(s) for `kind`. Identity changes produce two, old address first.
    ///
    /// # Errors
    /// Returns an internal error if the snapshot lacks the token or pending
    /// change the template needs.
    pub fn compose(
        &self,
        kind: NotifierType,
        snapshot: &AccountSnapshot,
    ) -> Result<Vec<MailRequest>, AccountError> {
        let missing = |field: &str| {
            AccountError::Internal(anyhow!(
                "{} notification for account {} is missing {field}",
                kind.as_str(),
                snapshot.id
            ))
        };

        let mails = match kind {
            NotifierType::ResendVerifySignup => {
                let token = snapshot
                    .verify_token
                    .as_deref()
                    .ok_or_else(|| missing("verifyToken"))?;
                vec![self.mail(
                    &snapshot.email,
                    "Verify Signup",
                    format!("{}/signup/verify/{token}", self.link_base),
                )]
            }
            NotifierType::VerifySignup => vec![self.mail(
                &snapshot.email,
                "Confirm Signup",
                "Thank you for verifying your email.".to_string(),
            )],
            NotifierType::SendResetPwd => {
                let token = snapshot
                    .reset_token
                    .as_deref()
                    .ok_or_else(|| missing("resetToken"))?;
                vec![self.mail(
                    &snapshot.email,
                    "Reset Password",
                    format!("{}/reset/{token}", self.link_base),
                )]
            }
            NotifierType::ResetPwd => vec![self.mail(
                &snapshot.email,
                "Reset Password Confirmation",
                "The password has been reset.".to_string(),
            )],
            NotifierType::PasswordChange => vec![self.mail(
                &snapshot.email,
                "Change Password",
                "The password has been changed.".to_string(),
            )],
            NotifierType::IdentityChange => {
                let changes = snapshot
                    .verify_changes
                    .as_ref()
                    .ok_or_else(|| missing("verifyChanges"))?;
                vec![
                    self.mail(
                        &snapshot.email,
                        "Change Identity Confirmation",
                        format!(
                            "The identity has been changed. Your new email is: {}.",
                            changes.email
                        ),
                    ),
                    self.mail(
                        &changes.email,
                        "Change Identity Confirmation",
                        "The identity has been changed. From now on, this is your email address used for log-in."
                            .to_string(),
                    ),
                ]
            }
        };

        Ok(mails)
    }

    /// Compose and send, in order, awaiting each delivery.
    ///
    /// # Errors
    /// Returns an internal error if composing or any delivery fails.
    pub async fn notify(
        &self,
        kind: NotifierType,
        snapshot: &AccountSnapshot,
    ) -> Result<(), AccountError> {
        self.observer.on_notify(kind, snapshot);

        let span = tracing::info_span!(
            "notify",
            notifier.kind = kind.as_str(),
            account.id = snapshot.id
        );
        async {
            for mail in self.compose(kind, snapshot)? {
                debug!("sending {} mail to {}", kind.as_str(), mail.to);
                self.mailer.send(&mail).await.map_err(AccountError::Internal)?;
            }
            Ok::<(), AccountError>(())
        }
        .instrument(span)
        .await
    }
}
