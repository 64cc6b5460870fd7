//! # Custodia (User Accounts)
//!
//! `custodia` keeps a store of user accounts keyed by email and drives the
//! account-management flows around them: signup with email verification,
//! resending the verification link, password reset through a mailed token,
//! authenticated password change and authenticated email change.
//!
//! ## Tokens
//!
//! Verification and reset tokens are random and single use. Only their SHA-256
//! digests are persisted; the raw values exist just long enough to be handed to
//! the notifier, which mails them as links. Reset tokens embed the account id
//! (`{id}__{secret}`) so the account can be resolved without a token scan.
//!
//! ## Access Control
//!
//! Every request passes a gate before reaching the account service: payload
//! predicates (email and password criteria), protected-field rejection on
//! `PATCH`, and authentication for everything except signup and the
//! account-management actions. Full replacement (`PUT`) is never allowed.

pub mod accounts;
pub mod api;
pub mod cli;
pub mod mailer;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
