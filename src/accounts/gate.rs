//! Request checks that run before the account service is allowed to act.

use super::{
    error::AccountError,
    management::Transition,
    validation::{is_email_valid, is_password_valid},
};
use serde_json::{Map, Value};

/// Fields an external `PATCH` may never carry.
pub const PROTECTED_FIELDS: [&str; 9] = [
    "email",
    "isVerified",
    "verifyToken",
    "verifyShortToken",
    "verifyExpires",
    "verifyChanges",
    "resetToken",
    "resetShortToken",
    "resetExpires",
];

/// Per-action payload checks for `/authManagement`.
///
/// # Errors
/// Returns the criteria error for the first failing field.
pub fn check_transition(transition: &Transition) -> Result<(), AccountError> {
    match transition {
        Transition::ResetPwdLong(value) => check_password(value.password.as_deref()),
        Transition::ResetPwdShort(value) => check_password(value.password.as_deref()),
        Transition::PasswordChange(value) => {
            check_password(value.password.as_deref())?;
            if value.old_password.is_none() {
                return Err(AccountError::ExpectedString);
            }
            Ok(())
        }
        Transition::IdentityChange(value) => check_email(value.changes.email.as_deref()),
        _ => Ok(()),
    }
}

/// The same checks on the raw `value`, run before it is decoded so that a
/// criteria failure is reported even when the rest of the payload is incomplete.
///
/// # Errors
/// Returns the criteria error for the first failing field.
pub fn check_payload(action: &str, value: &Value) -> Result<(), AccountError> {
    let field = |name: &str| value.get(name).and_then(Value::as_str);
    match action {
        "resetPwdLong" | "resetPwdShort" => check_password(field("password")),
        "passwordChange" => {
            check_password(field("password"))?;
            if field("oldPassword").is_none() {
                return Err(AccountError::ExpectedString);
            }
            Ok(())
        }
        "identityChange" => check_email(value.pointer("/changes/email").and_then(Value::as_str)),
        _ => Ok(()),
    }
}

/// Signup checks, email first.
///
/// # Errors
/// Returns the criteria error for the first failing field.
pub fn check_signup(email: Option<&str>, password: Option<&str>) -> Result<(), AccountError> {
    check_email(email)?;
    check_password(password)
}

/// External `PATCH` checks. Returns the new password to hash.
///
/// # Errors
/// Rejects protected fields, then a missing or invalid password.
pub fn check_patch(patch: &Map<String, Value>) -> Result<String, AccountError> {
    if let Some(field) = PROTECTED_FIELDS.iter().find(|f| patch.contains_key(**f)) {
        return Err(AccountError::ProtectedField((*field).to_string()));
    }
    if patch.contains_key("passwordHash") {
        return Err(AccountError::ProtectedField("passwordHash".to_string()));
    }

    let password = patch.get("password").and_then(Value::as_str);
    check_password(password)?;
    Ok(password.map(ToString::to_string).unwrap_or_default())
}

fn check_email(email: Option<&str>) -> Result<(), AccountError> {
    if email.is_some_and(is_email_valid) {
        Ok(())
    } else {
        Err(AccountError::EmailCriteria)
    }
}

fn check_password(password: Option<&str>) -> Result<(), AccountError> {
    if is_password_valid(password) {
        Ok(())
    } else {
        Err(AccountError::PasswordCriteria)
    }
}
