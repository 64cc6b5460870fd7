//! Bearer-token extraction for authenticated routes.

use crate::accounts::{
    authentication::Authentication, error::AccountError, users::Principal,
};
use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Pull the token out of `Authorization: Bearer <token>`.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolve the bearer token into a principal.
///
/// # Errors
/// [`AccountError::NoAuthToken`] without a bearer header,
/// [`AccountError::InvalidAuthToken`] when the token does not verify.
pub async fn require_auth(
    headers: &HeaderMap,
    authentication: &Authentication,
) -> Result<Principal, AccountError> {
    let token = extract_bearer_token(headers).ok_or(AccountError::NoAuthToken)?;
    authentication.principal(token).await
}
