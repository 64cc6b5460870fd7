//! `/users` endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the bearer token (signup is open).
//! 2) Hand the request to the account service, which runs the gate.
//! 3) Return the sanitized record or the mapped error body.

use super::{error::ApiError, error::ErrorBody, principal::require_auth};
use crate::accounts::{
    error::AccountError,
    model::{AccountId, PublicAccount},
    users::SignupRequest,
    Services,
};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{Map, Value};

fn parse_id(id: &str) -> Result<AccountId, AccountError> {
    id.trim()
        .parse::<AccountId>()
        .map_err(|_| AccountError::InvalidId(id.to_string()))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All accounts, sanitized.", body = [PublicAccount]),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn list_users(headers: HeaderMap, services: Extension<Services>) -> Response {
    let result = async {
        let principal = require_auth(&headers, &services.authentication).await?;
        services.users.list(&principal).await
    }
    .await;

    match result {
        Ok(accounts) => (StatusCode::OK, Json(accounts)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, verification mail sent.", body = PublicAccount),
        (status = 400, description = "Invalid email or password, or email taken.", body = ErrorBody),
        (status = 500, description = "Store or mail delivery failed.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn create_user(
    services: Extension<Services>,
    payload: Option<Json<SignupRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    match services.users.signup(request).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Account, sanitized.", body = PublicAccount),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 404, description = "No such account.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    services: Extension<Services>,
) -> Response {
    let result = async {
        let principal = require_auth(&headers, &services.authentication).await?;
        let id = parse_id(&id)?;
        services.users.get(&principal, id).await
    }
    .await;

    match result {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "Account id")
    ),
    responses(
        (status = 405, description = "Full replacement is not allowed.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn replace_user(Path(id): Path<String>, services: Extension<Services>) -> Response {
    let result = parse_id(&id).and_then(|id| services.users.replace(id));

    match result {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "Account id")
    ),
    request_body(content = Object, description = "Only `password` may be patched."),
    responses(
        (status = 200, description = "Password changed.", body = PublicAccount),
        (status = 400, description = "Protected field or invalid password.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 404, description = "Not the caller's account.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn patch_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    services: Extension<Services>,
    payload: Option<Json<Map<String, Value>>>,
) -> Response {
    let patch = payload.map(|Json(patch)| patch).unwrap_or_default();

    let result = async {
        let principal = require_auth(&headers, &services.authentication).await?;
        let id = parse_id(&id)?;
        services.users.patch(&principal, id, &patch).await
    }
    .await;

    match result {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Account removed.", body = PublicAccount),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 404, description = "Not the caller's account.", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    services: Extension<Services>,
) -> Response {
    let result = async {
        let principal = require_auth(&headers, &services.authentication).await?;
        let id = parse_id(&id)?;
        services.users.remove(&principal, id).await
    }
    .await;

    match result {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}
