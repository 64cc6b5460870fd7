use super::{
    error::{ApiError, ErrorBody},
    principal::extract_bearer_token,
};
use crate::accounts::{
    authentication::{AuthenticationRequest, AuthenticationResponse},
    error::AccountError,
    Services,
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::instrument;

#[utoipa::path(
    post,
    path = "/authentication",
    request_body = AuthenticationRequest,
    responses(
        (status = 201, description = "Access token issued.", body = AuthenticationResponse),
        (status = 401, description = "Missing strategy or bad credentials.", body = ErrorBody),
    ),
    tag = "authentication"
)]
#[instrument(skip_all)]
pub async fn authenticate(
    services: Extension<Services>,
    payload: Option<Json<AuthenticationRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    match services.authentication.authenticate(request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/authentication",
    responses(
        (status = 200, description = "Token was valid; the session is over.", body = AuthenticationResponse),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
    ),
    tag = "authentication"
)]
#[instrument(skip_all)]
pub async fn logout(headers: HeaderMap, services: Extension<Services>) -> Response {
    let result = match extract_bearer_token(&headers) {
        Some(token) => services.authentication.logout(token).await,
        None => Err(AccountError::NoAuthToken),
    };

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}
