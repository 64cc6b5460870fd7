//! `/secrets`: a fixed resource that only authenticated callers can read.

use super::{
    error::{ApiError, ErrorBody},
    principal::require_auth,
};
use crate::accounts::Services;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub id: i64,
    pub value: String,
}

fn secrets() -> Vec<Secret> {
    vec![Secret {
        id: 1,
        value: "very-confidential".to_string(),
    }]
}

#[utoipa::path(
    get,
    path = "/secrets",
    responses(
        (status = 200, description = "Secrets visible to any signed-in account.", body = [Secret]),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
    ),
    tag = "secrets"
)]
pub async fn list_secrets(headers: HeaderMap, services: Extension<Services>) -> Response {
    match require_auth(&headers, &services.authentication).await {
        Ok(principal) => {
            debug!("secrets read by account {}", principal.id);
            (StatusCode::OK, Json(secrets())).into_response()
        }
        Err(err) => ApiError(err).into_response(),
    }
}
