use super::error::{ApiError, ErrorBody};
use crate::accounts::{
    management::{Outcome, Transition},
    model::PublicAccount,
    Services,
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;
use utoipa::ToSchema;

/// `{action, value}` envelope; `value` is decoded per action.
#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct ManagementRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: Value,
}

#[utoipa::path(
    post,
    path = "/authManagement",
    request_body = ManagementRequest,
    responses(
        (status = 201, description = "Transition applied.", body = PublicAccount),
        (status = 204, description = "checkUnique found no conflict."),
        (status = 400, description = "Unknown action, bad payload or failed precondition.", body = ErrorBody),
        (status = 500, description = "Store or mail delivery failed.", body = ErrorBody),
    ),
    tag = "authManagement"
)]
#[instrument(skip_all)]
pub async fn auth_management(
    services: Extension<Services>,
    payload: Option<Json<ManagementRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let result = match Transition::decode(&request.action, request.value) {
        Ok(transition) => services.management.apply(transition).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(Outcome::Unique) => StatusCode::NO_CONTENT.into_response(),
        Ok(Outcome::Account(account)) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}
