//! Wire format for every failed request: `{"code", "name", "message"}`.

use crate::accounts::error::AccountError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

const INTERNAL_MESSAGE: &str = "An internal error occurred.";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: u16,
    pub name: String,
    pub message: String,
}

/// HTTP view of an [`AccountError`].
#[derive(Debug)]
pub struct ApiError(pub AccountError);

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        Self(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let kind = self.0.kind();
        let message = match &self.0 {
            AccountError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            code: kind.code(),
            name: kind.as_str().to_string(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let AccountError::Internal(err) = &self.0 {
            error!("internal error: {err:#}");
        }
        let body = self.body();
        let status =
            StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}
