use crate::utils::error::EtlError;
use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

impl EtlError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EtlError::NotFound { .. } => StatusCode::NOT_FOUND,
            EtlError::MalformedPayload { .. }
            | EtlError::InvalidQuery { .. }
            | EtlError::InvalidIdentifier { .. }
            | EtlError::ValidationError { .. }
            | EtlError::SerializationError(_) => StatusCode::BAD_REQUEST,
            EtlError::UpstreamStatus { .. } | EtlError::ApiError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for EtlError {
    fn from(rejection: QueryRejection) -> Self {
        EtlError::InvalidQuery {
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for EtlError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
