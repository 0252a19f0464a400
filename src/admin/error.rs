use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::cluster::ServiceError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("health checking is disabled")]
    HealthDisabled,
}

impl AdminError {
    fn status(&self) -> StatusCode {
        match self {
            AdminError::Service(ServiceError::Invalid(_)) => StatusCode::BAD_REQUEST,
            AdminError::Service(ServiceError::Decode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AdminError::Service(ServiceError::Store(e)) => match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::IsDirectory(_) | StoreError::NotDirectory(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_GATEWAY,
            },
            AdminError::HealthDisabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Management request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
