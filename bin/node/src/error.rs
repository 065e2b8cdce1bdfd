//! HTTP error mapping

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use emlog_core::CoreError;
use tracing::error;

/// Error returned by every handler, rendered as `{"error": .., "code": ..}`
#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub(crate) const fn status(&self) -> StatusCode {
        match self {
            Self::Core(err) => match err {
                CoreError::Validation(_) | CoreError::Canonicalization(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                CoreError::EmptyBatch | CoreError::IndexOutOfRange { .. } => {
                    StatusCode::BAD_REQUEST
                }
                CoreError::LogNotFound(_) | CoreError::BatchNotFound(_) => StatusCode::NOT_FOUND,
                CoreError::NotBatched(_) | CoreError::BatchConflict(_) => StatusCode::CONFLICT,
                CoreError::Integrity(_) | CoreError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // well-formed JSON that does not fit the schema
            JsonRejection::JsonDataError(err) => CoreError::Validation(err.body_text()).into(),
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emlog_core::{BatchId, LogId};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::Canonicalization("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::EmptyBatch, StatusCode::BAD_REQUEST),
            (CoreError::IndexOutOfRange { index: 3, leaf_count: 2 }, StatusCode::BAD_REQUEST),
            (CoreError::LogNotFound(LogId::from("log_x")), StatusCode::NOT_FOUND),
            (CoreError::BatchNotFound(BatchId::from("batch_x")), StatusCode::NOT_FOUND),
            (CoreError::NotBatched(LogId::from("log_x")), StatusCode::CONFLICT),
            (CoreError::BatchConflict("x".into()), StatusCode::CONFLICT),
            (CoreError::Integrity("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (CoreError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_response_status() {
        let response = ApiError::from(CoreError::EmptyBatch).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
