use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use imcore::CoreError;
use serde::Serialize;

/// Thin HTTP wrapper around `imcore::CoreError`. Grounded on
/// `runelink-server/src/error.rs`'s `ApiError::into_response`: one status
/// code per logical kind, a JSON envelope carrying the machine-readable
/// tag alongside the human message.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.kind.tag().to_string(),
            message: self.0.message.clone(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
