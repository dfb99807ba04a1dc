use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use relay_core::CoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::EmptyMessage => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::RegistryFull(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}
