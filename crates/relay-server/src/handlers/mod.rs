pub mod chat;
pub mod health;
pub mod sessions;

use actix_web::HttpRequest;

use crate::error::ApiError;
use crate::state::AppState;

/// Compare the request's `x-api-key` header against the shared secret.
pub(crate) fn require_api_key(state: &AppState, req: &HttpRequest) -> Result<(), ApiError> {
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());
    if provided == Some(state.internal_api_key.as_str()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}
