use actix_web::{web, HttpRequest, HttpResponse};

use crate::error::ApiError;
use crate::handlers::require_api_key;
use crate::state::AppState;

/// Delete a session's conversation history. Requires the same shared
/// secret as `/chat`; deleting an unknown session is a 404.
pub async fn delete_handler(
    state: web::Data<AppState>,
    http_req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_api_key(&state, &http_req)?;

    let session_id = path.into_inner();

    if state.registry.clear(&session_id).await {
        log::info!("Session cleared");
        Ok(HttpResponse::Ok().json(serde_json::json!({ "cleared": true })))
    } else {
        Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "Session not found"
        })))
    }
}
