use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use relay_core::{hash_session_id, StreamEvent};
use relay_loop::{run_turn, TurnError};

use crate::error::ApiError;
use crate::handlers::require_api_key;
use crate::state::{spawn_sse_sender, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

/// Short prefix of the hashed session id, for log lines. The raw id
/// never reaches the log.
fn log_id(session_id: &str) -> String {
    let mut hashed = hash_session_id(session_id);
    hashed.truncate(8);
    hashed
}

pub async fn handler(
    state: web::Data<AppState>,
    http_req: HttpRequest,
    req: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    require_api_key(&state, &http_req)?;

    // Validate before touching the registry: a rejected request must
    // not create a session.
    if req.message.trim().is_empty() {
        return Err(ApiError::EmptyMessage);
    }

    let session_id = req
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let log_id = log_id(&session_id);

    let buffer = state.registry.get_or_create(&session_id).await?;

    log::info!("[{}] Chat turn started", log_id);

    let (sse_tx, mut sse_rx) = mpsc::channel::<actix_web::web::Bytes>(100);
    let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(100);
    spawn_sse_sender(event_rx, sse_tx);

    let llm = state.llm.clone();
    let turn_config = state.turn_config.clone();
    let message = req.message.clone();
    let cancel_token = CancellationToken::new();

    tokio::spawn(async move {
        let result = run_turn(
            &buffer,
            &message,
            &event_tx,
            &llm,
            &cancel_token,
            &turn_config,
            &log_id,
        )
        .await;

        match result {
            Ok(outcome) => log::info!(
                "[{}] Turn finished: {} tokens, committed={}",
                log_id,
                outcome.token_count,
                outcome.committed
            ),
            Err(TurnError::Cancelled) => {
                log::info!("[{}] Turn ended early, client gone", log_id)
            }
            Err(error) => log::error!("[{}] Turn failed: {}", log_id, error),
        }
    });

    Ok(HttpResponse::Ok()
        .append_header((header::CONTENT_TYPE, "text/event-stream"))
        .append_header((header::CACHE_CONTROL, "no-cache"))
        .append_header(("X-Accel-Buffering", "no"))
        .append_header(("x-session-id", session_id))
        .streaming(async_stream::stream! {
            while let Some(frame) = sse_rx.recv().await {
                yield Ok::<_, actix_web::Error>(frame);
            }
        }))
}
