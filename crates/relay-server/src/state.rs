use std::sync::Arc;
use std::time::Duration;

use actix_web::web::Bytes;
use tokio::sync::mpsc;

use relay_core::{SessionRegistry, StreamEvent};
use relay_llm::{LlmProvider, OpenRouterProvider};
use relay_loop::TurnConfig;
use relay_retrieval::{
    ingest_dir, ContextBuilder, KeywordStore, RecencyStore, RetrievalBackend,
};

use crate::config::{Cli, RetrievalBackendKind};

pub struct AppState {
    pub registry: SessionRegistry,
    pub llm: Arc<dyn LlmProvider>,
    pub turn_config: TurnConfig,
    pub internal_api_key: String,
    pub model_name: String,
}

impl AppState {
    pub async fn from_cli(cli: &Cli) -> Self {
        let llm: Arc<dyn LlmProvider> = Arc::new(
            OpenRouterProvider::new(cli.openrouter_api_key.clone())
                .with_api_url(cli.openrouter_api_url.clone())
                .with_model(cli.model_name.clone())
                .with_temperature(cli.model_temperature)
                .with_max_tokens(cli.model_max_tokens),
        );

        let retrieval = match &cli.docs_dir {
            Some(dir) => {
                let store: Arc<dyn RetrievalBackend> = match cli.retrieval_backend {
                    RetrievalBackendKind::Keyword => Arc::new(KeywordStore::new()),
                    RetrievalBackendKind::Recency => Arc::new(RecencyStore::new()),
                };
                match ingest_dir(store.as_ref(), dir).await {
                    Ok(count) if count > 0 => {
                        log::info!("Retrieval enabled with {} passages", count);
                        Some(Arc::new(ContextBuilder::new(store, cli.retrieval_top_k)))
                    }
                    Ok(_) => {
                        log::warn!("No ingestable passages under {:?}", dir);
                        None
                    }
                    Err(error) => {
                        log::warn!("Failed to ingest {:?}: {}", dir, error);
                        None
                    }
                }
            }
            None => None,
        };

        Self {
            registry: SessionRegistry::new(
                cli.session_capacity,
                cli.max_turns,
                cli.max_context_tokens,
            ),
            llm,
            turn_config: TurnConfig {
                retrieval,
                stream_idle_timeout: Duration::from_secs(cli.stream_idle_timeout_secs),
                ..TurnConfig::default()
            },
            internal_api_key: cli.internal_api_key.clone(),
            model_name: cli.model_name.clone(),
        }
    }
}

/// Wire format for one event: `event:` name plus `data:` payload.
pub fn sse_frame(event: &StreamEvent) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", event.name(), event.data()))
}

/// Forward turn events to the HTTP response as SSE frames. Ends after
/// the first terminal event, or when the client side hangs up.
pub fn spawn_sse_sender(
    mut rx: mpsc::Receiver<StreamEvent>,
    tx: mpsc::Sender<Bytes>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();

            if tx.send(sse_frame(&event)).await.is_err() {
                break;
            }
            if terminal {
                break;
            }
        }
    })
}
