//! One chat turn, driven end to end.
//!
//! Phases: AwaitingUser -> Assembling -> Streaming -> Committing -> Idle,
//! with Streaming -> Failed on upstream error. The user message is
//! recorded before the model call and the assistant reply is committed
//! at most once per turn, after streaming ends, however it ends.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use futures::StreamExt;
use relay_core::{Role, SharedBuffer, StreamEvent};
use relay_llm::{LlmProvider, StreamChunk};

use crate::config::TurnConfig;

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Empty message")]
    EmptyMessage,

    #[error("API error: {0}")]
    Api(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("No upstream data for {0:?}")]
    Stalled(Duration),

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub token_count: usize,
    pub committed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    AwaitingUser,
    Assembling,
    Streaming,
    Committing,
    Failed,
    Idle,
}

fn enter(phase: Phase, session_id: &str) {
    log::debug!("[{}] turn phase: {:?}", session_id, phase);
}

/// Run one turn: validate, record the user message, stream the model
/// response through `event_tx`, and commit the assistant reply.
///
/// The buffer lock is held for the whole turn, so concurrent turns on
/// one session serialize instead of interleaving buffer mutations.
pub async fn run_turn(
    buffer: &SharedBuffer,
    user_message: &str,
    event_tx: &mpsc::Sender<StreamEvent>,
    llm: &Arc<dyn LlmProvider>,
    cancel_token: &CancellationToken,
    config: &TurnConfig,
    session_id: &str,
) -> Result<TurnOutcome, TurnError> {
    enter(Phase::AwaitingUser, session_id);
    let user_message = user_message.trim();
    if user_message.is_empty() {
        return Err(TurnError::EmptyMessage);
    }

    enter(Phase::Assembling, session_id);
    let mut buffer = buffer.lock().await;

    // Recorded exactly once, before the model call: even if the call
    // fails, the user's turn is part of the history.
    buffer.add(Role::User, user_message);

    let mut outbound = vec![relay_core::Message::system(config.system_prompt.clone())];
    if let Some(retrieval) = &config.retrieval {
        if let Some(context) = retrieval.build_context(user_message) {
            outbound.push(context);
        }
    }
    // The user message is already in the buffer, so it appears exactly
    // once in the final sequence.
    outbound.extend(buffer.build());

    enter(Phase::Streaming, session_id);
    let mut stream = match llm.chat_stream(&outbound).await {
        Ok(stream) => stream,
        Err(err) => {
            enter(Phase::Failed, session_id);
            let message = err.to_string();
            let _ = event_tx.send(StreamEvent::Error(message.clone())).await;
            return Err(TurnError::Api(message));
        }
    };

    let mut assistant_text = String::new();
    let mut token_count = 0usize;
    let mut stream_error: Option<String> = None;
    let mut cancelled = false;
    let mut stalled = false;

    loop {
        // The idle timer restarts for every chunk: an alive-but-silent
        // upstream cannot hold this session's lock forever.
        let item = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                cancelled = true;
                break;
            }
            _ = sleep(config.stream_idle_timeout) => {
                stalled = true;
                break;
            }
            item = stream.next() => match item {
                Some(item) => item,
                None => break,
            },
        };

        match item {
            Ok(StreamChunk::Token(token)) => {
                assistant_text.push_str(&token);
                token_count += 1;
                if event_tx.send(StreamEvent::Token(token)).await.is_err() {
                    // Client is gone; stop consuming upstream promptly.
                    log::info!("[{}] client disconnected mid-stream", session_id);
                    cancelled = true;
                    break;
                }
            }
            Ok(StreamChunk::Done) => break,
            Err(err) => {
                stream_error = Some(err.to_string());
                break;
            }
        }
    }

    enter(Phase::Committing, session_id);
    let committed = !assistant_text.is_empty();
    if committed {
        buffer.add(Role::Assistant, &assistant_text);
        log::info!(
            "[{}] committed assistant reply ({} tokens, {} chars)",
            session_id,
            token_count,
            assistant_text.len()
        );
    }

    if let Some(message) = stream_error {
        enter(Phase::Failed, session_id);
        log::error!("[{}] stream failed: {}", session_id, message);
        let _ = event_tx.send(StreamEvent::Error(message.clone())).await;
        return Err(TurnError::Stream(message));
    }
    if stalled {
        enter(Phase::Failed, session_id);
        let error = TurnError::Stalled(config.stream_idle_timeout);
        log::error!("[{}] {}", session_id, error);
        let _ = event_tx.send(StreamEvent::Error(error.to_string())).await;
        return Err(error);
    }
    if cancelled {
        return Err(TurnError::Cancelled);
    }

    let _ = event_tx.send(StreamEvent::Done).await;
    enter(Phase::Idle, session_id);
    Ok(TurnOutcome {
        token_count,
        committed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex;

    use relay_core::{ConversationBuffer, Message};
    use relay_llm::{LlmError, TokenStream};

    struct ScriptedProvider {
        items: StdMutex<Option<Vec<relay_llm::Result<StreamChunk>>>>,
    }

    impl ScriptedProvider {
        fn new(items: Vec<relay_llm::Result<StreamChunk>>) -> Arc<dyn LlmProvider> {
            Arc::new(Self {
                items: StdMutex::new(Some(items)),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat_stream(&self, _messages: &[Message]) -> relay_llm::Result<TokenStream> {
            let items = self
                .items
                .lock()
                .unwrap()
                .take()
                .expect("stream requested twice");
            Ok(Box::pin(stream::iter(items)))
        }
    }

    struct StreamProvider {
        stream: StdMutex<Option<TokenStream>>,
    }

    impl StreamProvider {
        fn new(stream: TokenStream) -> Arc<dyn LlmProvider> {
            Arc::new(Self {
                stream: StdMutex::new(Some(stream)),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for StreamProvider {
        async fn chat_stream(&self, _messages: &[Message]) -> relay_llm::Result<TokenStream> {
            Ok(self
                .stream
                .lock()
                .unwrap()
                .take()
                .expect("stream requested twice"))
        }
    }

    struct RejectingProvider;

    #[async_trait]
    impl LlmProvider for RejectingProvider {
        async fn chat_stream(&self, _messages: &[Message]) -> relay_llm::Result<TokenStream> {
            Err(LlmError::Api {
                status: 500,
                body: "upstream down".into(),
            })
        }
    }

    fn fresh_buffer() -> SharedBuffer {
        Arc::new(Mutex::new(ConversationBuffer::new(10, 100_000)))
    }

    fn token(text: &str) -> relay_llm::Result<StreamChunk> {
        Ok(StreamChunk::Token(text.into()))
    }

    async fn drain(rx: &mut mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn happy_path_forwards_in_order_and_commits_once() {
        let buffer = fresh_buffer();
        let llm = ScriptedProvider::new(vec![
            token("Hel"),
            token("lo"),
            Ok(StreamChunk::Done),
        ]);
        let (tx, mut rx) = mpsc::channel(16);

        let outcome = run_turn(
            &buffer,
            "hi there",
            &tx,
            &llm,
            &CancellationToken::new(),
            &TurnConfig::default(),
            "s1",
        )
        .await
        .unwrap();

        assert_eq!(outcome.token_count, 2);
        assert!(outcome.committed);

        let events = drain(&mut rx).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("Hel".into()),
                StreamEvent::Token("lo".into()),
                StreamEvent::Done,
            ]
        );

        let buffer = buffer.lock().await;
        let messages = buffer.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("hi there"));
        assert_eq!(messages[1], Message::assistant("Hello"));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_mutation() {
        let buffer = fresh_buffer();
        let llm = ScriptedProvider::new(vec![Ok(StreamChunk::Done)]);
        let (tx, mut rx) = mpsc::channel(16);

        let result = run_turn(
            &buffer,
            "   ",
            &tx,
            &llm,
            &CancellationToken::new(),
            &TurnConfig::default(),
            "s1",
        )
        .await;

        assert!(matches!(result, Err(TurnError::EmptyMessage)));
        assert!(drain(&mut rx).await.is_empty());
        assert!(buffer.lock().await.messages().is_empty());
    }

    #[tokio::test]
    async fn zero_tokens_means_no_commit() {
        let buffer = fresh_buffer();
        let llm = ScriptedProvider::new(vec![Ok(StreamChunk::Done)]);
        let (tx, mut rx) = mpsc::channel(16);

        let outcome = run_turn(
            &buffer,
            "hi",
            &tx,
            &llm,
            &CancellationToken::new(),
            &TurnConfig::default(),
            "s1",
        )
        .await
        .unwrap();

        assert!(!outcome.committed);
        assert_eq!(drain(&mut rx).await, vec![StreamEvent::Done]);

        let buffer = buffer.lock().await;
        assert_eq!(buffer.messages().len(), 1);
        assert_eq!(buffer.messages()[0].role, Role::User);
    }

    #[tokio::test]
    async fn mid_stream_error_commits_partial_then_surfaces_error() {
        let buffer = fresh_buffer();
        let llm = ScriptedProvider::new(vec![
            token("part"),
            Err(LlmError::Stream("connection reset".into())),
        ]);
        let (tx, mut rx) = mpsc::channel(16);

        let result = run_turn(
            &buffer,
            "hi",
            &tx,
            &llm,
            &CancellationToken::new(),
            &TurnConfig::default(),
            "s1",
        )
        .await;

        assert!(matches!(result, Err(TurnError::Stream(_))));

        let events = drain(&mut rx).await;
        assert_eq!(events[0], StreamEvent::Token("part".into()));
        assert!(matches!(events[1], StreamEvent::Error(_)));

        // Partial text preserved, exactly one assistant message.
        let buffer = buffer.lock().await;
        let assistants: Vec<_> = buffer
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .collect();
        assert_eq!(assistants.len(), 1);
        assert_eq!(assistants[0].content, "part");
    }

    #[tokio::test]
    async fn upstream_rejection_keeps_user_message_and_emits_error() {
        let buffer = fresh_buffer();
        let llm: Arc<dyn LlmProvider> = Arc::new(RejectingProvider);
        let (tx, mut rx) = mpsc::channel(16);

        let result = run_turn(
            &buffer,
            "hi",
            &tx,
            &llm,
            &CancellationToken::new(),
            &TurnConfig::default(),
            "s1",
        )
        .await;

        assert!(matches!(result, Err(TurnError::Api(_))));

        let events = drain(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Error(_)));

        let buffer = buffer.lock().await;
        assert_eq!(buffer.messages().len(), 1);
        assert_eq!(buffer.messages()[0].role, Role::User);
    }

    #[tokio::test]
    async fn client_disconnect_still_commits_partial_text() {
        let buffer = fresh_buffer();
        let llm = ScriptedProvider::new(vec![
            token("kept"),
            token("lost"),
            Ok(StreamChunk::Done),
        ]);
        let (tx, rx) = mpsc::channel(16);
        drop(rx); // client gone before the first forward

        let result = run_turn(
            &buffer,
            "hi",
            &tx,
            &llm,
            &CancellationToken::new(),
            &TurnConfig::default(),
            "s1",
        )
        .await;

        assert!(matches!(result, Err(TurnError::Cancelled)));

        let buffer = buffer.lock().await;
        let assistants: Vec<_> = buffer
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .collect();
        assert_eq!(assistants.len(), 1);
        assert_eq!(assistants[0].content, "kept");
    }

    #[tokio::test]
    async fn cancellation_token_stops_consumption() {
        let buffer = fresh_buffer();
        let llm = ScriptedProvider::new(vec![token("a"), token("b"), Ok(StreamChunk::Done)]);
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_turn(
            &buffer,
            "hi",
            &tx,
            &llm,
            &cancel,
            &TurnConfig::default(),
            "s1",
        )
        .await;

        assert!(matches!(result, Err(TurnError::Cancelled)));
        assert!(drain(&mut rx).await.is_empty());
        // Nothing accumulated, nothing committed.
        assert_eq!(buffer.lock().await.messages().len(), 1);
    }

    #[tokio::test]
    async fn stalled_upstream_times_out_after_partial_commit() {
        let buffer = fresh_buffer();
        let llm = StreamProvider::new(Box::pin(
            stream::iter(vec![token("part")]).chain(stream::pending()),
        ));
        let (tx, mut rx) = mpsc::channel(16);
        let config = TurnConfig {
            stream_idle_timeout: Duration::from_millis(50),
            ..TurnConfig::default()
        };

        let result = run_turn(
            &buffer,
            "hi",
            &tx,
            &llm,
            &CancellationToken::new(),
            &config,
            "s1",
        )
        .await;

        assert!(matches!(result, Err(TurnError::Stalled(_))));

        // Partial text is committed and the client hears about the failure.
        let events = drain(&mut rx).await;
        assert_eq!(events[0], StreamEvent::Token("part".into()));
        assert!(matches!(events[1], StreamEvent::Error(_)));

        let buffer = buffer.lock().await;
        let assistants: Vec<_> = buffer
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .collect();
        assert_eq!(assistants.len(), 1);
        assert_eq!(assistants[0].content, "part");
    }

    #[tokio::test]
    async fn cancellation_interrupts_silent_stream() {
        let buffer = fresh_buffer();
        let llm = StreamProvider::new(Box::pin(stream::pending()));
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        // A stream that never yields must not keep the turn (and the
        // session lock) alive past cancellation.
        let result = run_turn(
            &buffer,
            "hi",
            &tx,
            &llm,
            &cancel,
            &TurnConfig::default(),
            "s1",
        )
        .await;

        assert!(matches!(result, Err(TurnError::Cancelled)));
        assert!(drain(&mut rx).await.is_empty());
        assert!(!buffer.lock().await.messages().is_empty());
    }

    #[tokio::test]
    async fn retrieval_context_is_injected_between_prompt_and_history() {
        use relay_retrieval::{ContextBuilder, KeywordStore, RetrievalBackend};

        struct CapturingProvider {
            seen: StdMutex<Vec<Message>>,
        }

        #[async_trait]
        impl LlmProvider for CapturingProvider {
            async fn chat_stream(&self, messages: &[Message]) -> relay_llm::Result<TokenStream> {
                *self.seen.lock().unwrap() = messages.to_vec();
                Ok(Box::pin(stream::iter(vec![Ok(StreamChunk::Done)])))
            }
        }

        let store = KeywordStore::new();
        store.add("rust ownership explained", "book.md");
        let config = TurnConfig {
            retrieval: Some(Arc::new(ContextBuilder::new(Arc::new(store), 2))),
            ..TurnConfig::default()
        };

        let provider = Arc::new(CapturingProvider {
            seen: StdMutex::new(Vec::new()),
        });
        let llm: Arc<dyn LlmProvider> = provider.clone();
        let buffer = fresh_buffer();
        let (tx, _rx) = mpsc::channel(16);

        run_turn(
            &buffer,
            "tell me about rust ownership",
            &tx,
            &llm,
            &CancellationToken::new(),
            &config,
            "s1",
        )
        .await
        .unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].content, config.system_prompt);
        assert!(seen[1].content.contains("[Source: book.md]"));
        // Exactly one copy of the user message, last.
        let user_count = seen
            .iter()
            .filter(|m| m.role == Role::User)
            .count();
        assert_eq!(user_count, 1);
        assert_eq!(seen.last().unwrap().content, "tell me about rust ownership");
    }
}
