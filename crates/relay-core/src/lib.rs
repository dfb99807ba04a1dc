pub mod buffer;
pub mod error;
pub mod events;
pub mod message;
pub mod registry;
pub mod summary;
pub mod tokens;

pub use buffer::ConversationBuffer;
pub use error::CoreError;
pub use events::StreamEvent;
pub use message::{Message, Role};
pub use registry::{hash_session_id, SessionRegistry, SharedBuffer};
pub use summary::{fold_summary, ConcatSummarizer, Summarizer};
pub use tokens::{estimate_message_tokens, estimate_tokens};
