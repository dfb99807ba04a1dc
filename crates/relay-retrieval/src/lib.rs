pub mod context;
pub mod ingest;
pub mod recency;
pub mod store;

pub use context::ContextBuilder;
pub use ingest::ingest_dir;
pub use recency::RecencyStore;
pub use store::{KeywordStore, RetrievalBackend, RetrievalItem};
