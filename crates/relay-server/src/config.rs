use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use relay_llm::openrouter::DEFAULT_API_URL;

#[derive(Parser, Debug, Clone)]
#[command(name = "chat-relay-server")]
#[command(about = "Streaming chat relay over OpenRouter")]
#[command(version)]
pub struct Cli {
    /// OpenRouter API key (upstream credential)
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: String,

    /// Shared secret clients must present in x-api-key
    #[arg(long, env = "INTERNAL_API_KEY", hide_env_values = true)]
    pub internal_api_key: String,

    /// Chat completions endpoint
    #[arg(long, env = "OPENROUTER_API_URL", default_value = DEFAULT_API_URL)]
    pub openrouter_api_url: String,

    /// Model identifier sent upstream
    #[arg(long, env = "MODEL_NAME", default_value = "deepseek/deepseek-chat")]
    pub model_name: String,

    /// Sampling temperature, 0.0 through 2.0
    #[arg(long, env = "MODEL_TEMPERATURE", default_value = "0.2", value_parser = parse_temperature)]
    pub model_temperature: f32,

    /// Upstream completion token cap, must be positive
    #[arg(long, env = "MODEL_MAX_TOKENS", default_value = "2000", value_parser = parse_max_tokens)]
    pub model_max_tokens: u32,

    /// Seconds of mid-stream upstream silence tolerated before the turn
    /// fails, must be positive
    #[arg(long, env = "STREAM_IDLE_TIMEOUT_SECS", default_value = "120", value_parser = parse_timeout_secs)]
    pub stream_idle_timeout_secs: u64,

    /// Log level: DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO", value_parser = parse_log_level)]
    pub log_level: LevelFilter,

    /// Allowed CORS origins, comma separated; "*" allows any
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',', default_value = "http://localhost:3000")]
    pub cors_origins: Vec<String>,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Directory of .txt/.md documents to ingest for retrieval
    #[arg(long, env = "DOCS_DIR")]
    pub docs_dir: Option<PathBuf>,

    /// Retrieval passages injected per turn
    #[arg(long, env = "RETRIEVAL_TOP_K", default_value = "3")]
    pub retrieval_top_k: usize,

    /// Passage lookup strategy for ingested documents
    #[arg(long, env = "RETRIEVAL_BACKEND", value_enum, default_value = "keyword")]
    pub retrieval_backend: RetrievalBackendKind,

    /// Conversation turns retained before summarization
    #[arg(long, env = "MAX_TURNS", default_value = "10")]
    pub max_turns: usize,

    /// Estimated-token bound on a session's history
    #[arg(long, env = "MAX_CONTEXT_TOKENS", default_value = "6000")]
    pub max_context_tokens: usize,

    /// Hard bound on live sessions
    #[arg(long, env = "SESSION_CAPACITY", default_value = "10000")]
    pub session_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum RetrievalBackendKind {
    /// Word-overlap scoring against the query.
    Keyword,
    /// Most recent passages, regardless of the query.
    Recency,
}

/// Startup refuses unknown level names; a typo'd LOG_LEVEL must not
/// silently run at Info.
fn parse_log_level(value: &str) -> Result<LevelFilter, String> {
    match value.to_ascii_uppercase().as_str() {
        "DEBUG" => Ok(LevelFilter::Debug),
        "INFO" => Ok(LevelFilter::Info),
        "WARNING" | "WARN" => Ok(LevelFilter::Warn),
        "ERROR" => Ok(LevelFilter::Error),
        "CRITICAL" => Ok(LevelFilter::Error),
        other => Err(format!(
            "unknown log level {other:?}, expected DEBUG, INFO, WARNING, ERROR or CRITICAL"
        )),
    }
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    let parsed: f32 = value
        .parse()
        .map_err(|_| format!("not a number: {value}"))?;
    if !(0.0..=2.0).contains(&parsed) {
        return Err(format!("temperature {parsed} outside 0.0..=2.0"));
    }
    Ok(parsed)
}

fn parse_max_tokens(value: &str) -> Result<u32, String> {
    let parsed: u32 = value
        .parse()
        .map_err(|_| format!("not a positive integer: {value}"))?;
    if parsed == 0 {
        return Err("max_tokens must be positive".to_string());
    }
    Ok(parsed)
}

fn parse_timeout_secs(value: &str) -> Result<u64, String> {
    let parsed: u64 = value
        .parse()
        .map_err(|_| format!("not a positive integer: {value}"))?;
    if parsed == 0 {
        return Err("timeout must be positive".to_string());
    }
    Ok(parsed)
}
