use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_LLAMA_PARSE_URL: &str = "https://api.cloud.llamaindex.ai";
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docchat server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the LlamaParse API.
    pub llama_parse_url: String,
    /// Base URL of the Gemini generative language API.
    pub gemini_url: String,
    /// Model used to synthesize answers.
    pub llm_model: String,
    /// Sampling temperature for answer synthesis.
    pub llm_temperature: f32,
    /// Nucleus sampling cutoff for answer synthesis.
    pub llm_top_p: f32,
    /// Maximum number of tokens the model may emit per answer.
    pub llm_max_tokens: u32,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Window size used when chunking parsed sections.
    pub chunk_size: usize,
    /// Overlap shared by consecutive windows.
    pub chunk_overlap: usize,
    /// Unit in which chunk size and overlap are measured.
    pub chunk_unit: ChunkUnit,
    /// Character budget of a single context block during compact synthesis.
    pub context_window_chars: usize,
    /// Delay between two LlamaParse job status polls.
    pub parse_poll_interval_ms: u64,
    /// Upper bound on how long a parse job may take before it is abandoned.
    pub parse_timeout_secs: u64,
    /// Seconds a session may go without requests before it is discarded.
    pub idle_session_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Gemini key read at startup; seeds new sessions together with the LlamaParse key.
    pub gemini_api_key: Option<String>,
    /// LlamaParse key read at startup.
    pub llama_cloud_api_key: Option<String>,
}

/// Unit used to measure chunk windows.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// BPE tokens (cl100k_base).
    Tokens,
    /// Unicode scalar values.
    Characters,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llama_parse_url: DEFAULT_LLAMA_PARSE_URL.to_string(),
            gemini_url: DEFAULT_GEMINI_URL.to_string(),
            llm_model: "models/gemini-1.5-flash".to_string(),
            llm_temperature: 0.3,
            llm_top_p: 0.85,
            llm_max_tokens: 4096,
            embedding_model: "models/embedding-001".to_string(),
            embedding_dimension: 768,
            chunk_size: 1024,
            chunk_overlap: 200,
            chunk_unit: ChunkUnit::Tokens,
            context_window_chars: 24_000,
            parse_poll_interval_ms: 1_000,
            parse_timeout_secs: 300,
            idle_session_secs: 3_600,
            server_port: None,
            gemini_api_key: None,
            llama_cloud_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    ///
    /// Every variable is optional; unset values fall back to [`Config::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            llama_parse_url: load_env_optional("LLAMA_PARSE_URL")
                .unwrap_or(defaults.llama_parse_url),
            gemini_url: load_env_optional("GEMINI_URL").unwrap_or(defaults.gemini_url),
            llm_model: load_env_optional("LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_temperature: load_parsed("LLM_TEMPERATURE")?.unwrap_or(defaults.llm_temperature),
            llm_top_p: load_parsed("LLM_TOP_P")?.unwrap_or(defaults.llm_top_p),
            llm_max_tokens: load_parsed("LLM_MAX_TOKENS")?.unwrap_or(defaults.llm_max_tokens),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimension: load_parsed("EMBEDDING_DIMENSION")?
                .unwrap_or(defaults.embedding_dimension),
            chunk_size: load_parsed("CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            chunk_overlap: load_parsed("CHUNK_OVERLAP")?.unwrap_or(defaults.chunk_overlap),
            chunk_unit: load_env_optional("CHUNK_UNIT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("CHUNK_UNIT".to_string()))
                })
                .transpose()?
                .unwrap_or(defaults.chunk_unit),
            context_window_chars: load_parsed("CONTEXT_WINDOW_CHARS")?
                .unwrap_or(defaults.context_window_chars),
            parse_poll_interval_ms: load_parsed("PARSE_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.parse_poll_interval_ms),
            parse_timeout_secs: load_parsed("PARSE_TIMEOUT_SECS")?
                .unwrap_or(defaults.parse_timeout_secs),
            idle_session_secs: load_parsed("IDLE_SESSION_SECS")?
                .unwrap_or(defaults.idle_session_secs),
            server_port: load_parsed("SERVER_PORT")?,
            gemini_api_key: load_env_optional("GEMINI_API_KEY"),
            llama_cloud_api_key: load_env_optional("LLAMA_CLOUD_API_KEY"),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for ChunkUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tokens" | "token" => Ok(Self::Tokens),
            "characters" | "chars" | "character" => Ok(Self::Characters),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        llama_parse_url = %config.llama_parse_url,
        gemini_url = %config.gemini_url,
        llm_model = %config.llm_model,
        embedding_model = %config.embedding_model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        chunk_unit = ?config.chunk_unit,
        idle_session_secs = config.idle_session_secs,
        server_port = ?config.server_port,
        startup_credentials =
            config.gemini_api_key.is_some() && config.llama_cloud_api_key.is_some(),
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_unit_parses_common_spellings() {
        assert_eq!("tokens".parse::<ChunkUnit>(), Ok(ChunkUnit::Tokens));
        assert_eq!(" Chars ".parse::<ChunkUnit>(), Ok(ChunkUnit::Characters));
        assert!("words".parse::<ChunkUnit>().is_err());
    }

    #[test]
    fn defaults_match_pipeline_settings() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.llm_model, "models/gemini-1.5-flash");
        assert_eq!(config.embedding_dimension, 768);
        assert_eq!(config.idle_session_secs, 3_600);
        assert!(config.gemini_api_key.is_none());
    }
}
