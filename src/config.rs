//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default Groq-hosted model used for extraction and chat.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";


/// Service configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port for the HTTP server.
    pub port: u16,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding `index.html`, `admin.html` and `products.html`.
    pub static_dir: PathBuf,
    /// Seed sample customers and products into an empty database.
    pub seed_sample_data: bool,
    /// When set, logs are also written to a daily rolling file here.
    pub log_dir: Option<PathBuf>,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Build the configuration from `ORDER_ASSIST_*` variables and `GROQ_API_KEY`.
    ///
    /// The key variable is read whichever backend is selected.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GROQ_API_KEY".to_string()))?;

        let port = match std::env::var("ORDER_ASSIST_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "ORDER_ASSIST_PORT".to_string(),
                message: e.to_string(),
            })?,
            Err(_) => 8000,
        };

        let db_path = std::env::var("ORDER_ASSIST_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/product.db"));

        let static_dir = std::env::var("ORDER_ASSIST_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./static"));

        let seed_sample_data = std::env::var("ORDER_ASSIST_SEED")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        let log_dir = std::env::var("ORDER_ASSIST_LOG_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let model =
            std::env::var("ORDER_ASSIST_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let backend = match std::env::var("ORDER_ASSIST_LLM_BACKEND") {
            Ok(raw) => raw
                .parse::<LlmBackend>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "ORDER_ASSIST_LLM_BACKEND".to_string(),
                    message,
                })?,
            Err(_) => LlmBackend::Groq,
        };

        Ok(Self {
            port,
            db_path,
            static_dir,
            seed_sample_data,
            log_dir,
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
            },
        })
    }
}

fn parse_bool(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
