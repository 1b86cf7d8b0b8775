//! Configuration management for Carelink
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/carelink/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{CarelinkError, Result};

/// Main configuration for Carelink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Agent and workflow configuration
    pub agent: AgentConfig,
    /// Patient data and reference material
    #[serde(default)]
    pub data: DataConfig,
    /// External search configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used by both role agents, must support tool calling
    /// Default: llama3.1:8b
    pub chat: String,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum node invocations per user turn
    /// Default: 10
    pub max_steps: usize,
    /// Maximum model calls a role agent may make while using tools
    /// Default: 5
    pub max_tool_rounds: usize,
    /// Sampling temperature for both agents
    pub temperature: f32,
    /// Replies longer than this many characters end the turn
    /// Default: 15
    pub completion_threshold: usize,
    /// Whether to show debug output
    pub debug: bool,
}

/// Patient data and reference material locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSON file mapping full patient names to discharge records
    pub patient_data: PathBuf,
    /// Plain-text clinical reference used for retrieval
    pub reference_file: PathBuf,
    /// Reference chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
    /// Number of passages returned per reference query
    pub top_k: usize,
    /// Each passage is cut to this many characters before reaching the model
    pub max_passage_chars: usize,
}

/// External web search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Whether the clinical agent may search the web
    pub enabled: bool,
    /// Instant-answer endpoint
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum number of result snippets kept
    pub max_results: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file, truncated at startup. `None` logs to the console only.
    pub file: Option<PathBuf>,
    /// Default filter when RUST_LOG is not set
    pub filter: String,
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| v == "true" || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env_parse("OLLAMA_PORT").unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            chat: env::var("CARELINK_MODEL").unwrap_or_else(|_| "llama3.1:8b".to_string()),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: env_parse("CARELINK_MAX_STEPS").unwrap_or(10),
            max_tool_rounds: 5,
            temperature: 0.0,
            completion_threshold: 15,
            debug: env_flag("CARELINK_DEBUG").unwrap_or(false),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            patient_data: env::var("CARELINK_PATIENT_DATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("patient_data.json")),
            reference_file: env::var("CARELINK_REFERENCE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("nephrology_reference.txt")),
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 3,
            max_passage_chars: 2000,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: env_flag("CARELINK_SEARCH_ENABLED").unwrap_or(true),
            endpoint: "https://api.duckduckgo.com/".to_string(),
            timeout_secs: 15,
            max_results: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Some(
                env::var("CARELINK_LOG_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("system_logs.log")),
            ),
            filter: "carelink=info".to_string(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("carelink")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_path(&Self::config_file()) {
            return config;
        }

        Self::default()
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Err(CarelinkError::config("Config file not found"));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| CarelinkError::config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| CarelinkError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to the default config file and return its path
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                CarelinkError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CarelinkError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| CarelinkError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Render the current configuration as TOML for display
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|_| String::from("# Error generating config"))
    }

    /// Default configuration as TOML, a starting point for the config file
    pub fn default_config_toml() -> String {
        Self::default().to_toml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama.timeout_secs, 120);
        assert_eq!(config.agent.max_tool_rounds, 5);
        assert_eq!(config.agent.completion_threshold, 15);
        assert_eq!(config.data.chunk_size, 1000);
        assert_eq!(config.data.chunk_overlap, 100);
        assert_eq!(config.data.top_k, 3);
        assert_eq!(config.data.max_passage_chars, 2000);
    }

    #[test]
    fn test_ollama_url() {
        let mut config = Config::default();
        config.ollama.host = "localhost".to_string();
        config.ollama.port = 11434;
        assert_eq!(config.ollama_url(), "http://localhost:11434");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = config.to_toml();
        assert!(toml_str.contains("max_steps"));
        assert!(toml_str.contains("patient_data"));
        assert!(toml_str.contains("completion_threshold"));
    }

    #[test]
    fn test_load_from_path_fills_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[ollama]
host = "gpu-box"
port = 9999
timeout_secs = 30

[models]
chat = "qwen2.5:7b"

[agent]
max_steps = 4
max_tool_rounds = 2
temperature = 0.2
completion_threshold = 20
debug = false
"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.ollama_url(), "http://gpu-box:9999");
        assert_eq!(config.models.chat, "qwen2.5:7b");
        assert_eq!(config.agent.max_steps, 4);
        assert_eq!(config.data.top_k, 3);
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load_from_path(std::path::Path::new("/nonexistent/carelink.toml"))
            .unwrap_err();
        assert!(matches!(err, CarelinkError::Config(_)));
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("carelink"));
    }
}
