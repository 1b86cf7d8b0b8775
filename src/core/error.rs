//! Custom error types for Carelink
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Carelink operations
#[derive(Error, Debug)]
pub enum CarelinkError {
    /// Ollama connection or API errors
    #[error("Ollama error: {0}")]
    Ollama(String),

    /// Ollama server could not be reached at all
    #[error("Cannot reach Ollama at {0}. Start it with `ollama serve` and pull `{1}`")]
    OllamaNotReachable(String, String),

    /// Model not available
    #[error("Model '{0}' not available in Ollama. Run: ollama pull {0}")]
    ModelNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Patient store or reference file errors
    #[error("Data store error: {0}")]
    DataStore(String),

    /// External search errors
    #[error("Search error: {0}")]
    Search(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Carelink operations
pub type Result<T> = std::result::Result<T, CarelinkError>;

impl CarelinkError {
    /// Create an Ollama error
    pub fn ollama(msg: impl Into<String>) -> Self {
        Self::Ollama(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a data store error
    pub fn data(msg: impl Into<String>) -> Self {
        Self::DataStore(msg.into())
    }

    /// Create a search error
    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CarelinkError::ModelNotFound("llama3.1:8b".to_string());
        assert!(err.to_string().contains("ollama pull llama3.1:8b"));

        let err = CarelinkError::data("patient_data.json is not an object");
        assert_eq!(
            err.to_string(),
            "Data store error: patient_data.json is not an object"
        );
    }

    #[test]
    fn test_json_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: CarelinkError = parse.unwrap_err().into();
        assert!(matches!(err, CarelinkError::Json(_)));
    }
}
