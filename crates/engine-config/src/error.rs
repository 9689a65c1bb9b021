use thiserror::Error;

/// Invalid or missing settings. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read the configuration file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse the configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
