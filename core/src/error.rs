use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single remote check.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("request to checker failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("checker answered with HTTP {0}")]
    Status(u16),
    #[error("checker response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("check was superseded")]
    Cancelled,
}

impl CheckError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CheckError::Cancelled)
    }
}

/// Failure to load or compile settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse YAML {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid exclude glob `{pattern}`: {source}")]
    Glob {
        pattern: String,
        source: globset::Error,
    },
}
