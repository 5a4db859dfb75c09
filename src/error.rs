use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubmuxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Video probe failed: {0}")]
    Probe(String),

    #[error("Subtitle error: {0}")]
    Subtitle(String),

    #[error("Audio separation error: {0}")]
    Separation(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("{0} timed out after {1:?}")]
    Timeout(String, std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, DubmuxError>;
