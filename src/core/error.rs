use thiserror::Error;

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Document engine error: {0}")]
    EngineError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DraftError>;
