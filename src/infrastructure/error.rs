use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Time conflict with entry {conflicting_id}")]
    Conflict { conflicting_id: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Summarizer error: {0}")]
    Summarizer(String),
}
