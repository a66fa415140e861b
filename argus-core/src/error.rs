use thiserror::Error;

pub type ArgusResult<T> = Result<T, ArgusError>;

#[derive(Error, Debug)]
pub enum ArgusError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Cycle-mirror divergence. Healed in place by the workflow engine and
    /// logged; only returned when healing itself is impossible.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Concurrent update conflict on '{id}' after {attempts} attempts")]
    Conflict { id: String, attempts: u32 },

    #[error("External service error: {0}")]
    External(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ArgusError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }
}
