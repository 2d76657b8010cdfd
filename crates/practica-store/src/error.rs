use practica_core::error::EngineError;
use thiserror::Error;

/// Errors raised by the storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value could not be mapped back onto the model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("connection lock poisoned")]
    Poisoned,

    /// The blocking task running a query panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("session {0} is already completed")]
    AlreadyCompleted(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { kind, id } => EngineError::NotFound {
                kind: *kind,
                id: id.clone(),
            },
            StoreError::AlreadyCompleted(id) => EngineError::AlreadyCompleted(id.clone()),
            // Busy databases and I/O hiccups can clear up on their own.
            StoreError::Io(_) | StoreError::Sql(_) => EngineError::Storage(err.to_string()),
            StoreError::Json(_)
            | StoreError::Corrupt(_)
            | StoreError::Poisoned
            | StoreError::Task(_) => EngineError::Internal(err.to_string()),
        }
    }
}
