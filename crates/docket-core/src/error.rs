use thiserror::Error;
use uuid::Uuid;

/// Recoverable failures of the task model. None of these are fatal; the
/// caller reports them and keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("{0}")]
    InvalidTaskInput(String),

    #[error("task {index} has an unreadable date: {raw:?}")]
    InvalidDateOnRecord { index: usize, raw: String },

    #[error("no task at index {index} (store holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
}

impl TrackerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTaskInput(_) => "INVALID_TASK_INPUT",
            Self::InvalidDateOnRecord { .. } => "INVALID_DATE_ON_RECORD",
            Self::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidTaskInput(message.into())
    }
}
