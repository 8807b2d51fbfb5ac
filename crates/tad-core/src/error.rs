use thiserror::Error;

#[derive(Debug, Error)]
pub enum CreateRunError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type CreateRunResult<T> = Result<T, CreateRunError>;
