use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Job body exceeds maximum allowed size of {max} bytes (got {actual})")]
    JobTooLarge { max: usize, actual: usize },

    #[error("Job class name must not be empty")]
    EmptyClass,

    #[error("Invalid job payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
