use beanq_client::ClientError;
use beanq_core::CoreError;
use std::fmt;
use thiserror::Error;

/// Why a reserved job was buried instead of deleted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("No handler registered for job class {0}")]
    HandlerNotFound(String),

    #[error("{class} hit {seconds}s timeout")]
    Timeout { class: String, seconds: u64 },

    #[error("{class} failed: {message}")]
    Handler { class: String, message: String },

    #[error("{class} panicked: {message}")]
    Panicked { class: String, message: String },
}

/// Coarse classification of a [`JobError`], for logging and error policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobErrorKind {
    InvalidPayload,
    HandlerNotFound,
    Timeout,
    Application,
}

impl JobError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            JobError::InvalidPayload(_) => JobErrorKind::InvalidPayload,
            JobError::HandlerNotFound(_) => JobErrorKind::HandlerNotFound,
            JobError::Timeout { .. } => JobErrorKind::Timeout,
            JobError::Handler { .. } | JobError::Panicked { .. } => JobErrorKind::Application,
        }
    }
}

impl JobErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobErrorKind::InvalidPayload => "invalid_payload",
            JobErrorKind::HandlerNotFound => "handler_not_found",
            JobErrorKind::Timeout => "timeout",
            JobErrorKind::Application => "application",
        }
    }
}

impl fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that stop a worker iteration without a job outcome
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The queue connection is gone; the reserved job's state is unknown
    #[error("Queue connection lost: {0}")]
    ConnectionLost(#[source] ClientError),

    #[error("Queue error: {0}")]
    Queue(#[source] ClientError),
}

impl WorkerError {
    /// Fatal errors end the worker loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::ConnectionLost(_))
    }

    /// Process exit status for a worker stopped by this error
    pub fn exit_code(&self) -> u8 {
        match self {
            WorkerError::ConnectionLost(_) => 2,
            WorkerError::Queue(_) => 1,
        }
    }
}

impl From<ClientError> for WorkerError {
    fn from(err: ClientError) -> Self {
        if err.is_connection_lost() {
            WorkerError::ConnectionLost(err)
        } else {
            WorkerError::Queue(err)
        }
    }
}

#[derive(Error, Debug)]
pub enum EnqueueError {
    #[error(transparent)]
    Job(#[from] CoreError),

    #[error("Unknown priority label: {0}")]
    UnknownPriorityLabel(String),

    #[error("Queue connection error: {0}")]
    Connection(#[from] ClientError),
}

impl EnqueueError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, EnqueueError::Connection(e) if e.is_connection_lost())
    }
}
