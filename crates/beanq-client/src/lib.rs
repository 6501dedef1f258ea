mod connection;
mod beanstalk;

pub use connection::{Connection, ReservedJob, TubeMap};
pub use beanstalk::{parse_address, BeanstalkConnection};

use beanq_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid beanstalk URL: {0}")]
    InvalidUrl(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Unexpected response to {command}: {response}")]
    UnexpectedResponse {
        command: &'static str,
        response: &'static str,
    },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Job {0} not found")]
    JobNotFound(u64),
}

impl ClientError {
    /// Whether the connection itself is gone, as opposed to one command failing
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, ClientError::ConnectionLost(_))
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::IoError(e) => ClientError::ConnectionLost(e.to_string()),
            other => ClientError::ProtocolError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
