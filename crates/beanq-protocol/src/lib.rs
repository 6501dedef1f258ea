mod message;
mod codec;

pub use message::{parse_tube_list, Command, JobStats, Response};
pub use codec::BeanstalkCodec;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed response line: {0}")]
    MalformedResponse(String),

    #[error("Response line too long: {0} bytes")]
    LineTooLong(usize),

    #[error("Body too large: {0} bytes")]
    BodyTooLarge(usize),

    #[error("Invalid tube name: {0:?}")]
    InvalidTubeName(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Longest control line beanstalkd sends or accepts (name limit plus command)
pub const MAX_LINE_LENGTH: usize = 224;

/// Longest tube name beanstalkd accepts
pub const MAX_TUBE_NAME_LENGTH: usize = 200;

/// Upper bound on any response body (job bodies, YAML listings)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Default beanstalkd port
pub const DEFAULT_PORT: u16 = 11300;
