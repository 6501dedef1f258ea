mod envelope;
mod priority;
mod tube;
mod error;

pub use envelope::{JobArgs, JobEnvelope};
pub use priority::Priority;
pub use tube::{dasherize, expand_tube_name, DEFAULT_TUBE_NAMESPACE};
pub use error::{CoreError, Result};

/// Largest job body beanstalkd accepts with its default `-z` setting.
pub const MAX_JOB_SIZE: usize = 65_535;
