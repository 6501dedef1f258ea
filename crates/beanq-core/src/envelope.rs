use crate::{CoreError, Result, MAX_JOB_SIZE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Positional arguments handed to a job's handler.
pub type JobArgs = Vec<Value>;

/// The body of every job put on a tube: the handler's class name and its
/// positional arguments.
///
/// Serialized as `{"class":"SendEmail","args":["a@b.com"]}`, with `class`
/// always first. Whether `class` resolves to a handler is only checked by the
/// worker that eventually reserves the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Handler class name (e.g., "SendEmail", "Reports::Nightly")
    pub class: String,

    /// Arguments in call order
    #[serde(default)]
    pub args: JobArgs,
}

impl JobEnvelope {
    /// Create a new envelope
    pub fn new(class: impl Into<String>, args: JobArgs) -> Result<Self> {
        let class = class.into();
        if class.trim().is_empty() {
            return Err(CoreError::EmptyClass);
        }

        Ok(JobEnvelope { class, args })
    }

    /// Serialize to the JSON wire body
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > MAX_JOB_SIZE {
            return Err(CoreError::JobTooLarge {
                max: MAX_JOB_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    /// Deserialize from a reserved job's body
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: JobEnvelope = serde_json::from_slice(bytes)?;
        if envelope.class.trim().is_empty() {
            return Err(CoreError::EmptyClass);
        }
        Ok(envelope)
    }
}
