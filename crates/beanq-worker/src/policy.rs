use crate::error::JobError;
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

type ErrorOnlyFn = dyn Fn(&JobError) + Send + Sync;
type WithJobFn = dyn Fn(&JobError, &str, &[Value]) + Send + Sync;

/// Callback run after a job has been buried.
///
/// Notification only: the policy never sees the reservation, so anything it
/// wants retried has to be enqueued again. Jobs whose payload could not be
/// decoded are reported with an empty class and no arguments.
#[derive(Clone)]
pub enum ErrorPolicy {
    /// Called with the error alone
    ErrorOnly(Arc<ErrorOnlyFn>),
    /// Called with the error, the job class and its arguments
    WithJob(Arc<WithJobFn>),
}

impl ErrorPolicy {
    pub fn error_only<F>(f: F) -> Self
    where
        F: Fn(&JobError) + Send + Sync + 'static,
    {
        ErrorPolicy::ErrorOnly(Arc::new(f))
    }

    pub fn with_job<F>(f: F) -> Self
    where
        F: Fn(&JobError, &str, &[Value]) + Send + Sync + 'static,
    {
        ErrorPolicy::WithJob(Arc::new(f))
    }

    /// Run the callback. A panicking callback is logged and swallowed.
    pub fn notify(&self, error: &JobError, class: &str, args: &[Value]) {
        let outcome = catch_unwind(AssertUnwindSafe(|| match self {
            ErrorPolicy::ErrorOnly(f) => f(error),
            ErrorPolicy::WithJob(f) => f(error, class, args),
        }));

        if outcome.is_err() {
            error!(class = %class, "Error policy panicked while handling: {}", error);
        }
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::ErrorOnly(_) => f.write_str("ErrorPolicy::ErrorOnly"),
            ErrorPolicy::WithJob(_) => f.write_str("ErrorPolicy::WithJob"),
        }
    }
}
