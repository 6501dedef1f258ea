use crate::error::JobError;
use crate::handler::JobHandler;
use beanq_core::JobArgs;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// How long a handler may run for a job with the given TTR.
///
/// One second is kept back so the job can be buried before the server
/// releases it. A TTR of 0 or 1 leaves no room for that and runs unbounded.
pub fn deadline_for(ttr: u32) -> Option<Duration> {
    if ttr > 1 {
        Some(Duration::from_secs(u64::from(ttr) - 1))
    } else {
        None
    }
}

/// How long a timed-out handler gets to notice cancellation before it is
/// reported as still running
const CANCEL_GRACE: Duration = Duration::from_millis(50);

/// Job executor with timeout and panic recovery
pub struct JobExecutor {
    handler: Arc<dyn JobHandler>,
}

impl JobExecutor {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        JobExecutor { handler }
    }

    /// Run the handler on a blocking-pool thread, bounded by `deadline`.
    ///
    /// The handler future is driven there with `Handle::block_on`, so a
    /// handler that blocks its thread cannot hold up the deadline. When the
    /// deadline passes, or the caller stops waiting, the handler is cancelled
    /// at its next await point; one that never yields keeps its thread until
    /// it returns and its result is discarded. A handler that finishes after
    /// the deadline is still a timeout.
    pub async fn execute(
        &self,
        class: &str,
        args: JobArgs,
        deadline: Option<Duration>,
    ) -> Result<(), JobError> {
        let handler = self.handler.clone();
        let runtime = Handle::current();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let started = Instant::now();
        let mut task = tokio::task::spawn_blocking(move || {
            runtime.block_on(async move {
                tokio::select! {
                    result = handler.perform(args) => Some(result),
                    _ = cancel_rx => None,
                }
            })
        });

        let joined = match deadline {
            Some(limit) => match timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    drop(cancel_tx);
                    error!("{} timed out after {:?}", class, limit);
                    if timeout(CANCEL_GRACE, &mut task).await.is_err() {
                        warn!("{} is blocking its thread; leaving it to finish detached", class);
                    }
                    return Err(timeout_error(class, limit));
                }
            },
            None => {
                let joined = (&mut task).await;
                drop(cancel_tx);
                joined
            }
        };

        if let Some(limit) = deadline {
            if started.elapsed() >= limit {
                error!("{} returned after its {:?} deadline", class, limit);
                return Err(timeout_error(class, limit));
            }
        }

        match joined {
            Ok(Some(Ok(()))) => {
                debug!("{} returned successfully", class);
                Ok(())
            }
            Ok(Some(Err(e))) => Err(JobError::Handler {
                class: class.to_string(),
                message: format!("{:#}", e),
            }),
            Ok(None) => Err(JobError::Handler {
                class: class.to_string(),
                message: "job was cancelled".to_string(),
            }),
            Err(e) if e.is_panic() => Err(JobError::Panicked {
                class: class.to_string(),
                message: panic_message(e.into_panic()),
            }),
            Err(_) => Err(JobError::Handler {
                class: class.to_string(),
                message: "job task was cancelled".to_string(),
            }),
        }
    }
}

fn timeout_error(class: &str, limit: Duration) -> JobError {
    JobError::Timeout {
        class: class.to_string(),
        seconds: limit.as_secs(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, EchoHandler, SleepHandler};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_deadline_for() {
        assert_eq!(deadline_for(120), Some(Duration::from_secs(119)));
        assert_eq!(deadline_for(2), Some(Duration::from_secs(1)));
        assert_eq!(deadline_for(1), None);
        assert_eq!(deadline_for(0), None);
    }

    #[tokio::test]
    async fn test_executor_success() {
        let executor = JobExecutor::new(Arc::new(EchoHandler));
        executor
            .execute("Echo", vec![json!("test data")], deadline_for(120))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_executor_timeout() {
        let executor = JobExecutor::new(Arc::new(SleepHandler::new(5)));

        let started = Instant::now();
        let result = executor.execute("Sleep", vec![], deadline_for(2)).await;

        assert_eq!(
            result,
            Err(JobError::Timeout {
                class: "Sleep".to_string(),
                seconds: 1,
            })
        );
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_executor_times_out_blocking_handler() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let executor = JobExecutor::new(Arc::new(handler_fn(move |_| {
            let flag = flag.clone();
            async move {
                std::thread::sleep(Duration::from_secs(3));
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        })));

        let started = Instant::now();
        let result = executor.execute("Block", vec![], deadline_for(2)).await;

        assert!(matches!(result, Err(JobError::Timeout { seconds: 1, .. })));
        assert!(started.elapsed() < Duration::from_millis(2500));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_executor_cancels_on_drop() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let executor = JobExecutor::new(Arc::new(handler_fn(move |_| {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        })));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), executor.execute("Slow", vec![], None)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_executor_handler_error() {
        let executor = JobExecutor::new(Arc::new(handler_fn(|_| async {
            Err(anyhow::anyhow!("smtp refused"))
        })));

        match executor.execute("SendEmail", vec![], None).await {
            Err(JobError::Handler { class, message }) => {
                assert_eq!(class, "SendEmail");
                assert!(message.contains("smtp refused"));
            }
            other => panic!("Expected handler error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_executor_panic_recovery() {
        let executor = JobExecutor::new(Arc::new(handler_fn(|args| async move {
            if args.is_empty() {
                panic!("no recipients");
            }
            Ok(())
        })));

        match executor.execute("SendEmail", vec![], None).await {
            Err(JobError::Panicked { message, .. }) => assert_eq!(message, "no recipients"),
            other => panic!("Expected panic error, got {:?}", other),
        }
    }
}
