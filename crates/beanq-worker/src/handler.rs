use async_trait::async_trait;
use beanq_core::JobArgs;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::WorkerConfig;

/// Result type for job handlers
pub type HandlerResult = anyhow::Result<()>;

/// Trait for job handlers
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the job with its positional arguments
    async fn perform(&self, args: JobArgs) -> HandlerResult;

    /// Queue jobs of this class go to when enqueued without an explicit queue
    fn queue(&self) -> Option<&str> {
        None
    }

    /// Priority used when enqueued without one
    fn priority(&self) -> Option<u32> {
        None
    }

    /// TTR in seconds used when enqueued without one
    fn respond_timeout(&self) -> Option<u32> {
        None
    }
}

/// Registry of job handlers by class name.
///
/// Cloning is cheap and clones share the same registrations.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn JobHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a handler for a job class
    pub fn register<H: JobHandler + 'static>(&self, class: impl Into<String>, handler: H) {
        let mut handlers = self.handlers.write();
        handlers.insert(class.into(), Arc::new(handler));
    }

    /// Get the handler for a job class
    pub fn get(&self, class: &str) -> Option<Arc<dyn JobHandler>> {
        let handlers = self.handlers.read();
        handlers.get(class).cloned()
    }

    /// Get all registered class names
    pub fn class_names(&self) -> Vec<String> {
        let handlers = self.handlers.read();
        let mut names: Vec<String> = handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Namespaced tube for every registered class: its own queue if it
    /// declares one, otherwise the class name
    pub fn queue_names(&self, config: &WorkerConfig) -> Vec<String> {
        let handlers = self.handlers.read();
        let mut tubes: Vec<String> = handlers
            .iter()
            .map(|(class, handler)| config.expand_tube_name(handler.queue().unwrap_or(class.as_str())))
            .collect();
        tubes.sort();
        tubes.dedup();
        tubes
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler backed by an async closure, see [`handler_fn`]
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`JobHandler`]
///
/// ```ignore
/// registry.register("SendEmail", handler_fn(|args| async move {
///     println!("mailing {:?}", args);
///     Ok(())
/// }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(JobArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn perform(&self, args: JobArgs) -> HandlerResult {
        (self.f)(args).await
    }
}

/// Example handler that logs its arguments
pub struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    async fn perform(&self, args: JobArgs) -> HandlerResult {
        tracing::info!("echo: {}", serde_json::Value::Array(args));
        Ok(())
    }
}

/// Example handler that simulates work by sleeping for `args[0]` seconds
/// (or its configured default)
pub struct SleepHandler {
    default_secs: u64,
}

impl SleepHandler {
    pub fn new(default_secs: u64) -> Self {
        SleepHandler { default_secs }
    }
}

#[async_trait]
impl JobHandler for SleepHandler {
    async fn perform(&self, args: JobArgs) -> HandlerResult {
        let secs = match args.first() {
            Some(value) => value
                .as_f64()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| anyhow::anyhow!("sleep expects a number of seconds, got {}", value))?,
            None => self.default_secs as f64,
        };

        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        Ok(())
    }

    fn queue(&self) -> Option<&str> {
        Some("sleepers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Mailer;

    #[async_trait]
    impl JobHandler for Mailer {
        async fn perform(&self, _args: JobArgs) -> HandlerResult {
            Ok(())
        }

        fn queue(&self) -> Option<&str> {
            Some("mailer")
        }
    }

    #[tokio::test]
    async fn test_registry() {
        let registry = HandlerRegistry::new();
        registry.register("Echo", EchoHandler);

        assert!(registry.get("Unknown").is_none());

        let handler = registry.get("Echo").unwrap();
        handler.perform(vec![json!("hi")]).await.unwrap();
    }

    #[test]
    fn test_queue_names() {
        let registry = HandlerRegistry::new();
        registry.register("SendEmail", handler_fn(|_| async { Ok(()) }));
        registry.register("Newsletter", Mailer);
        registry.register("Digest", Mailer);

        let config = WorkerConfig {
            tube_namespace: "app".to_string(),
            ..Default::default()
        };
        assert_eq!(registry.queue_names(&config), vec!["app.mailer", "app.send-email"]);
        assert_eq!(registry.class_names(), vec!["Digest", "Newsletter", "SendEmail"]);
    }

    #[tokio::test]
    async fn test_handler_fn_receives_args() {
        let handler = handler_fn(|args: JobArgs| async move {
            anyhow::ensure!(args == vec![json!(1), json!("two")], "unexpected args {:?}", args);
            Ok(())
        });

        handler.perform(vec![json!(1), json!("two")]).await.unwrap();
        assert!(handler.perform(vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_sleep_handler_rejects_bad_args() {
        let handler = SleepHandler::new(0);
        assert!(handler.perform(vec![json!("soon")]).await.is_err());
        handler.perform(vec![json!(0.01)]).await.unwrap();
        handler.perform(vec![]).await.unwrap();
    }
}
