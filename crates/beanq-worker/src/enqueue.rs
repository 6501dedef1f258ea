use crate::config::WorkerConfig;
use crate::error::EnqueueError;
use crate::handler::HandlerRegistry;
use beanq_client::Connection;
use beanq_core::{JobArgs, JobEnvelope, Priority};
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

/// Priority given either as a raw value or as a configured label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorityOption {
    Value(u32),
    Label(String),
}

/// Per-job overrides for [`Enqueuer::enqueue`]. Unset fields fall back to
/// the handler's own defaults, then to the configuration.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Option<PriorityOption>,
    /// Seconds before the job becomes ready; negative values mean now
    pub delay: Option<i64>,
    pub ttr: Option<u32>,
    pub queue: Option<String>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(PriorityOption::Value(priority));
        self
    }

    pub fn priority_label(mut self, label: impl Into<String>) -> Self {
        self.priority = Some(PriorityOption::Label(label.into()));
        self
    }

    pub fn delay(mut self, secs: i64) -> Self {
        self.delay = Some(secs);
        self
    }

    pub fn ttr(mut self, secs: u32) -> Self {
        self.ttr = Some(secs);
        self
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }
}

/// Puts jobs on their tubes
pub struct Enqueuer<C: Connection> {
    config: Arc<WorkerConfig>,
    registry: HandlerRegistry,
    connection: C,
}

impl<C: Connection> Enqueuer<C> {
    pub fn new(config: WorkerConfig, connection: C, registry: HandlerRegistry) -> Self {
        Enqueuer {
            config: Arc::new(config),
            registry,
            connection,
        }
    }

    /// Submit a job, returning the id the server assigned.
    ///
    /// The class is not required to have a registered handler.
    pub async fn enqueue(
        &mut self,
        class: &str,
        args: JobArgs,
        options: EnqueueOptions,
    ) -> Result<u64, EnqueueError> {
        enqueue_with(&mut self.connection, &self.config, &self.registry, class, args, options).await
    }
}

pub(crate) async fn enqueue_with<C: Connection + ?Sized>(
    connection: &mut C,
    config: &WorkerConfig,
    registry: &HandlerRegistry,
    class: &str,
    args: JobArgs,
    options: EnqueueOptions,
) -> Result<u64, EnqueueError> {
    let envelope = JobEnvelope::new(class, args)?;
    let handler = registry.get(&envelope.class);

    let priority = match options.priority {
        Some(PriorityOption::Value(value)) => value,
        Some(PriorityOption::Label(label)) => Priority::from_label(&label, &config.priority_labels)
            .ok_or(EnqueueError::UnknownPriorityLabel(label))?
            .value(),
        None => handler
            .as_ref()
            .and_then(|h| h.priority())
            .unwrap_or(config.default_priority),
    };

    let ttr = options
        .ttr
        .or_else(|| handler.as_ref().and_then(|h| h.respond_timeout()))
        .unwrap_or(config.respond_timeout);

    let delay = options.delay.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32;

    let queue = options
        .queue
        .or_else(|| handler.as_ref().and_then(|h| h.queue()).map(str::to_string))
        .unwrap_or_else(|| envelope.class.clone());
    let tube = config.expand_tube_name(&queue);

    let body = envelope.to_bytes()?;

    connection.use_tube(&tube).await?;
    let id = connection.put(Bytes::from(body), priority, delay, ttr).await?;

    info!(
        job_id = id,
        tube = %tube,
        "Enqueued {} (pri {}, delay {}s, ttr {}s)",
        envelope.class,
        priority,
        delay,
        ttr
    );

    Ok(id)
}
