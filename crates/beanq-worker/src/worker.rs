use crate::config::WorkerConfig;
use crate::enqueue::{enqueue_with, EnqueueOptions};
use crate::error::{EnqueueError, JobError, JobErrorKind, WorkerError};
use crate::executor::{deadline_for, JobExecutor};
use crate::handler::HandlerRegistry;
use beanq_client::{Connection, ReservedJob};
use beanq_core::{JobArgs, JobEnvelope};

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How a reserved job left the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        id: u64,
        class: String,
        elapsed: Duration,
    },
    Buried {
        id: u64,
        class: String,
        kind: JobErrorKind,
    },
}

impl JobOutcome {
    pub fn id(&self) -> u64 {
        match self {
            JobOutcome::Completed { id, .. } | JobOutcome::Buried { id, .. } => *id,
        }
    }
}

/// Reserves jobs from its watched tubes and runs them one at a time
pub struct Worker<C: Connection> {
    config: Arc<WorkerConfig>,
    worker_id: String,
    connection: C,
    registry: HandlerRegistry,
    requested_queues: Vec<String>,
    tube_names: Vec<String>,
}

impl<C: Connection> Worker<C> {
    pub fn new(config: WorkerConfig, connection: C, registry: HandlerRegistry) -> Self {
        let worker_id = config.generate_worker_id();

        Worker {
            config: Arc::new(config),
            worker_id,
            connection,
            registry,
            requested_queues: Vec::new(),
            tube_names: Vec::new(),
        }
    }

    /// Watch exactly these queues instead of the configured or discovered ones
    pub fn with_queues<I, S>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_queues = queues.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.worker_id
    }

    /// Tubes being watched, as settled by the last [`Worker::prepare`]
    pub fn tube_names(&self) -> &[String] {
        &self.tube_names
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Enqueue a job over this worker's connection
    pub async fn enqueue(
        &mut self,
        class: &str,
        args: JobArgs,
        options: EnqueueOptions,
    ) -> Result<u64, EnqueueError> {
        enqueue_with(&mut self.connection, &self.config, &self.registry, class, args, options).await
    }

    /// Settle the watch list.
    ///
    /// Queues come from `with_queues`, else the configured default queues,
    /// else every registered handler's queue plus every tube on the server
    /// under the namespace. Tubes watched from an earlier session that are
    /// not in the set are ignored.
    pub async fn prepare(&mut self) -> Result<(), WorkerError> {
        let candidates = if !self.requested_queues.is_empty() {
            self.requested_queues.clone()
        } else if !self.config.default_queues.is_empty() {
            self.config.default_queues.clone()
        } else {
            let mut names = self.registry.queue_names(&self.config);
            let namespace = self.config.tube_namespace.as_str();
            let visible = self.connection.list_tubes().await?;
            names.extend(
                visible
                    .into_values()
                    .flatten()
                    .filter(|tube| tube.starts_with(namespace)),
            );
            names
        };

        let mut tubes: Vec<String> = Vec::with_capacity(candidates.len());
        for name in &candidates {
            let tube = self.config.expand_tube_name(name);
            if !tubes.contains(&tube) {
                tubes.push(tube);
            }
        }

        for tube in &tubes {
            self.connection.watch(tube).await?;
        }

        let watched = self.connection.list_tubes_watched().await?;
        for (server, stale) in watched {
            for tube in stale.into_iter().filter(|t| !tubes.contains(t)) {
                if self.connection.ignore(&tube).await? {
                    debug!(tube = %tube, "Ignored stale tube on {}", server);
                } else {
                    warn!(tube = %tube, "{} refused to ignore its last watched tube", server);
                }
            }
        }

        info!(worker_id = %self.worker_id, "Working {} queues: [{}]", tubes.len(), tubes.join(", "));
        self.tube_names = tubes;
        Ok(())
    }

    /// Reserve one job and see it through to deletion or burial.
    ///
    /// Only queue errors come back as `Err`; anything that goes wrong with
    /// the job itself buries it and yields [`JobOutcome::Buried`].
    pub async fn work_one_job(&mut self) -> Result<JobOutcome, WorkerError> {
        let job = self.connection.reserve().await?;
        let id = job.id();

        let JobEnvelope { class, args } = match JobEnvelope::from_bytes(job.body()) {
            Ok(envelope) => envelope,
            Err(e) => {
                let error = JobError::InvalidPayload(e.to_string());
                return self.fail_job(job, String::new(), Vec::new(), error).await;
            }
        };

        let handler = match self.registry.get(&class) {
            Some(handler) => handler,
            None => {
                let error = JobError::HandlerNotFound(class.clone());
                return self.fail_job(job, class, args, error).await;
            }
        };

        info!(
            job_id = id,
            class = %class,
            "Working {} {}",
            class,
            serde_json::Value::Array(args.clone())
        );

        let started = Instant::now();
        let executor = JobExecutor::new(handler);
        if let Err(error) = executor.execute(&class, args.clone(), deadline_for(job.ttr())).await {
            return self.fail_job(job, class, args, error).await;
        }

        let held = job.held_for();
        match job.delete(&mut self.connection).await {
            Ok(()) => {}
            Err(e) if e.is_connection_lost() => return Err(WorkerError::ConnectionLost(e)),
            Err(e) => warn!(job_id = id, "Failed to delete completed job: {}", e),
        }

        let elapsed = started.elapsed();
        info!(
            job_id = id,
            class = %class,
            elapsed_ms = elapsed.as_millis() as u64,
            held_ms = held.as_millis() as u64,
            "Completed {} in {:.3}s",
            class,
            elapsed.as_secs_f64()
        );

        Ok(JobOutcome::Completed { id, class, elapsed })
    }

    /// Bury the job, then tell the error policy
    async fn fail_job(
        &mut self,
        job: ReservedJob,
        class: String,
        args: JobArgs,
        error: JobError,
    ) -> Result<JobOutcome, WorkerError> {
        let id = job.id();
        let kind = error.kind();
        let held_ms = job.held_for().as_millis() as u64;

        match job.bury(&mut self.connection).await {
            Ok(()) => error!(job_id = id, class = %class, kind = %kind, held_ms, "Buried job: {}", error),
            Err(e) if e.is_connection_lost() => return Err(WorkerError::ConnectionLost(e)),
            Err(e) => error!(job_id = id, class = %class, kind = %kind, "Could not bury job after {}: {}", error, e),
        }

        if let Some(policy) = &self.config.on_error {
            policy.notify(&error, &class, &args);
        }

        Ok(JobOutcome::Buried { id, class, kind })
    }

    /// Prepare, then work jobs until the connection is lost
    pub async fn start(&mut self) -> Result<(), WorkerError> {
        self.prepare().await?;

        loop {
            self.step().await?;
        }
    }

    /// Like [`Worker::start`], but returns `Ok(())` once `shutdown` resolves.
    ///
    /// A job still running at that point is abandoned without being deleted
    /// or buried; the server releases it when its TTR runs out.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), WorkerError>
    where
        F: Future<Output = ()>,
    {
        let worker_id = self.worker_id.clone();
        tokio::pin!(shutdown);

        tokio::select! {
            _ = &mut shutdown => {
                info!(worker_id = %worker_id, "Shutdown requested before start");
                return Ok(());
            }
            prepared = self.prepare() => prepared?,
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(worker_id = %worker_id, "Shutdown requested, stopping worker");
                    return Ok(());
                }
                stepped = self.step() => stepped?,
            }
        }
    }

    async fn step(&mut self) -> Result<(), WorkerError> {
        match self.work_one_job().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_fatal() => {
                error!(worker_id = %self.worker_id, "Stopping worker: {}", e);
                Err(e)
            }
            Err(e) => {
                warn!(worker_id = %self.worker_id, "{}; retrying in 1s", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            }
        }
    }
}
