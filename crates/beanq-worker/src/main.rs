use beanq_client::BeanstalkConnection;
use beanq_worker::handler::{EchoHandler, SleepHandler};
use beanq_worker::{ErrorPolicy, HandlerRegistry, Worker, WorkerConfig};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bq-worker")]
#[command(about = "beanstalkd job worker", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,

    /// Server URL, e.g. beanstalk://127.0.0.1:11300
    #[arg(short, long)]
    url: Option<String>,

    /// Tube namespace
    #[arg(short, long)]
    namespace: Option<String>,

    /// Queue to watch (repeatable); defaults to the configured or discovered queues
    #[arg(short, long = "queue")]
    queues: Vec<String>,

    /// Worker ID (auto-generated if not provided)
    #[arg(long)]
    worker_id: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => WorkerConfig::from_file(path)?,
        None => WorkerConfig::default(),
    };

    if let Some(url) = args.url {
        config.beanstalk_url = url;
    }
    if let Some(namespace) = args.namespace {
        config.tube_namespace = namespace;
    }
    if let Some(worker_id) = args.worker_id {
        config.worker_id = Some(worker_id);
    }

    let config = config.with_error_policy(ErrorPolicy::with_job(|error, class, job_args| {
        error!(kind = %error.kind(), "{} {:?} failed: {}", class, job_args, error);
    }));

    let registry = HandlerRegistry::new();
    registry.register("Echo", EchoHandler);
    registry.register("Sleep", SleepHandler::new(1));

    info!("Registered job classes: {:?}", registry.class_names());

    let connection = BeanstalkConnection::connect(&config.beanstalk_url).await?;
    info!("Connected to beanstalkd at {}", config.beanstalk_url);

    let mut worker = Worker::new(config, connection, registry).with_queues(args.queues);
    info!("Starting worker {}", worker.id());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
    };

    match worker.run_until(shutdown).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("Worker {} exiting: {}", worker.id(), e);
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
