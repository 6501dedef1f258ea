use beanq_client::{BeanstalkConnection, Connection, TubeMap};
use beanq_worker::{EnqueueOptions, Enqueuer, HandlerRegistry, WorkerConfig};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bq-admin")]
#[command(about = "beanstalkd job queue admin CLI", long_about = None)]
struct Args {
    /// Server URL
    #[arg(short, long, default_value = "beanstalk://127.0.0.1:11300")]
    url: String,

    /// Tube namespace
    #[arg(short, long)]
    namespace: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Put a job on its queue
    Enqueue {
        /// Job class
        #[arg(short, long)]
        class: String,

        /// Arguments as a JSON array
        #[arg(short, long, default_value = "[]")]
        args: String,

        /// Queue (defaults to the class name)
        #[arg(short, long)]
        queue: Option<String>,

        /// Priority as a number or a label (high, medium, low)
        #[arg(short = 'P', long)]
        priority: Option<String>,

        /// Seconds before the job becomes ready
        #[arg(short, long)]
        delay: Option<i64>,

        /// Seconds a worker has to finish the job
        #[arg(short, long)]
        ttr: Option<u32>,
    },

    /// List every tube on the server
    Tubes,

    /// List tubes watched by this connection
    Watched,

    /// Move buried jobs on a queue back to ready
    Kick {
        #[arg(short, long)]
        queue: String,

        /// Maximum number of jobs to kick
        #[arg(short, long, default_value = "100")]
        bound: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = WorkerConfig {
        beanstalk_url: args.url.clone(),
        ..Default::default()
    };
    if let Some(namespace) = &args.namespace {
        config.tube_namespace = namespace.clone();
    }

    let mut connection = BeanstalkConnection::connect(&config.beanstalk_url).await?;

    match args.command {
        Commands::Enqueue {
            class,
            args: job_args,
            queue,
            priority,
            delay,
            ttr,
        } => {
            let job_args: Vec<serde_json::Value> = serde_json::from_str(&job_args)?;
            let tube = config.expand_tube_name(queue.as_deref().unwrap_or(&class));

            let mut options = EnqueueOptions::new();
            if let Some(priority) = priority {
                options = match priority.parse::<u32>() {
                    Ok(value) => options.priority(value),
                    Err(_) => options.priority_label(priority),
                };
            }
            if let Some(delay) = delay {
                options = options.delay(delay);
            }
            if let Some(ttr) = ttr {
                options = options.ttr(ttr);
            }
            if let Some(queue) = queue {
                options = options.queue(queue);
            }

            let mut enqueuer = Enqueuer::new(config, connection, HandlerRegistry::new());
            let id = enqueuer.enqueue(&class, job_args, options).await?;

            match args.format.as_str() {
                "json" => println!("{}", serde_json::json!({ "id": id, "class": class, "tube": tube })),
                _ => {
                    let mut table = Table::new();
                    table.load_preset(UTF8_FULL);
                    table.set_header(vec!["Field", "Value"]);
                    table.add_row(vec!["Job ID", &id.to_string()]);
                    table.add_row(vec!["Class", &class]);
                    table.add_row(vec!["Tube", &tube]);
                    println!("{table}");
                }
            }
        }

        Commands::Tubes => {
            let tubes = connection.list_tubes().await?;
            println!("{}", render_tubes(&tubes, &args.format)?);
        }

        Commands::Watched => {
            let tubes = connection.list_tubes_watched().await?;
            println!("{}", render_tubes(&tubes, &args.format)?);
        }

        Commands::Kick { queue, bound } => {
            let tube = config.expand_tube_name(&queue);
            connection.use_tube(&tube).await?;
            let kicked = connection.kick(bound).await?;

            match args.format.as_str() {
                "json" => println!("{}", serde_json::json!({ "tube": tube, "kicked": kicked })),
                _ => println!("Kicked {} job(s) on {}", kicked, tube),
            }
        }
    }

    Ok(())
}

fn render_tubes(tubes: &TubeMap, format: &str) -> anyhow::Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(tubes)?),
        _ => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Server", "Tube"]);
            for (server, names) in tubes {
                for name in names {
                    table.add_row(vec![server.as_str(), name.as_str()]);
                }
            }
            Ok(table.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tubes() -> TubeMap {
        TubeMap::from([(
            "127.0.0.1:11300".to_string(),
            vec!["default".to_string(), "app.mailer".to_string()],
        )])
    }

    #[test]
    fn test_render_tubes_json() {
        let rendered = render_tubes(&tubes(), "json").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({ "127.0.0.1:11300": ["default", "app.mailer"] })
        );
    }

    #[test]
    fn test_render_tubes_table() {
        let rendered = render_tubes(&tubes(), "table").unwrap();
        assert!(rendered.contains("Server"));
        assert!(rendered.contains("app.mailer"));
        assert!(rendered.contains("127.0.0.1:11300"));
    }
}
