//! jobq CLI: publish, inspect and consume queues.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jobq::config::{Config, WorkerSettings};
use jobq::telemetry::{TelemetryConfig, init_telemetry};
use jobq::{
    CommandHandler, CounterField, Error, Queue, RedisStore, Store, Worker, WorkerOptions,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "jobq", about = "Durable job queue on Redis lists")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a JSON payload as a new job
    Publish {
        /// Queue name
        queue: String,
        /// JSON payload
        payload: String,
    },
    /// Pop one job and print it
    Fetch {
        /// Queue name
        queue: String,
    },
    /// Show counters and list lengths
    Status {
        /// Queue name
        queue: String,
    },
    /// Run a worker that executes a command per job
    Serve {
        /// Queue name
        queue: String,
        /// Executable run for each job; the payload arrives on stdin
        #[arg(long)]
        exec: PathBuf,
        /// TOML file with a [worker] table
        #[arg(long)]
        config: Option<PathBuf>,
        /// Concurrent attempts (overrides the config file)
        #[arg(long)]
        parallel: Option<usize>,
        /// Retries before a job is dropped (overrides the config file)
        #[arg(long)]
        max_retry: Option<u32>,
        /// Keep dropped jobs in <queue>:dropped
        #[arg(long)]
        safe_drop: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "jobq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let store: Arc<dyn Store> = Arc::new(RedisStore::connect(&config.redis_url).await?);

    match cli.command {
        Command::Publish { queue, payload } => {
            cmd_publish(Queue::new(queue, store), &payload).await
        }
        Command::Fetch { queue } => cmd_fetch(Queue::new(queue, store)).await,
        Command::Status { queue } => cmd_status(Queue::new(queue, store)).await,
        Command::Serve {
            queue,
            exec,
            config,
            parallel,
            max_retry,
            safe_drop,
        } => {
            let mut options = match config {
                Some(path) => WorkerSettings::load(&path)?.apply(WorkerOptions::default()),
                None => WorkerOptions::default(),
            };
            if let Some(n) = parallel {
                options.parallel = n;
            }
            if let Some(n) = max_retry {
                options.max_retry = n;
            }
            if safe_drop {
                options.safe_drop = true;
            }
            cmd_serve(Queue::new(queue, store), exec, options).await
        }
    }
}

async fn cmd_publish(queue: Queue, payload: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    let id = queue.publish(&value).await?;
    println!("{id}");
    Ok(())
}

async fn cmd_fetch(queue: Queue) -> anyhow::Result<()> {
    let job = match queue.fetch().await {
        Ok(job) => job,
        Err(Error::EmptyQueue) => {
            println!("Queue {} is empty.", queue.name());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("ID:          {}", job.id);
    println!("Published:   {}", job.published_at);
    println!("Retry Count: {}", job.retry_count);
    match job.payload::<serde_json::Value>() {
        Ok(value) => println!("Payload:     {}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("Payload:     <{} bytes>", job.payload.len()),
    }
    Ok(())
}

async fn cmd_status(queue: Queue) -> anyhow::Result<()> {
    let status = queue.status().await?;
    let pending = queue.pending().await?;
    let dropped_list = queue.dropped_len().await?;

    println!("Queue:       {}", queue.name());
    println!("Running:     {}", status.is_running);
    println!("Pending:     {pending}");
    for field in CounterField::ALL {
        println!("  {:<11}{}", format!("{field}:"), status.get(field));
    }
    println!("Total:       {}", status.total);
    println!("Dropped List: {dropped_list}");
    Ok(())
}

async fn cmd_serve(queue: Queue, exec: PathBuf, options: WorkerOptions) -> anyhow::Result<()> {
    let name = queue.name().to_string();
    let handler = CommandHandler::new(&exec, name.clone())?;
    let options = options.reporter(move |status| {
        tracing::info!(queue = %name, %status, "queue idle");
    });

    let worker = Worker::new(queue, handler, options)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown.cancel();
    });

    worker.run(cancel).await;
    Ok(())
}
