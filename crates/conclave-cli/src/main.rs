mod adapters;
mod config;
mod engine;
mod escalate_cmd;
mod events_cmd;
mod retry_cmd;
mod status_cmd;
mod store;
mod submit_cmd;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "conclave", about = "Agent mesh orchestration engine")]
struct Cli {
    /// Document-store backend URL (overrides CONCLAVE_ARCADE_DB_URL env var)
    #[arg(long, global = true)]
    arcade_db_url: Option<String>,
    /// Worker pool size (overrides config file / env)
    #[arg(long, global = true)]
    worker_pool_size: Option<u32>,
    /// Reviewer pool size (overrides config file / env)
    #[arg(long, global = true)]
    reviewer_pool_size: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a task and wait for it to reach a terminal status
    Submit {
        /// Short task title
        title: String,
        /// Task description / prompt
        description: String,
        /// Seconds to wait for the task to terminate before giving up
        #[arg(long, default_value_t = 120)]
        wait: u64,
    },
    /// Show one task's status, or list recent tasks
    Status {
        /// Task ID to show (omit to list recent tasks)
        task_id: Option<String>,
        /// Max tasks to list when `task_id` is omitted
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show a task's sequence-ordered event log
    Events {
        /// Task ID to show events for
        task_id: String,
        /// Max events to show
        #[arg(long, default_value_t = 500)]
        limit: usize,
    },
    /// Resubmit a Blocked task's title/description as a fresh run
    Retry {
        /// Task ID to retry
        task_id: String,
        /// Seconds to wait for the new run to terminate
        #[arg(long, default_value_t = 120)]
        wait: u64,
    },
    /// Force a task straight to Blocked for human review
    Escalate {
        /// Task ID to escalate
        task_id: String,
        /// Reason recorded on the task and in its event log
        reason: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let opts = config::resolve(config::CliOverrides {
        worker_pool_size: cli.worker_pool_size,
        reviewer_pool_size: cli.reviewer_pool_size,
        arcade_db_url: cli.arcade_db_url,
    })?;

    match cli.command {
        Commands::Submit { title, description, wait } => {
            submit_cmd::run_submit(&opts, title, description, wait).await?;
        }
        Commands::Status { task_id, limit } => {
            status_cmd::run_status(&opts, task_id.as_deref(), limit).await?;
        }
        Commands::Events { task_id, limit } => {
            events_cmd::run_events(&opts, &task_id, limit).await?;
        }
        Commands::Retry { task_id, wait } => {
            retry_cmd::run_retry(&opts, &task_id, wait).await?;
        }
        Commands::Escalate { task_id, reason } => {
            escalate_cmd::run_escalate(&opts, &task_id, &reason).await?;
        }
    }

    Ok(())
}
