use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use reveal_common::Config;
use reveal_graph::GraphClient;
use reveal_pipeline::{build_scheduler, JobKind, RevealDeps, RevealPipeline};

#[derive(Parser)]
#[command(name = "reveal", about = "Website visitor enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Migrate, then run every job on its cron schedule until Ctrl-C.
    Run,
    /// Run one pass of a single job and exit.
    Tick {
        #[arg(value_enum)]
        job: JobKind,
    },
    /// Apply pending Postgres migrations and exit.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Migrate { database_url } => {
            let pool = reveal_store::connect(&database_url).await?;
            reveal_store::migrate(&pool).await?;
            info!("Migrations applied");
            Ok(())
        }
        Command::Tick { job } => {
            let (config, pipeline) = build_pipeline().await?;
            info!(job = job.as_str(), batch_limit = config.batch_limit, "Running single tick");
            pipeline.run_job(job).await
        }
        Command::Run => {
            let (config, pipeline) = build_pipeline().await?;
            let scheduler = build_scheduler(Arc::new(pipeline), &config.schedules)?;
            let handles = scheduler.start();
            info!(jobs = ?scheduler.job_names(), "Reveal pipeline running");

            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            for handle in handles {
                handle.abort();
            }
            Ok(())
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("reveal=info".parse()?);
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

async fn build_pipeline() -> Result<(Config, RevealPipeline)> {
    let config = Config::from_env()?;
    config.log_redacted();

    let pool = reveal_store::connect(&config.database_url).await?;
    reveal_store::migrate(&pool).await?;

    let graph =
        GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await?;

    let deps = RevealDeps::from_config(&config, pool, graph)?;
    Ok((config, RevealPipeline::new(deps)))
}
