/*
newsposter - single-binary main.rs
This binary starts the Rocket HTTP server and runs the daily scheduler inside the same process.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsposter::pipeline::{Pipeline, PipelineRequest};
use newsposter::scheduler::Scheduler;
use newsposter::server::{launch_rocket, AppState};

#[derive(Parser, Debug)]
#[command(name = "newsposter", about = "Scrape a news section, write a LinkedIn post with an illustration, publish it")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not start the daily scheduler (HTTP endpoints only)
    #[arg(long)]
    no_scheduler: bool,

    /// Run the pipeline once for CATEGORY and PROMPT, print the outcome and exit
    #[arg(long, num_args = 2, value_names = ["CATEGORY", "PROMPT"])]
    run_once: Option<Vec<String>>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Secrets may live in a local .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let pipeline = Arc::new(Pipeline::from_config(&config).context("failed to initialize pipeline")?);

    if let Some(values) = args.run_once {
        let request = PipelineRequest {
            category: values[0].clone(),
            prompt: values[1].clone(),
        };
        return run_once(&pipeline, &request).await;
    }

    let scheduler = Arc::new(Scheduler::from_config(pipeline.clone(), &config.scheduler)?);
    if args.no_scheduler {
        info!("Scheduler disabled via CLI (--no-scheduler)");
    } else {
        scheduler.start().await;
    }

    let state = AppState {
        pipeline,
        scheduler: scheduler.clone(),
    };

    // Rocket handles SIGINT/SIGTERM itself; once it returns the scheduler is stopped.
    let server_result = launch_rocket(state, config.server.as_ref()).await;
    if let Err(ref e) = server_result {
        error!(%e, "HTTP server exited with error");
    }

    scheduler.shutdown().await;
    info!("newsposter stopped");
    server_result
}

async fn run_once(pipeline: &Pipeline, request: &PipelineRequest) -> Result<()> {
    info!(category = %request.category, "Running pipeline once");
    match pipeline.run(request).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            error!(stage = e.stage(), error = %e, "pipeline run failed");
            Err(anyhow::anyhow!("pipeline failed at stage '{}': {}", e.stage(), e))
        }
    }
}
