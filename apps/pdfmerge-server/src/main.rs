//! PDF Merge Server
//!
//! Merges uploaded PDFs and images into one PDF in the background. Provides
//! endpoints for:
//!
//! - Job submission with per-file options (page ranges, orientation, password)
//! - Status polling and result download
//! - Server load, so clients can pick a less busy instance
//!
//! ## Architecture
//!
//! Requests are handled by axum; merging is delegated to `pdfmerge-jobs`,
//! which bounds the number of concurrently processing jobs and rejects
//! submissions beyond that with 503.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use pdfmerge_jobs::{JobScheduler, JobsConfig};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;

use api::{
    handle_download, handle_health, handle_index, handle_server_load, handle_start_merge,
    handle_status,
};

/// Longest pause between retention sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Command-line arguments for the PDF merge server
#[derive(Parser, Debug)]
#[command(name = "pdfmerge-server")]
#[command(about = "Asynchronous PDF and image merge server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PDFMERGE_PORT", default_value = "5000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "PDFMERGE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory for transient upload copies
    #[arg(long, env = "PDFMERGE_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for merged results
    #[arg(long, env = "PDFMERGE_MERGED_DIR", default_value = "merged")]
    merged_dir: PathBuf,

    /// Maximum number of concurrently processing jobs
    #[arg(long, env = "PDFMERGE_MAX_JOBS", default_value = "3")]
    max_jobs: usize,

    /// Seconds to keep finished jobs and their results (0 = forever)
    #[arg(long, env = "PDFMERGE_RESULT_TTL_SECS", default_value = "3600")]
    result_ttl_secs: u64,

    /// Maximum request body size in megabytes
    #[arg(long, env = "PDFMERGE_MAX_UPLOAD_MB", default_value = "100")]
    max_upload_mb: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<JobScheduler>,
}

/// Build the application router.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Upload form
        .route("/", get(handle_index))
        // Health check
        .route("/health", get(handle_health))
        // Job endpoints
        .route("/start-merge", post(handle_start_merge))
        .route("/status/:job_id", get(handle_status))
        .route("/download/:job_id", get(handle_download))
        .route("/server-load", get(handle_server_load))
        // Apply middleware
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PDF merge server on {}:{}", args.host, args.port);

    for dir in [&args.upload_dir, &args.merged_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let result_ttl = Duration::from_secs(args.result_ttl_secs);
    let scheduler = Arc::new(JobScheduler::new(JobsConfig {
        upload_dir: args.upload_dir.clone(),
        merged_dir: args.merged_dir.clone(),
        max_jobs: args.max_jobs,
        result_ttl,
    }));

    if scheduler
        .spawn_sweeper(result_ttl.min(MAX_SWEEP_INTERVAL))
        .is_some()
    {
        info!("Results expire after {}s", args.result_ttl_secs);
    }

    // Create shared state
    let state = AppState { scheduler };
    let app = build_router(state, args.max_upload_mb.saturating_mul(1024 * 1024));

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Max concurrent jobs: {}", args.max_jobs);
    info!(
        "Uploads: {}, results: {}",
        args.upload_dir.display(),
        args.merged_dir.display()
    );

    axum::serve(listener, app).await?;

    Ok(())
}
