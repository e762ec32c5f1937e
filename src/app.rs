use crate::cli::CommonArgs;
use crate::loader;
use crate::pipeline::{self, AnnotationResult, LegacyRecord};
use crate::{create_app_state, AppState};
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    pub common_args: CommonArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate every case of a CSV file and print the results
    Run {
        /// Path to the input CSV file
        #[arg(env = "CASEBRIEF_CSV")]
        csv: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Serve the CSV upload endpoint
    Serve {
        /// Host address to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value_t = 5000, env = "PORT")]
        port: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One block per case
    Text,
    /// JSON array of `{Case_No, Summary, Priority}` records
    Json,
    /// JSON array with tagged summary and priority outcomes
    Structured,
}

pub fn render_results(
    results: &[AnnotationResult],
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(results
            .iter()
            .map(AnnotationResult::render_text)
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Json => {
            let records: Vec<LegacyRecord> =
                results.iter().map(AnnotationResult::to_legacy).collect();
            Ok(serde_json::to_string_pretty(&records)?)
        }
        OutputFormat::Structured => Ok(serde_json::to_string_pretty(results)?),
    }
}

fn init_tracing() -> Result<()> {
    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

pub async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let state = create_app_state(cli.common_args.into_app_config())?;

    match cli.command {
        Commands::Run { csv, format } => run_batch(&state, &csv, format).await,
        Commands::Serve { host, port } => serve(state, &host, port).await,
    }
}

#[instrument(skip(state))]
pub async fn run_batch(
    state: &AppState,
    csv: &Path,
    format: OutputFormat,
) -> Result<()> {
    let results = pipeline::process_file(state, csv).await?;
    if !results.is_empty() {
        println!("{}", render_results(&results, format)?);
    }
    Ok(())
}

pub async fn health_check() -> &'static str {
    debug!("Health check requested");
    "OK"
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
}

#[axum::debug_handler]
async fn upload_csv(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<LegacyRecord>>, (StatusCode, Json<Value>)> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read upload: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        info!("No file uploaded");
        return Err(bad_request("No file uploaded"));
    };
    info!("File uploaded successfully: {}", file_name);

    let table = loader::parse_csv_bytes(&bytes).map_err(|e| {
        error!("Error processing file {}: {:#}", file_name, e);
        bad_request(format!("{e:#}"))
    })?;

    let results = pipeline::process_table(&state, table).await;
    info!("File {} processed: {} cases", file_name, results.len());
    Ok(Json(results.iter().map(AnnotationResult::to_legacy).collect()))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload_csv))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server is running on {}", addr);

    axum::serve(listener, routes(state)).await?;
    Ok(())
}
