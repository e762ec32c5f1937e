use crate::annotator::Annotator;
use crate::llm::{create_generative_client, GenerativeClientTrait, Provider};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod annotator;
pub mod app;
pub mod cli;
pub mod formatter;
pub mod llm;
pub mod loader;
pub mod pipeline;
pub mod prompts;

pub mod test_utils;

/// Knobs of the annotation batch.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Column holding the case identifier. When unset or missing from the
    /// header, cases are identified by row position.
    pub identifier_column: Option<String>,
    pub summary_delay: Duration,
    pub priority_delay: Duration,
    pub max_concurrent_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            identifier_column: None,
            summary_delay: Duration::from_secs(5),
            priority_delay: Duration::from_secs(10),
            max_concurrent_rows: 1,
        }
    }
}

// Shared by the batch command and the upload server
pub struct AppState {
    pub client: Arc<dyn GenerativeClientTrait>,
    pub config: PipelineConfig,
}

impl AppState {
    pub fn annotator(&self) -> Annotator {
        Annotator::new(
            self.client.clone(),
            self.config.summary_delay,
            self.config.priority_delay,
        )
    }

    // Sequential, no delays
    pub fn new_for_testing(client: Arc<dyn GenerativeClientTrait>) -> Self {
        Self {
            client,
            config: PipelineConfig {
                summary_delay: Duration::ZERO,
                priority_delay: Duration::ZERO,
                ..PipelineConfig::default()
            },
        }
    }
}

// Create a config struct to hold AppState configuration
pub struct AppConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: String,
    pub identifier_column: Option<String>,
    pub summary_delay_secs: u64,
    pub priority_delay_secs: u64,
    pub max_concurrent_rows: usize,
}

pub fn create_app_state(config: AppConfig) -> Result<Arc<AppState>> {
    let client = create_generative_client(
        config.provider,
        config.api_key,
        config.api_base,
        config.model,
    )?;
    info!(
        "Generative client configured ({:?}, model {})",
        config.provider,
        client.model_name()
    );

    Ok(Arc::new(AppState {
        client,
        config: PipelineConfig {
            identifier_column: config.identifier_column,
            summary_delay: Duration::from_secs(config.summary_delay_secs),
            priority_delay: Duration::from_secs(config.priority_delay_secs),
            max_concurrent_rows: config.max_concurrent_rows.max(1),
        },
    }))
}
