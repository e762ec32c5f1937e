use clap::Parser;

use crate::llm::{Provider, DEFAULT_MODEL};
use crate::AppConfig;

/// Command-line arguments shared by the batch and server commands
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Generative API provider
    #[arg(long, value_enum, default_value_t = Provider::Gemini, env = "CASEBRIEF_PROVIDER")]
    pub provider: Provider,

    /// API key for the generative provider
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API base URL, defaults to the provider's public endpoint
    #[arg(long, env = "CASEBRIEF_API_BASE")]
    pub api_base: Option<String>,

    /// Model used for both summary and priority
    #[arg(long, default_value = DEFAULT_MODEL, env = "CASEBRIEF_MODEL")]
    pub model: String,

    /// Column holding the case identifier
    #[arg(long, env = "CASE_ID_COLUMN")]
    pub identifier_column: Option<String>,

    /// Seconds to wait before each summary request
    #[arg(long, default_value_t = 5)]
    pub summary_delay_secs: u64,

    /// Seconds to wait before each priority request
    #[arg(long, default_value_t = 10)]
    pub priority_delay_secs: u64,

    /// Maximum number of rows annotated at the same time
    #[arg(long, default_value_t = 1)]
    pub max_concurrent_rows: usize,
}

impl CommonArgs {
    pub fn into_app_config(self) -> AppConfig {
        AppConfig {
            provider: self.provider,
            api_key: self.api_key,
            api_base: self.api_base,
            model: self.model,
            identifier_column: self.identifier_column,
            summary_delay_secs: self.summary_delay_secs,
            priority_delay_secs: self.priority_delay_secs,
            max_concurrent_rows: self.max_concurrent_rows,
        }
    }
}
