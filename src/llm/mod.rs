pub mod fake;
pub mod gemini;
pub mod openai;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::llm::gemini::RealGeminiClient;
use crate::llm::openai::create_openai_client;

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";

/// What a generative backend produced for a single prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Generated text, as returned by the model (not yet trimmed).
    Text(String),
    /// The provider refused to generate content. The reason is the
    /// provider's block classification when it reports one.
    Blocked { reason: Option<String> },
    /// The provider returned no content and no block reason.
    Empty,
}

/// A trait that abstracts a text-generation backend.
///
/// Both real providers and the scripted fake used by tests implement this,
/// so the annotator never knows which one it is talking to.
#[async_trait]
pub trait GenerativeClientTrait: Send + Sync {
    /// Sends a single text prompt and returns what the model produced.
    ///
    /// Transport, authentication and rate-limit failures are returned as
    /// errors; content blocks and empty answers are not errors.
    async fn generate(&self, prompt: &str) -> Result<Generation>;

    /// The model identifier requests are sent to.
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    /// Google Gemini `generateContent` REST API
    Gemini,
    /// Any OpenAI-compatible chat completions API
    #[value(name = "openai")]
    OpenAI,
}

pub fn create_generative_client(
    provider: Provider,
    api_key: Option<String>,
    api_base: Option<String>,
    model: String,
) -> Result<Arc<dyn GenerativeClientTrait>> {
    let api_key = api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            anyhow!("API key is not set. Pass --api-key or set GEMINI_API_KEY")
        })?;

    match provider {
        Provider::Gemini => {
            if !api_key.starts_with("AIzaSy") {
                warn!("The provided Gemini API key format appears unusual. Ensure it is correct.");
            }
            Ok(Arc::new(RealGeminiClient::new(api_key, api_base, model)?))
        }
        Provider::OpenAI => {
            Ok(Arc::new(create_openai_client(api_key, api_base, model)))
        }
    }
}
