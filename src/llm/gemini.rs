use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::llm::{Generation, GenerativeClientTrait};

pub const DEFAULT_GEMINI_API_BASE: &str =
    "https://generativelanguage.googleapis.com";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Part {
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SafetyRating {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub probability: String,
}

/// Maps a `generateContent` payload onto a [`Generation`].
///
/// Text is the concatenation of the first candidate's parts. Without text,
/// a prompt-level block reason wins over a candidate that stopped for
/// `SAFETY`, which is reported as a block without a reason.
pub fn interpret_response(response: GenerateContentResponse) -> Generation {
    let text: String = response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if !text.is_empty() {
        return Generation::Text(text);
    }

    if let Some(feedback) = &response.prompt_feedback {
        if let Some(reason) = &feedback.block_reason {
            let ratings: Vec<String> = feedback
                .safety_ratings
                .iter()
                .map(|r| format!("{}={}", r.category, r.probability))
                .collect();
            warn!(
                "Prompt blocked by Gemini. Reason: {}. Ratings: {:?}",
                reason, ratings
            );
            return Generation::Blocked {
                reason: Some(reason.clone()),
            };
        }
    }

    let safety_stop = response
        .candidates
        .first()
        .and_then(|candidate| candidate.finish_reason.as_deref())
        == Some("SAFETY");
    if safety_stop {
        warn!("Safety block detected in candidate");
        return Generation::Blocked { reason: None };
    }

    Generation::Empty
}

/// Client for the Gemini `models/{model}:generateContent` endpoint.
pub struct RealGeminiClient {
    http: reqwest::Client,
    api_base: Url,
    api_key: String,
    model: String,
}

impl RealGeminiClient {
    pub fn new(
        api_key: String,
        api_base: Option<String>,
        model: String,
    ) -> Result<Self> {
        let mut base =
            api_base.unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base = Url::parse(&base)
            .with_context(|| format!("invalid Gemini API base '{base}'"))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_base,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> Result<Url> {
        self.api_base
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .context("build Gemini generateContent URL")
    }
}

#[async_trait]
impl GenerativeClientTrait for RealGeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let url = self.endpoint()?;
        debug!("POST {}", url);

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("send Gemini generateContent request")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => anyhow!(
                    "authentication failed (HTTP {}): {}",
                    status,
                    detail
                ),
                StatusCode::TOO_MANY_REQUESTS => {
                    anyhow!("rate limit exceeded (HTTP {}): {}", status, detail)
                }
                _ => anyhow!(
                    "Gemini generateContent failed (HTTP {}): {}",
                    status,
                    detail
                ),
            });
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .context("parse Gemini generateContent response")?;

        Ok(interpret_response(payload))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
