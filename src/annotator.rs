use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::llm::{Generation, GenerativeClientTrait};
use crate::prompts::{CASE_TEXT_PLACEHOLDER, PRIORITY_PROMPT, SUMMARY_PROMPT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Summary,
    Priority,
}

impl TaskKind {
    fn template(self) -> &'static str {
        match self {
            TaskKind::Summary => SUMMARY_PROMPT,
            TaskKind::Priority => PRIORITY_PROMPT,
        }
    }

    /// Capitalized task name, as used at the start of legacy messages.
    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Summary => "Summary",
            TaskKind::Priority => "Priority",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            TaskKind::Summary => "summary",
            TaskKind::Priority => "priority",
        }
    }

    pub fn build_prompt(self, case_text: &str) -> String {
        self.template().replace(CASE_TEXT_PLACEHOLDER, case_text)
    }
}

/// Outcome of one annotation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Annotation {
    /// Trimmed model output
    Success(String),
    /// Content block, with the provider's reason when it gave one
    Blocked(Option<String>),
    Empty,
    /// Description of the failed call
    Error(String),
}

impl Annotation {
    pub fn status(&self) -> &'static str {
        match self {
            Annotation::Success(_) => "success",
            Annotation::Blocked(_) => "blocked",
            Annotation::Empty => "empty",
            Annotation::Error(_) => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Annotation::Success(_))
    }

    /// The single-string rendering produced by the batch script, where
    /// failures and blocks are folded into the field text.
    pub fn render(&self, task: TaskKind) -> String {
        match self {
            Annotation::Success(text) => text.clone(),
            Annotation::Blocked(Some(reason)) => {
                format!("{} generation blocked: {}", task.label(), reason)
            }
            Annotation::Blocked(None) => format!(
                "{} generation blocked due to safety concerns.",
                task.label()
            ),
            Annotation::Empty => {
                format!("No {} generated (empty response).", task.noun())
            }
            Annotation::Error(detail) => {
                format!("Error generating {}: {}", task.noun(), detail)
            }
        }
    }
}

fn log_error_hint(detail: &str) {
    let lowered = detail.to_lowercase();
    if lowered.contains("permission denied")
        || lowered.contains("authentication")
    {
        warn!("Authentication error: check your API key and permissions.");
    } else if lowered.contains("rate limit") {
        warn!("Rate limit exceeded. Consider increasing the request delay.");
    }
}

/// Runs the summary and priority tasks against a generative client.
#[derive(Clone)]
pub struct Annotator {
    client: Arc<dyn GenerativeClientTrait>,
    summary_delay: Duration,
    priority_delay: Duration,
}

impl Annotator {
    pub fn new(
        client: Arc<dyn GenerativeClientTrait>,
        summary_delay: Duration,
        priority_delay: Duration,
    ) -> Self {
        Self {
            client,
            summary_delay,
            priority_delay,
        }
    }

    fn delay_for(&self, task: TaskKind) -> Duration {
        match task {
            TaskKind::Summary => self.summary_delay,
            TaskKind::Priority => self.priority_delay,
        }
    }

    /// Waits the task's fixed delay, calls the model and normalizes the
    /// answer. Never fails: call errors become [`Annotation::Error`].
    #[instrument(skip(self, case_text), fields(model = self.client.model_name()))]
    pub async fn annotate(&self, task: TaskKind, case_text: &str) -> Annotation {
        let prompt = task.build_prompt(case_text);

        let delay = self.delay_for(task);
        if !delay.is_zero() {
            debug!("Waiting {:?} before {} request", delay, task.noun());
            tokio::time::sleep(delay).await;
        }

        debug!("Calling model for {}", task.noun());
        let annotation = match self.client.generate(&prompt).await {
            Ok(Generation::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!("Received a blank response for {}", task.noun());
                    Annotation::Empty
                } else {
                    Annotation::Success(text.to_string())
                }
            }
            Ok(Generation::Blocked { reason }) => {
                warn!(
                    "{} generation blocked. Reason: {}",
                    task.label(),
                    reason.as_deref().unwrap_or("unknown")
                );
                Annotation::Blocked(reason)
            }
            Ok(Generation::Empty) => {
                warn!("Received an empty response for {}", task.noun());
                Annotation::Empty
            }
            Err(e) => {
                let detail = format!("{:#}", e);
                error!("Error calling model for {}: {}", task.noun(), detail);
                log_error_hint(&detail);
                Annotation::Error(detail)
            }
        };

        info!(outcome = annotation.status(), "{} finished", task.noun());
        annotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fake::FakeGenerativeClient;
    use pretty_assertions::assert_eq;

    const CASE_TEXT: &str = "Case ID: 1\nDescription: Burglary at 5th Ave";

    fn annotator(client: Arc<FakeGenerativeClient>) -> Annotator {
        Annotator::new(client, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_prompt_embeds_case_text_between_delimiters() {
        for task in [TaskKind::Summary, TaskKind::Priority] {
            let prompt = task.build_prompt(CASE_TEXT);
            assert!(prompt.contains(&format!("---\n{}\n---", CASE_TEXT)));
            assert!(!prompt.contains(CASE_TEXT_PLACEHOLDER));
        }
        assert!(TaskKind::Priority
            .build_prompt(CASE_TEXT)
            .contains("Priority Level: [High/Medium/Low]"));
    }

    #[tokio::test]
    async fn test_success_is_trimmed() {
        let client = Arc::new(
            FakeGenerativeClient::new()
                .with_text("\n  A burglary was reported on 5th Ave.  \n"),
        );
        let result = annotator(client.clone())
            .annotate(TaskKind::Summary, CASE_TEXT)
            .await;

        assert_eq!(
            result,
            Annotation::Success("A burglary was reported on 5th Ave.".into())
        );
        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(CASE_TEXT));
    }

    #[tokio::test]
    async fn test_failure_modes_never_escape() {
        let client = Arc::new(
            FakeGenerativeClient::new()
                .with_error("error sending request: operation timed out")
                .with_error("authentication failed (HTTP 401): bad key")
                .with_blocked(Some("SAFETY"))
                .with_blocked(None)
                .with_empty()
                .with_text("   "),
        );
        let annotator = annotator(client);

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes
                .push(annotator.annotate(TaskKind::Priority, CASE_TEXT).await);
        }

        assert_eq!(
            outcomes,
            vec![
                Annotation::Error(
                    "error sending request: operation timed out".into()
                ),
                Annotation::Error(
                    "authentication failed (HTTP 401): bad key".into()
                ),
                Annotation::Blocked(Some("SAFETY".into())),
                Annotation::Blocked(None),
                Annotation::Empty,
                Annotation::Empty,
            ]
        );
    }

    #[test]
    fn test_legacy_rendering() {
        let cases = [
            (
                Annotation::Success("Priority Level: Low".into()),
                TaskKind::Priority,
                "Priority Level: Low",
            ),
            (
                Annotation::Blocked(Some("SAFETY".into())),
                TaskKind::Summary,
                "Summary generation blocked: SAFETY",
            ),
            (
                Annotation::Blocked(None),
                TaskKind::Priority,
                "Priority generation blocked due to safety concerns.",
            ),
            (
                Annotation::Empty,
                TaskKind::Summary,
                "No summary generated (empty response).",
            ),
            (
                Annotation::Error("network down".into()),
                TaskKind::Priority,
                "Error generating priority: network down",
            ),
        ];

        for (annotation, task, expected) in cases {
            assert_eq!(annotation.render(task), expected);
        }
    }

    #[test]
    fn test_annotation_serializes_tagged() {
        let value = serde_json::to_value(Annotation::Blocked(Some(
            "OTHER".into(),
        )))
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"status": "blocked", "detail": "OTHER"})
        );
        let value = serde_json::to_value(Annotation::Empty).unwrap();
        assert_eq!(value, serde_json::json!({"status": "empty"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_before_call() {
        let client = Arc::new(FakeGenerativeClient::new());
        let annotator = Annotator::new(
            client.clone(),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );

        let start = tokio::time::Instant::now();
        annotator.annotate(TaskKind::Summary, CASE_TEXT).await;
        assert!(start.elapsed() >= Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        annotator.annotate(TaskKind::Priority, CASE_TEXT).await;
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(client.prompts().len(), 2);
    }
}
