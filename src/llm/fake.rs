use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::llm::{Generation, GenerativeClientTrait};

/// One scripted reply of the fake client.
#[derive(Debug, Clone)]
pub enum FakeReply {
    Generation(Generation),
    Error(String),
}

/// A fake generative client for testing
///
/// Replies are handed out in the order they were scripted; once the script
/// runs out every call gets a default text reply. Every prompt is recorded
/// so tests can verify what was sent.
///
/// # Example
///
/// ```
/// use casebrief::llm::fake::FakeGenerativeClient;
/// use casebrief::llm::{Generation, GenerativeClientTrait};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = FakeGenerativeClient::new()
///         .with_text("A burglary on 5th Ave.")
///         .with_error("connection reset");
///
///     let first = client.generate("Summarize this case").await?;
///     assert_eq!(first, Generation::Text("A burglary on 5th Ave.".into()));
///     assert!(client.generate("Prioritize this case").await.is_err());
///     assert_eq!(client.prompts().len(), 2);
///     Ok(())
/// }
/// ```
pub struct FakeGenerativeClient {
    replies: Mutex<VecDeque<FakeReply>>,
    model: String,
    // Track prompts for verification in tests
    pub requests: Mutex<Vec<String>>,
}

impl Default for FakeGenerativeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGenerativeClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            model: "fake-model".to_string(),
            requests: Mutex::new(vec![]),
        }
    }

    fn with_reply(self, reply: FakeReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Reply with generated text
    pub fn with_text(self, text: &str) -> Self {
        self.with_reply(FakeReply::Generation(Generation::Text(
            text.to_string(),
        )))
    }

    /// Reply with several generated texts in sequence
    pub fn with_texts(self, texts: Vec<&str>) -> Self {
        texts
            .into_iter()
            .fold(self, |client, text| client.with_text(text))
    }

    /// Reply with a content block
    pub fn with_blocked(self, reason: Option<&str>) -> Self {
        self.with_reply(FakeReply::Generation(Generation::Blocked {
            reason: reason.map(str::to_string),
        }))
    }

    /// Reply with no content at all
    pub fn with_empty(self) -> Self {
        self.with_reply(FakeReply::Generation(Generation::Empty))
    }

    /// Fail the call with the given message
    pub fn with_error(self, message: &str) -> Self {
        self.with_reply(FakeReply::Error(message.to_string()))
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeClientTrait for FakeGenerativeClient {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        self.requests.lock().unwrap().push(prompt.to_string());

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(FakeReply::Generation(generation)) => Ok(generation),
            Some(FakeReply::Error(message)) => Err(anyhow!(message)),
            None => Ok(Generation::Text("Fake default response".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
