use crate::llm::{Generation, GenerativeClientTrait};
use anyhow::Result;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    FinishReason,
};
use async_openai::Client;
use async_trait::async_trait;

// Client for OpenAI-compatible chat completion endpoints
pub struct RealOpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl RealOpenAIClient {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

pub fn create_openai_client(
    api_key: String,
    api_base: Option<String>,
    model: String,
) -> RealOpenAIClient {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(api_base) = api_base {
        config = config.with_api_base(api_base);
    }
    RealOpenAIClient::new(Client::with_config(config), model)
}

/// Maps a chat completion onto a [`Generation`]. A refusal or a
/// `content_filter` finish counts as a block.
#[allow(deprecated)]
pub fn interpret_chat_response(
    response: &CreateChatCompletionResponse,
) -> Generation {
    let Some(choice) = response.choices.first() else {
        return Generation::Empty;
    };

    if let Some(content) = choice
        .message
        .content
        .as_deref()
        .filter(|content| !content.trim().is_empty())
    {
        return Generation::Text(content.to_string());
    }

    if let Some(refusal) = &choice.message.refusal {
        return Generation::Blocked {
            reason: Some(refusal.clone()),
        };
    }

    if matches!(choice.finish_reason, Some(FinishReason::ContentFilter)) {
        return Generation::Blocked {
            reason: Some("CONTENT_FILTER".to_string()),
        };
    }

    Generation::Empty
}

#[async_trait]
impl GenerativeClientTrait for RealOpenAIClient {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let user_message = ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?,
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([user_message])
            .build()?;

        let response = self.client.chat().create(request).await?;

        Ok(interpret_chat_response(&response))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
