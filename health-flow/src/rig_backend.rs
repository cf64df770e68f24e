//! [`CompletionBackend`] over any rig-core completion model.

use async_trait::async_trait;
use rig::{
    OneOrMany,
    client::CompletionClient,
    completion::{AssistantContent, CompletionModel, ToolDefinition},
    message::{ImageDetail, ImageMediaType, Message, ToolResultContent, UserContent},
    providers::openrouter,
};
use std::sync::Arc;
use tracing::debug;

use crate::error::GenerationError;
use crate::extract::DataUri;
use crate::generation::{CompletionBackend, Conversation, ModelTurn, ToolCallRequest};

pub const DEFAULT_MAX_TOKENS: u64 = 2048;

pub struct RigBackend<M: CompletionModel> {
    model: Arc<M>,
    temperature: f64,
    max_tokens: u64,
}

impl<M: CompletionModel> RigBackend<M> {
    pub fn new(model: M) -> Self {
        Self {
            model: Arc::new(model),
            temperature: 0.2,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Backend talking to OpenRouter with the given model id.
pub fn openrouter_backend(
    api_key: &str,
    model: &str,
) -> RigBackend<openrouter::CompletionModel> {
    let client = openrouter::Client::builder(api_key).build();
    RigBackend::new(client.completion_model(model))
}

#[async_trait]
impl<M> CompletionBackend for RigBackend<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn complete(&self, conversation: &Conversation) -> Result<ModelTurn, GenerationError> {
        let mut messages = to_messages(conversation);
        let prompt = messages
            .pop()
            .ok_or_else(|| GenerationError::Upstream("empty conversation".to_string()))?;

        let tools = conversation
            .tools
            .iter()
            .map(|spec| ToolDefinition {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            })
            .collect::<Vec<_>>();

        let request = self
            .model
            .completion_request(prompt)
            .preamble(conversation.system.clone())
            .messages(messages)
            .tools(tools)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build();

        let response = self
            .model
            .completion(request)
            .await
            .map_err(|e| GenerationError::Upstream(e.to_string()))?;

        let mut text = Vec::new();
        let mut calls = Vec::new();
        for content in response.choice.iter() {
            match content {
                AssistantContent::Text(t) => text.push(t.text.clone()),
                AssistantContent::ToolCall(call) => calls.push(ToolCallRequest {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                }),
                _ => {}
            }
        }
        debug!(
            text_parts = text.len(),
            tool_calls = calls.len(),
            "Received completion"
        );

        if calls.is_empty() {
            Ok(ModelTurn::Answer(text.join("\n")))
        } else {
            Ok(ModelTurn::ToolCalls(calls))
        }
    }
}

/// The opening user message followed by one assistant/user pair per tool
/// exchange.
fn to_messages(conversation: &Conversation) -> Vec<Message> {
    let mut opening = OneOrMany::one(UserContent::text(conversation.prompt.text.clone()));
    if let Some(image) = &conversation.prompt.media {
        opening.push(image_content(image));
    }

    let mut messages = vec![Message::User { content: opening }];
    for exchange in &conversation.exchanges {
        let calls = exchange
            .calls
            .iter()
            .map(|call| AssistantContent::tool_call(&call.id, &call.name, call.arguments.clone()))
            .collect::<Vec<_>>();
        let results = exchange
            .results
            .iter()
            .map(|result| {
                UserContent::tool_result(
                    result.call_id.clone(),
                    OneOrMany::one(ToolResultContent::text(result.output.to_string())),
                )
            })
            .collect::<Vec<_>>();

        if let Ok(content) = OneOrMany::many(calls) {
            messages.push(Message::Assistant { id: None, content });
        }
        if let Ok(content) = OneOrMany::many(results) {
            messages.push(Message::User { content });
        }
    }
    messages
}

fn image_content(image: &DataUri) -> UserContent {
    let media_type = match image.media_type.as_str() {
        "image/jpeg" => ImageMediaType::JPEG,
        "image/webp" => ImageMediaType::WEBP,
        _ => ImageMediaType::PNG,
    };
    UserContent::image_base64(image.payload.clone(), Some(media_type), Some(ImageDetail::Auto))
}
