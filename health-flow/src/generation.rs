//! Schema-validated generation with a bounded tool loop.
//!
//! The model itself sits behind [`CompletionBackend`]. The invoker owns the
//! conversation: it renders the system preamble from the output schema,
//! runs any tools the model asks for, and only hands back a value once it
//! has been validated against the schema.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::prompt::RenderedPrompt;
use crate::schema::{Schema, SchemaViolation, ViolationKind};
use crate::tool::{ToolDescriptor, ToolSpec};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub output: Value,
}

/// One round of model-requested tool calls and what they returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExchange {
    pub calls: Vec<ToolCallRequest>,
    pub results: Vec<ToolResult>,
}

/// Everything the backend needs to produce the next turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub system: String,
    pub prompt: RenderedPrompt,
    pub tools: Vec<ToolSpec>,
    pub exchanges: Vec<ToolExchange>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Final text; expected to contain the JSON answer.
    Answer(String),
    ToolCalls(Vec<ToolCallRequest>),
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, conversation: &Conversation) -> Result<ModelTurn, GenerationError>;
}

#[derive(Clone)]
pub struct GenerationInvoker {
    backend: Arc<dyn CompletionBackend>,
    max_tool_rounds: usize,
}

impl GenerationInvoker {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// Run `prompt` to completion and return a value conforming to `schema`.
    pub async fn invoke(
        &self,
        prompt: &RenderedPrompt,
        schema: &Schema,
        tools: &[ToolDescriptor],
    ) -> Result<Value, GenerationError> {
        let mut conversation = Conversation {
            system: system_preamble(schema),
            prompt: prompt.clone(),
            tools: tools.iter().map(ToolDescriptor::spec).collect(),
            exchanges: Vec::new(),
        };

        for round in 0..=self.max_tool_rounds {
            debug!(
                capability = %prompt.capability,
                round,
                "Requesting completion"
            );
            let calls = match self.backend.complete(&conversation).await? {
                ModelTurn::Answer(text) => return parse_answer(&text, schema),
                ModelTurn::ToolCalls(calls) => calls,
            };

            if round == self.max_tool_rounds {
                break;
            }
            if calls.is_empty() {
                return Err(GenerationError::Upstream(
                    "model returned neither an answer nor tool calls".to_string(),
                ));
            }

            let results = calls
                .iter()
                .map(|call| run_tool(tools, call))
                .collect::<Result<Vec<_>, _>>()?;
            conversation.exchanges.push(ToolExchange { calls, results });
        }

        warn!(
            capability = %prompt.capability,
            rounds = self.max_tool_rounds,
            "Model did not settle on an answer"
        );
        Err(GenerationError::ToolRoundsExhausted(self.max_tool_rounds))
    }
}

fn run_tool(tools: &[ToolDescriptor], call: &ToolCallRequest) -> Result<ToolResult, GenerationError> {
    let tool = tools
        .iter()
        .find(|t| t.name == call.name)
        .ok_or_else(|| GenerationError::ToolInvocation {
            tool: call.name.clone(),
            reason: "no such tool".to_string(),
        })?;

    let output = tool.call(call.arguments.clone())?;
    info!(tool = tool.name, call_id = %call.id, "Tool call completed");
    Ok(ToolResult {
        call_id: call.id.clone(),
        name: call.name.clone(),
        output,
    })
}

/// Instructions that pin the answer to `schema`.
pub fn system_preamble(schema: &Schema) -> String {
    let rendered = serde_json::to_string_pretty(&schema.to_json_schema())
        .unwrap_or_else(|_| schema.to_json_schema().to_string());
    format!(
        "Respond with a single JSON object named {} that conforms to this JSON Schema. \
         Output only the JSON, with no surrounding prose or code fences.\n\n{rendered}",
        schema.name
    )
}

/// Pull the JSON object out of the model's final text and validate it.
pub fn parse_answer(text: &str, schema: &Schema) -> Result<Value, GenerationError> {
    let not_json = || SchemaViolation::new(ViolationKind::NotJson, "$");

    let start = text.find('{').ok_or_else(not_json)?;
    let end = text.rfind('}').ok_or_else(not_json)?;
    if end < start {
        return Err(not_json().into());
    }

    let value: Value = serde_json::from_str(&text[start..=end]).map_err(|e| {
        debug!(error = %e, "Model answer is not valid JSON");
        not_json()
    })?;
    schema.validate(&value)?;
    Ok(value)
}
