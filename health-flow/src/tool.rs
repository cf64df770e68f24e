use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::error::GenerationError;
use crate::schema::Schema;

/// Synchronous handler behind a tool. Errors are plain messages; the
/// invoker wraps them into [`GenerationError::ToolInvocation`].
pub type ToolHandler = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// What the model sees of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A callable the model may invoke during a generation.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    handler: ToolHandler,
}

impl ToolDescriptor {
    pub fn new<F>(
        name: &'static str,
        description: impl Into<String>,
        input_schema: Schema,
        output_schema: Schema,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name,
            description: description.into(),
            input_schema,
            output_schema,
            handler: Arc::new(handler),
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.clone(),
            parameters: self.input_schema.to_json_schema(),
        }
    }

    /// Validate `arguments`, run the handler, and validate what it returns.
    pub fn call(&self, arguments: Value) -> Result<Value, GenerationError> {
        self.input_schema
            .validate(&arguments)
            .map_err(|violation| self.failure(format!("invalid arguments: {violation}")))?;

        info!(tool = self.name, arguments = %arguments, "Invoking tool");

        let output = (self.handler)(arguments).map_err(|reason| self.failure(reason))?;
        self.output_schema
            .validate(&output)
            .map_err(|violation| self.failure(format!("invalid output: {violation}")))?;
        Ok(output)
    }

    fn failure(&self, reason: String) -> GenerationError {
        GenerationError::ToolInvocation {
            tool: self.name.to_string(),
            reason,
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, SchemaType};
    use serde_json::json;

    fn echo_tool() -> ToolDescriptor {
        ToolDescriptor::new(
            "echo",
            "Echo a word back",
            Schema::object("echo_input", vec![Field::required("word", "", SchemaType::String)]),
            Schema::object("echo_output", vec![Field::required("echo", "", SchemaType::String)]),
            |args| {
                let word = args["word"].as_str().unwrap_or_default();
                if word == "boom" {
                    return Err("exploded".to_string());
                }
                if word == "bad" {
                    return Ok(json!({ "echo": 7 }));
                }
                Ok(json!({ "echo": word }))
            },
        )
    }

    #[test]
    fn runs_handler_on_valid_arguments() {
        assert_eq!(echo_tool().call(json!({ "word": "hi" })), Ok(json!({ "echo": "hi" })));
    }

    #[test]
    fn rejects_invalid_arguments_before_running() {
        let err = echo_tool().call(json!({ "word": 3 })).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ToolInvocation { ref tool, ref reason }
                if tool == "echo" && reason.starts_with("invalid arguments")
        ));
    }

    #[test]
    fn surfaces_handler_and_output_failures() {
        let tool = echo_tool();
        assert!(matches!(
            tool.call(json!({ "word": "boom" })),
            Err(GenerationError::ToolInvocation { reason, .. }) if reason == "exploded"
        ));
        assert!(matches!(
            tool.call(json!({ "word": "bad" })),
            Err(GenerationError::ToolInvocation { reason, .. }) if reason.starts_with("invalid output")
        ));
    }

    #[test]
    fn spec_exposes_input_schema() {
        let spec = echo_tool().spec();
        assert_eq!(spec.name, "echo");
        assert_eq!(spec.parameters["required"], json!(["word"]));
    }
}
