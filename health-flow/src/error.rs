use thiserror::Error;

use crate::schema::SchemaViolation;

/// Failures while turning a document payload into text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Extraction error: {0}")]
    Extraction(String),
}

/// Failures while talking to the generation endpoint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Schema validation failed: {0}")]
    SchemaValidation(SchemaViolation),

    #[error("Tool '{tool}' failed: {reason}")]
    ToolInvocation { tool: String, reason: String },

    #[error("Model kept requesting tools after {0} rounds")]
    ToolRoundsExhausted(usize),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Template rendering is fully determined by code, so these only fire on a
/// template/request mismatch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Template '{template}' references unknown placeholder '{placeholder}'")]
    UnknownPlaceholder { template: String, placeholder: String },

    #[error("Template '{template}' needs a value for '{placeholder}'")]
    MissingValue { template: String, placeholder: String },

    #[error("Template '{0}' has an unterminated placeholder")]
    Unterminated(String),
}

/// Error for a whole capability call chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<SchemaViolation> for GenerationError {
    fn from(violation: SchemaViolation) -> Self {
        GenerationError::SchemaValidation(violation)
    }
}

impl FlowError {
    /// Stable machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::Extraction(ExtractionError::Decode(_)) => "decode_error",
            FlowError::Extraction(ExtractionError::UnsupportedFormat(_)) => "unsupported_format",
            FlowError::Extraction(ExtractionError::Extraction(_)) => "extraction_error",
            FlowError::Generation(GenerationError::SchemaValidation(_)) => {
                "schema_validation_error"
            }
            FlowError::Generation(GenerationError::ToolInvocation { .. }) => {
                "tool_invocation_error"
            }
            FlowError::Generation(GenerationError::ToolRoundsExhausted(_)) => {
                "tool_rounds_exhausted"
            }
            FlowError::Generation(GenerationError::Upstream(_)) => "upstream_error",
            FlowError::Render(_) => "render_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
