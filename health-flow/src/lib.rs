//! Structured-generation pipeline behind the health assistant.
//!
//! Each capability follows the same chain: optional document extraction,
//! prompt rendering from a fixed template, schema-validated generation
//! (with tools where the capability needs them), and for blood reports a
//! final split of the generated text into display sections.

pub mod assistant;
pub mod capability;
pub mod error;
pub mod extract;
pub mod generation;
pub mod hospitals;
pub mod prompt;
#[cfg(feature = "rig")]
pub mod rig_backend;
pub mod schema;
pub mod sections;
pub mod tool;

pub use assistant::HealthAssistant;
pub use capability::{
    BloodReportOutcome, BloodReportRequest, Capability, CapabilityRequest, CapabilityResponse,
    ChatReply, ChatRequest, ConfidenceLevel, EmergencyAvailability, HospitalRecord,
    HospitalSearchRequest, HospitalSearchResult, SkinAnalysis, SkinAnalysisRequest,
    SkinConditionAnalysis,
};
pub use error::{ExtractionError, FlowError, GenerationError, RenderError, Result};
pub use extract::{DataUri, extract_pdf_text, extract_pdf_text_blocking, validate_image};
pub use generation::{
    CompletionBackend, Conversation, DEFAULT_MAX_TOOL_ROUNDS, GenerationInvoker, ModelTurn,
    ToolCallRequest, ToolExchange, ToolResult,
};
pub use hospitals::{find_hospitals_tool, lookup_hospitals};
pub use prompt::{PromptTemplate, RenderedPrompt, render_prompt};
#[cfg(feature = "rig")]
pub use rig_backend::{RigBackend, openrouter_backend};
pub use schema::{Field, Schema, SchemaType, SchemaViolation, ViolationKind};
pub use sections::{BLOOD_REPORT_FORMAT, ParsedSection, SectionFormat, parse_sections};
pub use tool::{ToolDescriptor, ToolSpec};
