//! Request and response contracts for the four assistant capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{Field, Schema, SchemaType};
use crate::sections::ParsedSection;

pub const CONFIDENCE_LEVELS: &[&str] = &["Low", "Medium", "High"];
pub const AVAILABILITY_VALUES: &[&str] = &["Available", "On-call", "Unavailable"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BloodReport,
    SkinAnalysis,
    Chat,
    HospitalSearch,
}

impl Capability {
    pub fn all() -> &'static [Capability] {
        &[
            Self::BloodReport,
            Self::SkinAnalysis,
            Self::Chat,
            Self::HospitalSearch,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BloodReport => "blood_report",
            Self::SkinAnalysis => "skin_analysis",
            Self::Chat => "chat",
            Self::HospitalSearch => "hospital_search",
        }
    }

    /// The single output contract for this capability.
    pub fn schema(&self) -> Schema {
        match self {
            Self::BloodReport => blood_report_schema(),
            Self::SkinAnalysis => skin_analysis_schema(),
            Self::Chat => chat_schema(),
            Self::HospitalSearch => hospital_search_schema(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Requests ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodReportRequest {
    /// `data:application/pdf;base64,...`
    pub pdf_data_uri: String,
    /// Text already pulled out of the PDF; skips local extraction when set.
    #[serde(default, alias = "pdfText")]
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkinAnalysisRequest {
    pub photo_data_uri: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalSearchRequest {
    /// Free text such as "hospitals in Delhi".
    pub query: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "capability", rename_all = "snake_case")]
pub enum CapabilityRequest {
    BloodReport(BloodReportRequest),
    SkinAnalysis(SkinAnalysisRequest),
    Chat(ChatRequest),
    HospitalSearch(HospitalSearchRequest),
}

impl CapabilityRequest {
    pub fn capability(&self) -> Capability {
        match self {
            Self::BloodReport(_) => Capability::BloodReport,
            Self::SkinAnalysis(_) => Capability::SkinAnalysis,
            Self::Chat(_) => Capability::Chat,
            Self::HospitalSearch(_) => Capability::HospitalSearch,
        }
    }

    pub fn extracted_text(&self) -> Option<&str> {
        match self {
            Self::BloodReport(r) => r.extracted_text.as_deref(),
            Self::SkinAnalysis(r) => r.extracted_text.as_deref(),
            Self::Chat(r) => r.extracted_text.as_deref(),
            Self::HospitalSearch(r) => r.extracted_text.as_deref(),
        }
    }
}

// ── Responses ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodReportAnalysis {
    pub analysis_result: String,
}

/// Blood report analysis plus the display sections parsed out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodReportOutcome {
    pub analysis_result: String,
    pub sections: Vec<ParsedSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkinConditionAnalysis {
    pub acne_probability: f64,
    pub other_condition_probability: f64,
    pub condition_name: String,
    pub confidence_level: ConfidenceLevel,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinAnalysis {
    pub analysis: SkinConditionAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmergencyAvailability {
    Available,
    #[serde(rename = "On-call")]
    OnCall,
    Unavailable,
}

/// One hospital as shown to the user. Regenerated per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalRecord {
    pub name: String,
    pub address: String,
    pub distance: String,
    pub services: Vec<String>,
    pub emergency_doctor_availability: EmergencyAvailability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalSearchResult {
    pub summary: String,
    pub hospitals: Vec<HospitalRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "capability", rename_all = "snake_case")]
pub enum CapabilityResponse {
    BloodReport(BloodReportOutcome),
    SkinAnalysis(SkinAnalysis),
    Chat(ChatReply),
    HospitalSearch(HospitalSearchResult),
}

// ── Schemas ─────────────────────────────────────────────────

pub fn blood_report_schema() -> Schema {
    Schema::object(
        "blood_report_analysis",
        vec![Field::required(
            "analysisResult",
            "A structured analysis summarizing key findings, health implications, and next steps. \
             Each section is a heading on its own line followed by bullet lines starting with '*'.",
            SchemaType::String,
        )],
    )
}

pub fn skin_analysis_schema() -> Schema {
    Schema::object(
        "skin_condition_analysis",
        vec![Field::required(
            "analysis",
            "",
            SchemaType::Object(vec![
                Field::required(
                    "acneProbability",
                    "Probability of acne being present (0-1).",
                    SchemaType::Probability,
                ),
                Field::required(
                    "otherConditionProbability",
                    "Probability of another skin condition being present (0-1).",
                    SchemaType::Probability,
                ),
                Field::required(
                    "conditionName",
                    "Name of the detected skin condition, if any.",
                    SchemaType::String,
                ),
                Field::required(
                    "confidenceLevel",
                    "Confidence level of the analysis.",
                    SchemaType::Enum(CONFIDENCE_LEVELS),
                ),
                Field::required(
                    "recommendation",
                    "Recommendation based on the analysis.",
                    SchemaType::String,
                ),
            ]),
        )],
    )
}

pub fn chat_schema() -> Schema {
    Schema::object(
        "chat_reply",
        vec![Field::required(
            "response",
            "The chatbot's response to the user.",
            SchemaType::String,
        )],
    )
}

pub fn hospital_record_type() -> SchemaType {
    SchemaType::Object(vec![
        Field::required("name", "", SchemaType::String),
        Field::required("address", "", SchemaType::String),
        Field::required("distance", "", SchemaType::String),
        Field::required("services", "", SchemaType::Array(Box::new(SchemaType::String))),
        Field::required(
            "emergencyDoctorAvailability",
            "Current availability of doctors for emergencies.",
            SchemaType::Enum(AVAILABILITY_VALUES),
        ),
    ])
}

pub fn hospital_search_schema() -> Schema {
    Schema::object(
        "hospital_search_result",
        vec![
            Field::required(
                "summary",
                "A brief, helpful summary for the user about the hospital search results.",
                SchemaType::String,
            ),
            Field::required(
                "hospitals",
                "The list of hospitals found.",
                SchemaType::Array(Box::new(hospital_record_type())),
            ),
        ],
    )
}
