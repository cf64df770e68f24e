use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::capability::{
    BloodReportAnalysis, BloodReportOutcome, BloodReportRequest, Capability, CapabilityRequest,
    CapabilityResponse, ChatReply, ChatRequest, HospitalSearchRequest, HospitalSearchResult,
    SkinAnalysis, SkinAnalysisRequest,
};
use crate::error::{ExtractionError, FlowError, GenerationError, Result};
use crate::extract::extract_pdf_text_blocking;
use crate::generation::{CompletionBackend, GenerationInvoker};
use crate::hospitals::find_hospitals_tool;
use crate::prompt::render_prompt;
use crate::schema::{SchemaViolation, ViolationKind};
use crate::sections::BLOOD_REPORT_FORMAT;
use crate::tool::ToolDescriptor;

/// Runs one call chain per capability request.
#[derive(Clone)]
pub struct HealthAssistant {
    invoker: GenerationInvoker,
}

impl HealthAssistant {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            invoker: GenerationInvoker::new(backend),
        }
    }

    pub fn with_invoker(invoker: GenerationInvoker) -> Self {
        Self { invoker }
    }

    /// Extract the PDF text (unless supplied), generate an analysis, and
    /// split it into display sections.
    #[instrument(skip_all)]
    pub async fn analyze_blood_report(&self, request: BloodReportRequest) -> Result<BloodReportOutcome> {
        let report_text = match request.extracted_text {
            Some(text) if !text.trim().is_empty() => text,
            _ => extract_pdf_text_blocking(request.pdf_data_uri).await?,
        };
        if report_text.trim().is_empty() {
            return Err(ExtractionError::Extraction("no extractable text in document".to_string()).into());
        }
        info!(chars = report_text.len(), "Analyzing blood report");

        // The prompt only needs the text once it has been extracted.
        let analysis: BloodReportAnalysis = self
            .run(CapabilityRequest::BloodReport(BloodReportRequest {
                pdf_data_uri: String::new(),
                extracted_text: Some(report_text),
            }))
            .await?;
        let sections = BLOOD_REPORT_FORMAT.parse(&analysis.analysis_result);
        info!(sections = sections.len(), "Blood report analysis parsed");

        Ok(BloodReportOutcome {
            analysis_result: analysis.analysis_result,
            sections,
        })
    }

    #[instrument(skip_all)]
    pub async fn analyze_skin(&self, request: SkinAnalysisRequest) -> Result<SkinAnalysis> {
        self.run(CapabilityRequest::SkinAnalysis(request)).await
    }

    #[instrument(skip_all)]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        self.run(CapabilityRequest::Chat(request)).await
    }

    #[instrument(skip_all, fields(query = %request.query))]
    pub async fn find_hospitals(&self, request: HospitalSearchRequest) -> Result<HospitalSearchResult> {
        self.run(CapabilityRequest::HospitalSearch(request)).await
    }

    /// Dispatch on the request's capability tag.
    pub async fn handle(&self, request: CapabilityRequest) -> Result<CapabilityResponse> {
        Ok(match request {
            CapabilityRequest::BloodReport(r) => {
                CapabilityResponse::BloodReport(self.analyze_blood_report(r).await?)
            }
            CapabilityRequest::SkinAnalysis(r) => {
                CapabilityResponse::SkinAnalysis(self.analyze_skin(r).await?)
            }
            CapabilityRequest::Chat(r) => CapabilityResponse::Chat(self.chat(r).await?),
            CapabilityRequest::HospitalSearch(r) => {
                CapabilityResponse::HospitalSearch(self.find_hospitals(r).await?)
            }
        })
    }

    /// Render the template selected by the request's tag and generate its
    /// typed answer.
    async fn run<T: DeserializeOwned>(&self, request: CapabilityRequest) -> Result<T> {
        let prompt = render_prompt(&request)?;
        let schema = prompt.capability.schema();
        let tools = tools_for(prompt.capability);
        let value = self.invoker.invoke(&prompt, &schema, &tools).await?;
        into_typed(prompt.capability, value)
    }
}

fn tools_for(capability: Capability) -> Vec<ToolDescriptor> {
    match capability {
        Capability::HospitalSearch => vec![find_hospitals_tool()],
        Capability::BloodReport | Capability::SkinAnalysis | Capability::Chat => Vec::new(),
    }
}

/// The schema has already accepted `value`, so this only fails if the typed
/// model and the schema disagree.
fn into_typed<T: DeserializeOwned>(capability: Capability, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        FlowError::Generation(GenerationError::SchemaValidation(SchemaViolation::new(
            ViolationKind::WrongType("typed payload"),
            format!("$ ({capability}: {e})"),
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ConfidenceLevel, EmergencyAvailability};
    use crate::extract::tests::pdf_data_uri;
    use crate::generation::ModelTurn;
    use crate::generation::tests::{ScriptedBackend, tool_call};
    use crate::hospitals::lookup_hospitals;
    use serde_json::json;

    #[tokio::test]
    async fn blood_report_runs_extract_generate_parse() {
        let backend = ScriptedBackend::answering(json!({
            "analysisResult": "Results Interpretation\n* Hemoglobin is normal\n\
                               What It Means for Health\n* No anemia\n\
                               Next Steps/Questions for Provider\n* Recheck in a year"
        }));
        let assistant = HealthAssistant::new(backend.clone());

        let outcome = assistant
            .analyze_blood_report(BloodReportRequest {
                pdf_data_uri: pdf_data_uri(&["Hemoglobin 14.1 g/dL"]),
                extracted_text: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome.sections.len(), 3);
        assert_eq!(outcome.sections[2].bullets, ["Recheck in a year"]);

        let seen = backend.seen.lock().unwrap();
        assert!(seen[0].prompt.text.contains("Hemoglobin 14.1"));
        assert!(seen[0].prompt.text.contains("\"Results Interpretation\""));
    }

    #[tokio::test]
    async fn supplied_text_skips_extraction() {
        let backend = ScriptedBackend::answering(json!({ "analysisResult": "All values normal." }));
        let outcome = HealthAssistant::new(backend.clone())
            .analyze_blood_report(BloodReportRequest {
                pdf_data_uri: "not even a data uri".to_string(),
                extracted_text: Some("Platelets 250k".to_string()),
            })
            .await
            .unwrap();

        assert!(outcome.sections.is_empty());
        assert_eq!(outcome.analysis_result, "All values normal.");
        assert!(backend.seen.lock().unwrap()[0].prompt.text.contains("Platelets 250k"));
    }

    #[tokio::test]
    async fn extraction_errors_stop_before_generation() {
        let backend = ScriptedBackend::new(vec![]);
        let err = HealthAssistant::new(backend.clone())
            .analyze_blood_report(BloodReportRequest {
                pdf_data_uri: "data:application/pdf;base64,%%%".to_string(),
                extracted_text: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "decode_error");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn skin_analysis_is_typed() {
        let backend = ScriptedBackend::answering(json!({
            "analysis": {
                "acneProbability": 0.72,
                "otherConditionProbability": 0.1,
                "conditionName": "Acne vulgaris",
                "confidenceLevel": "Medium",
                "recommendation": "Consider a dermatologist visit."
            }
        }));
        let result = HealthAssistant::new(backend.clone())
            .analyze_skin(SkinAnalysisRequest {
                photo_data_uri: "data:image/png;base64,iVBORw0KGgo=".to_string(),
                extracted_text: None,
            })
            .await
            .unwrap();

        assert_eq!(result.analysis.confidence_level, ConfidenceLevel::Medium);
        assert!(backend.seen.lock().unwrap()[0].prompt.media.is_some());
    }

    #[tokio::test]
    async fn out_of_range_probability_is_rejected() {
        let backend = ScriptedBackend::answering(json!({
            "analysis": {
                "acneProbability": 72,
                "otherConditionProbability": 0.1,
                "conditionName": "Acne",
                "confidenceLevel": "High",
                "recommendation": "r"
            }
        }));
        let err = HealthAssistant::new(backend)
            .analyze_skin(SkinAnalysisRequest {
                photo_data_uri: "data:image/png;base64,iVBORw0KGgo=".to_string(),
                extracted_text: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "schema_validation_error");
    }

    #[tokio::test]
    async fn hospital_search_uses_the_tool() {
        let hospitals = lookup_hospitals("Jaipur");
        let backend = ScriptedBackend::new(vec![
            Ok(tool_call("1", "findHospitals", json!({ "city": "Jaipur" }))),
            Ok(ModelTurn::Answer(
                json!({ "summary": "I found 5 hospitals for you in Jaipur.", "hospitals": hospitals })
                    .to_string(),
            )),
        ]);

        let response = HealthAssistant::new(backend)
            .handle(CapabilityRequest::HospitalSearch(HospitalSearchRequest {
                query: "hospitals in jaipur".to_string(),
                extracted_text: None,
            }))
            .await
            .unwrap();

        match response {
            CapabilityResponse::HospitalSearch(result) => {
                assert_eq!(result.hospitals, hospitals);
                assert_eq!(
                    result.hospitals[3].emergency_doctor_availability,
                    EmergencyAvailability::Unavailable
                );
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_dispatches_through_handle() {
        let backend = ScriptedBackend::answering(json!({ "response": "* Stay hydrated" }));
        let response = HealthAssistant::new(backend)
            .handle(CapabilityRequest::Chat(ChatRequest {
                message: "tips for a cold?".to_string(),
                extracted_text: None,
            }))
            .await
            .unwrap();
        assert_eq!(
            response,
            CapabilityResponse::Chat(ChatReply {
                response: "* Stay hydrated".to_string()
            })
        );
    }

    #[tokio::test]
    async fn handle_renders_the_template_selected_by_the_tag() {
        let request = CapabilityRequest::Chat(ChatRequest {
            message: "is 7 hours of sleep enough?".to_string(),
            extracted_text: Some("Age 34".to_string()),
        });
        let backend = ScriptedBackend::answering(json!({ "response": "* Usually, yes" }));
        HealthAssistant::new(backend.clone())
            .handle(request.clone())
            .await
            .unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].prompt, render_prompt(&request).unwrap());
        assert!(seen[0].tools.is_empty());
    }
}
