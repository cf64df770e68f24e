//! Fixed instruction templates, one per capability.
//!
//! Placeholders are written `{{name}}` and filled in a single left-to-right
//! pass; substituted text is never scanned again, so user input containing
//! braces is inert. The blood report formatting rules are generated from
//! [`BLOOD_REPORT_FORMAT`] so the renderer and the section parser cannot
//! drift apart.

use crate::capability::{
    BloodReportRequest, Capability, CapabilityRequest, ChatRequest, HospitalSearchRequest,
    SkinAnalysisRequest,
};
use crate::error::{FlowError, RenderError};
use crate::extract::{DataUri, validate_image};
use crate::hospitals::{FIND_HOSPITALS_TOOL, SUPPORTED_CITIES};
use crate::sections::{BLOOD_REPORT_FORMAT, SectionFormat};

const BLOOD_REPORT_TEMPLATE: &str = "\
You are a medical expert skilled in analyzing blood reports. Provide a well-structured \
analysis of these CBC results with clear sections.

CRITICAL INSTRUCTIONS:
{{format_rules}}

Here is the blood report:
{{report_text}}";

const SKIN_ANALYSIS_TEMPLATE: &str = "\
You are a dermatology AI assistant. Analyze the attached skin image for potential skin \
conditions, providing probability measures and confidence levels. If results are uncertain, \
gently encourage the user to consult with a human doctor.{{context}}";

const CHAT_TEMPLATE: &str = "\
You are MediAI, a friendly and helpful AI health assistant.

Your capabilities include:
- Analyzing skin images for conditions like acne.
- Summarizing blood report PDFs.
- Finding nearby hospitals in major Indian cities.
- Answering general health-related questions.

Engage in a helpful conversation with the user.

IMPORTANT: When providing any explanation or information, you MUST use bullet points or a \
numbered list. Do not write long paragraphs. Keep responses concise and easy to read. Be \
encouraging and always remind the user to consult a qualified healthcare professional for \
any medical advice or diagnosis. Do not provide medical advice yourself.

User message: {{message}}{{context}}";

const HOSPITAL_SEARCH_TEMPLATE: &str = "\
You are a helpful assistant for finding medical facilities in India.

A user has asked to find hospitals. Use the {{tool}} tool to get a list of hospitals for the \
specified location.

If the user asks for a city not in the supported list, inform them that you can only search \
in the supported cities: {{cities}}.

Once you have the list, write a brief, one-sentence summary for the user. For example: \
\"I found 5 hospitals for you in Mumbai.\"

Then return the full list of hospitals you found.

User query: {{query}}{{context}}";

/// A named template body with `{{placeholder}}` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub body: &'static str,
}

impl PromptTemplate {
    pub fn for_capability(capability: Capability) -> Self {
        let (name, body) = match capability {
            Capability::BloodReport => ("blood_report", BLOOD_REPORT_TEMPLATE),
            Capability::SkinAnalysis => ("skin_analysis", SKIN_ANALYSIS_TEMPLATE),
            Capability::Chat => ("chat", CHAT_TEMPLATE),
            Capability::HospitalSearch => ("hospital_search", HOSPITAL_SEARCH_TEMPLATE),
        };
        Self { name, body }
    }

    /// Substitute every placeholder with its value from `values`.
    ///
    /// Every placeholder in the body must have a value; unused values are
    /// allowed.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, RenderError> {
        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body;

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| RenderError::Unterminated(self.name.to_string()))?;
            let placeholder = after[..close].trim();

            if !is_identifier(placeholder) {
                return Err(RenderError::UnknownPlaceholder {
                    template: self.name.to_string(),
                    placeholder: placeholder.to_string(),
                });
            }
            let value = values
                .iter()
                .find(|(key, _)| *key == placeholder)
                .map(|(_, value)| *value)
                .ok_or_else(|| RenderError::MissingValue {
                    template: self.name.to_string(),
                    placeholder: placeholder.to_string(),
                })?;

            out.push_str(value);
            rest = &after[close + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A prompt ready for the generation invoker, with the image to attach if
/// the capability consumes one.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub capability: Capability,
    pub text: String,
    pub media: Option<DataUri>,
}

/// The numbered formatting rules for a sectioned answer.
pub fn format_rules(format: &SectionFormat) -> String {
    let headings = format
        .headings
        .iter()
        .map(|h| format!("\"{h}\""))
        .collect::<Vec<_>>();
    let listed = match headings.split_last() {
        Some((last, [])) => last.clone(),
        Some((last, init)) => format!("{}, and {last}", init.join(", ")),
        None => String::new(),
    };

    [
        format!(
            "Provide {} distinct sections with these exact headings, in this order: {listed}.",
            headings.len()
        ),
        "Each heading must be on its own line.".to_string(),
        format!(
            "Under each heading, provide a list of bullet points, each on its own line starting with '{}'.",
            format.marker
        ),
        "Do not use any other markup (like '##' or bolding with '**').".to_string(),
        "Keep the language simple and easy to understand.".to_string(),
        "Be concise.".to_string(),
    ]
    .iter()
    .enumerate()
    .map(|(i, rule)| format!("{}. {rule}", i + 1))
    .collect::<Vec<_>>()
    .join("\n")
}

fn context_block(extracted_text: Option<&str>) -> String {
    match extracted_text.map(str::trim) {
        Some(text) if !text.is_empty() => format!("\n\nAdditional context:\n{text}"),
        _ => String::new(),
    }
}

pub fn render_blood_report(report_text: &str) -> Result<RenderedPrompt, RenderError> {
    let rules = format_rules(&BLOOD_REPORT_FORMAT);
    let text = PromptTemplate::for_capability(Capability::BloodReport).render(&[
        ("format_rules", rules.as_str()),
        ("report_text", report_text.trim()),
    ])?;
    Ok(RenderedPrompt {
        capability: Capability::BloodReport,
        text,
        media: None,
    })
}

pub fn render_skin_analysis(request: &SkinAnalysisRequest) -> Result<RenderedPrompt, FlowError> {
    let image = validate_image(&request.photo_data_uri)?;
    let context = context_block(request.extracted_text.as_deref());
    let text = PromptTemplate::for_capability(Capability::SkinAnalysis)
        .render(&[("context", context.as_str())])?;
    Ok(RenderedPrompt {
        capability: Capability::SkinAnalysis,
        text,
        media: Some(image),
    })
}

pub fn render_chat(request: &ChatRequest) -> Result<RenderedPrompt, RenderError> {
    let context = context_block(request.extracted_text.as_deref());
    let text = PromptTemplate::for_capability(Capability::Chat)
        .render(&[("message", request.message.trim()), ("context", context.as_str())])?;
    Ok(RenderedPrompt {
        capability: Capability::Chat,
        text,
        media: None,
    })
}

pub fn render_hospital_search(
    request: &HospitalSearchRequest,
) -> Result<RenderedPrompt, RenderError> {
    let cities = SUPPORTED_CITIES.join(", ");
    let context = context_block(request.extracted_text.as_deref());
    let text = PromptTemplate::for_capability(Capability::HospitalSearch).render(&[
        ("tool", FIND_HOSPITALS_TOOL),
        ("cities", cities.as_str()),
        ("query", request.query.trim()),
        ("context", context.as_str()),
    ])?;
    Ok(RenderedPrompt {
        capability: Capability::HospitalSearch,
        text,
        media: None,
    })
}

/// Select and fill the template for `request`.
///
/// A blood report request must already carry its extracted text.
pub fn render_prompt(request: &CapabilityRequest) -> Result<RenderedPrompt, FlowError> {
    match request {
        CapabilityRequest::BloodReport(BloodReportRequest { extracted_text, .. }) => {
            let report_text =
                extracted_text
                    .as_deref()
                    .ok_or_else(|| RenderError::MissingValue {
                        template: "blood_report".to_string(),
                        placeholder: "report_text".to_string(),
                    })?;
            Ok(render_blood_report(report_text)?)
        }
        CapabilityRequest::SkinAnalysis(r) => render_skin_analysis(r),
        CapabilityRequest::Chat(r) => Ok(render_chat(r)?),
        CapabilityRequest::HospitalSearch(r) => Ok(render_hospital_search(r)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::sections::{BLOOD_REPORT_HEADINGS, ParsedSection};

    #[test]
    fn substitutes_in_a_single_pass() {
        let rendered = render_chat(&ChatRequest {
            message: "what does {{context}} mean?".to_string(),
            extracted_text: None,
        })
        .unwrap();
        assert!(rendered.text.ends_with("User message: what does {{context}} mean?"));
    }

    #[test]
    fn missing_and_unterminated_placeholders_fail() {
        let template = PromptTemplate {
            name: "t",
            body: "Hello {{who}}",
        };
        assert_eq!(
            template.render(&[]),
            Err(RenderError::MissingValue {
                template: "t".to_string(),
                placeholder: "who".to_string(),
            })
        );

        let broken = PromptTemplate {
            name: "broken",
            body: "Hello {{who",
        };
        assert_eq!(
            broken.render(&[("who", "x")]),
            Err(RenderError::Unterminated("broken".to_string()))
        );

        let odd = PromptTemplate {
            name: "odd",
            body: "Hello {{ who? }}",
        };
        assert!(matches!(
            odd.render(&[]),
            Err(RenderError::UnknownPlaceholder { .. })
        ));
    }

    #[test]
    fn every_template_renders_with_its_values() {
        let requests = [
            CapabilityRequest::BloodReport(BloodReportRequest {
                pdf_data_uri: String::new(),
                extracted_text: Some("WBC 11.2".to_string()),
            }),
            CapabilityRequest::SkinAnalysis(SkinAnalysisRequest {
                photo_data_uri: "data:image/png;base64,iVBORw0KGgo=".to_string(),
                extracted_text: None,
            }),
            CapabilityRequest::Chat(ChatRequest {
                message: "hi".to_string(),
                extracted_text: None,
            }),
            CapabilityRequest::HospitalSearch(HospitalSearchRequest {
                query: "hospitals in Pune".to_string(),
                extracted_text: None,
            }),
        ];
        for request in &requests {
            let rendered = render_prompt(request).unwrap();
            assert_eq!(rendered.capability, request.capability());
            assert!(!rendered.text.contains("{{"), "{}", rendered.text);
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = render_blood_report("Hemoglobin 14").unwrap();
        let b = render_blood_report("Hemoglobin 14").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blood_report_without_text_is_a_render_error() {
        let request = CapabilityRequest::BloodReport(BloodReportRequest {
            pdf_data_uri: String::new(),
            extracted_text: None,
        });
        assert!(matches!(render_prompt(&request), Err(FlowError::Render(_))));
    }

    #[test]
    fn skin_prompt_attaches_image_and_rejects_other_media() {
        let rendered = render_skin_analysis(&SkinAnalysisRequest {
            photo_data_uri: "data:image/jpeg;base64,/9j/4AAQ".to_string(),
            extracted_text: Some("Itchy for two weeks".to_string()),
        })
        .unwrap();
        assert_eq!(rendered.media.map(|m| m.media_type).as_deref(), Some("image/jpeg"));
        assert!(rendered.text.contains("Additional context:\nItchy for two weeks"));

        let err = render_skin_analysis(&SkinAnalysisRequest {
            photo_data_uri: "data:application/pdf;base64,AAAA".to_string(),
            extracted_text: None,
        })
        .unwrap_err();
        assert_eq!(
            err,
            FlowError::Extraction(ExtractionError::UnsupportedFormat(
                "'application/pdf' is not one of image/png, image/jpeg, image/webp".to_string()
            ))
        );
    }

    #[test]
    fn hospital_prompt_names_tool_and_cities() {
        let rendered = render_hospital_search(&HospitalSearchRequest {
            query: "hospitals in Delhi".to_string(),
            extracted_text: None,
        })
        .unwrap();
        assert!(rendered.text.contains("Use the findHospitals tool"));
        assert!(rendered.text.contains("Mumbai, Delhi, Bangalore"));
    }

    #[test]
    fn parser_recovers_instructed_titles_in_order() {
        let prompt = render_blood_report("RBC 4.9").unwrap().text;

        let mut instructed: Vec<(usize, &str)> = BLOOD_REPORT_HEADINGS
            .iter()
            .map(|h| (prompt.find(&format!("\"{h}\"")).expect("heading named in prompt"), *h))
            .collect();
        instructed.sort();
        let instructed: Vec<&str> = instructed.into_iter().map(|(_, h)| h).collect();

        let synthetic: Vec<ParsedSection> = instructed
            .iter()
            .map(|title| ParsedSection {
                title: title.to_string(),
                bullets: vec![format!("point about {title}")],
            })
            .collect();
        let response = BLOOD_REPORT_FORMAT.render(&synthetic);

        let titles: Vec<String> = BLOOD_REPORT_FORMAT
            .parse(&response)
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, instructed);
    }
}
