//! Data URI handling and PDF text extraction.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::ExtractionError;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const IMAGE_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

/// A `data:<media-type>;base64,<payload>` string split into its parts.
/// The payload is kept encoded until [`DataUri::decode`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub media_type: String,
    pub payload: String,
}

impl DataUri {
    pub fn parse(uri: &str) -> Result<Self, ExtractionError> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ExtractionError::Decode("missing 'data:' prefix".to_string()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ExtractionError::Decode("missing ',' before payload".to_string()))?;

        let mut params = header.split(';');
        let media_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(ExtractionError::Decode(
                "payload is not declared as base64".to_string(),
            ));
        }

        Ok(Self {
            media_type,
            payload: payload.trim().to_string(),
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>, ExtractionError> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| ExtractionError::Decode(e.to_string()))
    }

    pub fn is_image(&self) -> bool {
        IMAGE_MEDIA_TYPES.contains(&self.media_type.as_str())
    }
}

impl FromStr for DataUri {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Extract the text of every page of a PDF data URI, in page order,
/// joined with newlines.
pub fn extract_pdf_text(data_uri: &str) -> Result<String, ExtractionError> {
    let uri = DataUri::parse(data_uri)?;
    if uri.media_type != PDF_MEDIA_TYPE {
        return Err(ExtractionError::UnsupportedFormat(format!(
            "'{}' is not a PDF document",
            uri.media_type
        )));
    }

    let bytes = uri.decode()?;
    debug!(bytes = bytes.len(), "Decoded PDF payload");

    let pages = extract_pages(&bytes)?;
    info!(pages = pages.len(), "Extracted text from PDF");

    Ok(pages
        .iter()
        .map(|page| page.trim())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Same as [`extract_pdf_text`] but runs on the blocking pool; PDF parsing
/// is CPU-bound.
pub async fn extract_pdf_text_blocking(data_uri: String) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || extract_pdf_text(&data_uri))
        .await
        .map_err(|e| ExtractionError::Extraction(format!("extraction task failed: {e}")))?
}

fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    // pdf-extract panics on some malformed cross-reference tables.
    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractionError::Extraction("PDF parser aborted on corrupt input".to_string()))?
        .map_err(|e| ExtractionError::Extraction(e.to_string()))
}

/// Check an image data URI without decoding it; the model consumes the
/// image directly.
pub fn validate_image(data_uri: &str) -> Result<DataUri, ExtractionError> {
    let uri = DataUri::parse(data_uri)?;
    if !uri.is_image() {
        return Err(ExtractionError::UnsupportedFormat(format!(
            "'{}' is not one of {}",
            uri.media_type,
            IMAGE_MEDIA_TYPES.join(", ")
        )));
    }
    if uri.payload.is_empty() {
        return Err(ExtractionError::Decode("image payload is empty".to_string()));
    }
    Ok(uri)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// Build a PDF with one Helvetica text line per page.
    pub(crate) fn make_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids = Vec::new();
        for text in pages {
            let content = format!("BT /F1 12 Tf 72 700 Td ({text}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    pub(crate) fn pdf_data_uri(pages: &[&str]) -> String {
        format!("data:application/pdf;base64,{}", STANDARD.encode(make_pdf(pages)))
    }

    #[test]
    fn parses_data_uri_parts() {
        let uri = DataUri::parse("data:Image/PNG;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(uri.media_type, "image/png");
        assert_eq!(uri.payload, "iVBORw0KGgo=");
        assert!(uri.is_image());
    }

    #[test]
    fn rejects_uri_without_base64_marker() {
        let err = DataUri::parse("data:application/pdf,plain").unwrap_err();
        assert!(matches!(err, ExtractionError::Decode(_)));
    }

    #[test]
    fn extracts_pages_in_order() {
        let uri = pdf_data_uri(&["Hemoglobin 13.5 g/dL", "Platelets 250000"]);
        let text = extract_pdf_text(&uri).unwrap();

        let hemoglobin = text.find("Hemoglobin").expect("first page text");
        let platelets = text.find("Platelets").expect("second page text");
        assert!(hemoglobin < platelets, "page order lost: {text}");
    }

    #[test]
    fn malformed_base64_is_decode_error() {
        let err = extract_pdf_text("data:application/pdf;base64,@@not*base64@@").unwrap_err();
        assert!(matches!(err, ExtractionError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn non_pdf_media_type_is_unsupported() {
        let err = extract_pdf_text("data:text/plain;base64,aGVsbG8=").unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(_)));
    }

    #[test]
    fn corrupt_pdf_is_extraction_error() {
        let uri = format!("data:application/pdf;base64,{}", STANDARD.encode(b"not a pdf"));
        let err = extract_pdf_text(&uri).unwrap_err();
        assert!(matches!(err, ExtractionError::Extraction(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn blocking_variant_matches() {
        let uri = pdf_data_uri(&["Glucose 92 mg/dL"]);
        let text = extract_pdf_text_blocking(uri).await.unwrap();
        assert!(text.contains("Glucose"));
    }

    #[test]
    fn image_validation() {
        assert!(validate_image("data:image/jpeg;base64,/9j/4AAQ").is_ok());
        assert!(matches!(
            validate_image("data:image/gif;base64,R0lGOD"),
            Err(ExtractionError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            validate_image("data:image/webp;base64,"),
            Err(ExtractionError::Decode(_))
        ));
    }
}
