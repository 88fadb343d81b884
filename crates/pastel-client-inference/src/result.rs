use crate::error::InferenceError;
use base64::{engine::general_purpose::STANDARD, Engine};
use pastel_client_core::messages::{InferenceOutputResult, InferenceUsageResponse};
use pastel_client_core::model_menu::InferenceType;
use pastel_client_core::Peer;

/// The decoded payload of an [`InferenceOutputResult`], shaped by
/// `inference_type` (spec §4.4 step 7).
#[derive(Clone, Debug, PartialEq)]
pub enum InferenceOutput {
    /// `text_to_image`: the result's JSON bag carries an `image` field
    /// whose value is itself base64; this is that field, decoded to raw
    /// image bytes.
    Image(Vec<u8>),
    /// `embedding_document`: the result's base64 payload decodes directly
    /// to zip bytes, with no JSON wrapper.
    EmbeddingZip(Vec<u8>),
    /// Any other inference type: the base64 payload decodes directly to
    /// UTF-8 text.
    Text(String),
}

impl InferenceOutput {
    /// Decode `result.inference_result_json_b64` per spec §4.4 step 7,
    /// dispatching on `inference_type` (the inference type string the
    /// caller originally requested, since the result itself does not
    /// restate it).
    pub fn decode(result: &InferenceOutputResult, inference_type: &str) -> Result<Self, InferenceError> {
        let raw = STANDARD
            .decode(&result.inference_result_json_b64)
            .map_err(|e| InferenceError::ProtocolViolation(format!("result payload is not valid base64: {e}")))?;

        if inference_type == InferenceType::TEXT_TO_IMAGE {
            let doc: serde_json::Value = serde_json::from_slice(&raw).map_err(|e| {
                InferenceError::ProtocolViolation(format!("text_to_image result is not valid JSON: {e}"))
            })?;
            let image_b64 = doc
                .get("image")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| InferenceError::ProtocolViolation("text_to_image result has no image field".to_string()))?;
            let image_bytes = STANDARD
                .decode(image_b64)
                .map_err(|e| InferenceError::ProtocolViolation(format!("image field is not valid base64: {e}")))?;
            Ok(InferenceOutput::Image(image_bytes))
        } else if inference_type == InferenceType::EMBEDDING_DOCUMENT {
            Ok(InferenceOutput::EmbeddingZip(raw))
        } else {
            let text = String::from_utf8(raw)
                .map_err(|e| InferenceError::ProtocolViolation(format!("result payload is not valid UTF-8: {e}")))?;
            Ok(InferenceOutput::Text(text))
        }
    }
}

/// The result of one `submit` call (spec §4.4): the responder, the signed
/// usage response and output result that will feed the audit validator,
/// and the decoded payload. Audit/validation results are attached by the
/// top-level `Client` facade, which is the only layer that knows whether
/// the audit feature is enabled (spec §4.4: "populated only when the
/// audit feature is enabled").
#[derive(Clone, Debug)]
pub struct InferenceOutcome {
    pub responder: Peer,
    pub usage_response: InferenceUsageResponse,
    pub output_result: InferenceOutputResult,
    pub decoded: InferenceOutput,
}
