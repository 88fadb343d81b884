//! Extracts the "fields of interest" spec §4.5 lists for audit voting, as
//! strings so a single majority-vote routine (see [`crate::validator::majority`])
//! can compare values of any underlying type.

use base64::{engine::general_purpose::STANDARD, Engine};
use pastel_client_core::messages::{InferenceOutputResult, InferenceUsageResponse};
use std::collections::HashMap;

/// Response fields audited per spec §4.5 step 3. `inference_request_id`
/// has no field of that name on [`InferenceUsageResponse`] — the message
/// only carries the request's hash, so that hash stands in as the proxy
/// (documented in the repository's design notes).
pub const RESPONSE_FIELD_NAMES: [&str; 8] = [
    "inference_response_id",
    "inference_request_id",
    "proposed_cost_in_credits",
    "remaining_credits_after",
    "tracking_address",
    "confirmation_patoshis",
    "max_block_height",
    "responder_signature",
];

/// Result fields audited per spec §4.5 step 3.
pub const RESULT_FIELD_NAMES: [&str; 7] = [
    "inference_result_id",
    "inference_request_id",
    "inference_response_id",
    "responder_identity",
    "payload_prefix",
    "file_type_strings",
    "responder_signature_on_result_id",
];

pub fn response_fields(r: &InferenceUsageResponse) -> HashMap<&'static str, String> {
    let mut m = HashMap::with_capacity(RESPONSE_FIELD_NAMES.len());
    m.insert("inference_response_id", r.inference_response_id.to_string());
    m.insert("inference_request_id", r.sha3_256_hash_of_inference_request_fields.clone());
    m.insert("proposed_cost_in_credits", r.proposed_cost_in_inference_credits.to_string());
    m.insert("remaining_credits_after", r.remaining_credits_after_request.to_string());
    m.insert("tracking_address", r.credit_usage_tracking_psl_address.clone());
    m.insert(
        "confirmation_patoshis",
        r.request_confirmation_message_amount_in_patoshis.to_string(),
    );
    m.insert(
        "max_block_height",
        r.max_block_height_to_include_confirmation_transaction.to_string(),
    );
    m.insert("responder_signature", r.responding_supernode_signature_on_response_hash.clone());
    m
}

pub fn result_fields(r: &InferenceOutputResult) -> HashMap<&'static str, String> {
    let mut m = HashMap::with_capacity(RESULT_FIELD_NAMES.len());
    m.insert("inference_result_id", r.inference_result_id.to_string());
    m.insert("inference_request_id", r.inference_request_id.to_string());
    m.insert("inference_response_id", r.inference_response_id.to_string());
    m.insert("responder_identity", r.responding_supernode_pastelid.to_string());
    m.insert("payload_prefix", base64_payload_prefix(&r.inference_result_json_b64));
    m.insert("file_type_strings", r.inference_result_file_type_strings.join(","));
    m.insert(
        "responder_signature_on_result_id",
        r.responding_supernode_signature_on_result_id.clone(),
    );
    m
}

/// Hex-encoded first 32 raw bytes of the decoded base64 payload (spec
/// §4.5: "first-32-bytes of base64 payload"). Malformed base64 hashes to
/// an empty prefix rather than failing the whole audit call.
fn base64_payload_prefix(b64: &str) -> String {
    let raw = STANDARD.decode(b64).unwrap_or_default();
    let take = raw.len().min(32);
    hex::encode(&raw[..take])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_prefix_truncates_to_32_bytes() {
        let payload = STANDARD.encode([7u8; 64]);
        let prefix = base64_payload_prefix(&payload);
        assert_eq!(prefix, hex::encode([7u8; 32]));
    }

    #[test]
    fn payload_prefix_handles_short_payloads() {
        let payload = STANDARD.encode([9u8; 4]);
        let prefix = base64_payload_prefix(&payload);
        assert_eq!(prefix, hex::encode([9u8; 4]));
    }
}
