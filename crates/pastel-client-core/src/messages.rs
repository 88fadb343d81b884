//! Concrete message kinds of the credit-pack purchase and inference
//! request protocols (spec §3). Every struct implements [`Envelope`] so
//! the crypto crate can canonicalize, hash, sign, and verify it uniformly.
//!
//! Field names are deliberately verbose and follow the wire vocabulary
//! quoted throughout spec §3/§4/§6 (`sha3_256_hash_of_..._fields`,
//! `..._pastelid`, `..._signature_on_..._hash`) so that a canonical form
//! produced here matches what a peer implementation of the same protocol
//! would produce.

use crate::envelope::Envelope;
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Routing tag for the persistence façade (spec §4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    CreditPackPurchaseRequest,
    PreliminaryPriceQuote,
    PriceQuoteResponse,
    CreditPackPurchaseResponse,
    PurchaseConfirmation,
    PurchaseStatus,
    StorageRetryRequest,
    StorageRetryResponse,
    CompletionAnnouncement,
    InferenceUsageRequest,
    InferenceUsageResponse,
    InferenceConfirmation,
    InferenceOutputResult,
}

impl MessageKind {
    /// Stable name for a persistence backend's table/tree per kind.
    pub fn tree_name(self) -> &'static str {
        match self {
            MessageKind::CreditPackPurchaseRequest => "credit_pack_purchase_request",
            MessageKind::PreliminaryPriceQuote => "preliminary_price_quote",
            MessageKind::PriceQuoteResponse => "price_quote_response",
            MessageKind::CreditPackPurchaseResponse => "credit_pack_purchase_response",
            MessageKind::PurchaseConfirmation => "purchase_confirmation",
            MessageKind::PurchaseStatus => "purchase_status",
            MessageKind::StorageRetryRequest => "storage_retry_request",
            MessageKind::StorageRetryResponse => "storage_retry_response",
            MessageKind::CompletionAnnouncement => "completion_announcement",
            MessageKind::InferenceUsageRequest => "inference_usage_request",
            MessageKind::InferenceUsageResponse => "inference_usage_response",
            MessageKind::InferenceConfirmation => "inference_confirmation",
            MessageKind::InferenceOutputResult => "inference_output_result",
        }
    }
}

/// A typed rejection or termination object a peer may return instead of
/// the expected response (spec §6.2): "a peer may respond with a typed
/// rejection or termination object; engines must detect these by the
/// presence of `rejection_reason_string` or `termination_reason_string`".
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeerOutcome<T> {
    Accepted(T),
    Rejected { rejection_reason_string: String },
    Terminated { termination_reason_string: String },
}

impl<T> PeerOutcome<T> {
    pub fn into_accepted(self) -> Result<T, crate::error::ProtocolError> {
        match self {
            PeerOutcome::Accepted(v) => Ok(v),
            PeerOutcome::Rejected {
                rejection_reason_string,
            } => Err(crate::error::ProtocolError::PeerRejection {
                reason: rejection_reason_string,
            }),
            PeerOutcome::Terminated {
                termination_reason_string,
            } => Err(crate::error::ProtocolError::PeerRejection {
                reason: termination_reason_string,
            }),
        }
    }
}

macro_rules! envelope_impl {
    ($ty:ident, hash = $hash_field:literal, sig = $sig_field:literal,
     ts = $ts_field:ident, height = $height_field:ident, version = $version_field:ident,
     hash_field_ident = $hash_ident:ident, sig_field_ident = $sig_ident:ident) => {
        impl Envelope for $ty {
            const HASH_FIELD: &'static str = $hash_field;
            const SIGNATURE_FIELD: &'static str = $sig_field;

            fn timestamp(&self) -> DateTime<Utc> {
                self.$ts_field
            }
            fn block_height(&self) -> u64 {
                self.$height_field
            }
            fn version(&self) -> &str {
                &self.$version_field
            }
            fn hash_value(&self) -> &str {
                &self.$hash_ident
            }
            fn signature_value(&self) -> &str {
                &self.$sig_ident
            }
        }
    };
}

// ── Credit-Pack Purchase Request (CPPR) ───────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreditPackPurchaseRequest {
    pub requesting_end_user_pastelid: Identity,
    pub requested_initial_credits_in_credit_pack: u64,
    pub list_of_authorized_pastelids_allowed_to_use_credit_pack: Vec<Identity>,
    pub credit_usage_tracking_psl_address: String,
    pub credit_pack_purchase_request_utc_timestamp: DateTime<Utc>,
    pub credit_pack_purchase_request_pastel_block_height: u64,
    pub credit_pack_purchase_request_version: String,
    pub sha3_256_hash_of_credit_pack_purchase_request_fields: String,
    pub requesting_end_user_pastelid_signature_on_request_hash: String,
}

envelope_impl!(
    CreditPackPurchaseRequest,
    hash = "sha3_256_hash_of_credit_pack_purchase_request_fields",
    sig = "requesting_end_user_pastelid_signature_on_request_hash",
    ts = credit_pack_purchase_request_utc_timestamp,
    height = credit_pack_purchase_request_pastel_block_height,
    version = credit_pack_purchase_request_version,
    hash_field_ident = sha3_256_hash_of_credit_pack_purchase_request_fields,
    sig_field_ident = requesting_end_user_pastelid_signature_on_request_hash
);

// ── Preliminary Price Quote ───────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PreliminaryPriceQuote {
    pub sha3_256_hash_of_credit_pack_purchase_request_fields: String,
    pub credit_usage_tracking_psl_address: String,
    pub preliminary_quoted_price_per_credit_in_psl: f64,
    pub preliminary_total_cost_of_credit_pack_in_psl: f64,
    pub responding_supernode_pastelid: Identity,
    pub preliminary_price_quote_utc_timestamp: DateTime<Utc>,
    pub preliminary_price_quote_pastel_block_height: u64,
    pub preliminary_price_quote_version: String,
    pub sha3_256_hash_of_preliminary_price_quote_fields: String,
    pub responding_supernode_signature_on_price_quote_hash: String,
}

envelope_impl!(
    PreliminaryPriceQuote,
    hash = "sha3_256_hash_of_preliminary_price_quote_fields",
    sig = "responding_supernode_signature_on_price_quote_hash",
    ts = preliminary_price_quote_utc_timestamp,
    height = preliminary_price_quote_pastel_block_height,
    version = preliminary_price_quote_version,
    hash_field_ident = sha3_256_hash_of_preliminary_price_quote_fields,
    sig_field_ident = responding_supernode_signature_on_price_quote_hash
);

// ── Price-Quote Response ──────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PriceQuoteResponse {
    pub sha3_256_hash_of_credit_pack_purchase_request_fields: String,
    pub sha3_256_hash_of_preliminary_price_quote_fields: String,
    pub agree_with_preliminary_price_quote: bool,
    pub requesting_end_user_pastelid: Identity,
    pub credit_pack_purchase_price_quote_response_utc_timestamp: DateTime<Utc>,
    pub credit_pack_purchase_price_quote_response_pastel_block_height: u64,
    pub credit_pack_purchase_price_quote_response_version: String,
    pub sha3_256_hash_of_price_quote_response_fields: String,
    pub requesting_end_user_pastelid_signature_on_price_quote_response_hash: String,
}

envelope_impl!(
    PriceQuoteResponse,
    hash = "sha3_256_hash_of_price_quote_response_fields",
    sig = "requesting_end_user_pastelid_signature_on_price_quote_response_hash",
    ts = credit_pack_purchase_price_quote_response_utc_timestamp,
    height = credit_pack_purchase_price_quote_response_pastel_block_height,
    version = credit_pack_purchase_price_quote_response_version,
    hash_field_ident = sha3_256_hash_of_price_quote_response_fields,
    sig_field_ident = requesting_end_user_pastelid_signature_on_price_quote_response_hash
);

// ── Credit-Pack Purchase Response (CPPRR) — the quorum-signed offer ──────────

/// `selected_agreeing_supernodes_signatures_dict`: signer identity → that
/// signer's signature over [`CreditPackPurchaseResponse::sha3_256_hash_of_credit_pack_purchase_response_fields`]
/// (Glossary's "signature over the canonical hash of the purchase
/// response"; see DESIGN.md for why this crate signs that single hash
/// rather than the "two hashes" spec §3's prose also mentions).
pub type QuorumSignatureDict = HashMap<String, String>;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreditPackPurchaseResponse {
    pub sha3_256_hash_of_credit_pack_purchase_request_fields: String,
    pub psl_cost_per_credit: f64,
    pub proposed_total_cost_of_credit_pack_in_psl: f64,
    pub credit_usage_tracking_psl_address: String,
    pub best_block_merkle_root: String,
    pub best_block_height: u64,
    pub list_of_potentially_agreeing_supernodes: Vec<Identity>,
    pub list_of_supernode_pastelids_agreeing_to_credit_pack_purchase_terms_selected_for_signature_inclusion:
        Vec<Identity>,
    pub selected_agreeing_supernodes_signatures_dict: QuorumSignatureDict,
    pub responding_supernode_pastelid: Identity,
    pub credit_pack_purchase_response_utc_timestamp: DateTime<Utc>,
    pub credit_pack_purchase_response_pastel_block_height: u64,
    pub credit_pack_purchase_response_version: String,
    pub sha3_256_hash_of_credit_pack_purchase_response_fields: String,
    pub responding_supernode_signature_on_response_hash: String,
}

impl CreditPackPurchaseResponse {
    /// The quorum dict embeds signatures computed *over*
    /// `sha3_256_hash_of_credit_pack_purchase_response_fields`, so it must
    /// be excluded from canonicalization along with the ordinary hash and
    /// signature fields, or recomputing the hash would be circular.
    pub const SIGNATURE_DICT_FIELD: &'static str =
        "selected_agreeing_supernodes_signatures_dict";
}

impl Envelope for CreditPackPurchaseResponse {
    const HASH_FIELD: &'static str = "sha3_256_hash_of_credit_pack_purchase_response_fields";
    const SIGNATURE_FIELD: &'static str = "responding_supernode_signature_on_response_hash";

    fn timestamp(&self) -> DateTime<Utc> {
        self.credit_pack_purchase_response_utc_timestamp
    }
    fn block_height(&self) -> u64 {
        self.credit_pack_purchase_response_pastel_block_height
    }
    fn version(&self) -> &str {
        &self.credit_pack_purchase_response_version
    }
    fn hash_value(&self) -> &str {
        &self.sha3_256_hash_of_credit_pack_purchase_response_fields
    }
    fn signature_value(&self) -> &str {
        &self.responding_supernode_signature_on_response_hash
    }

    /// Overridden to also exclude the quorum signature dict (see above).
    fn excluded_fields() -> &'static [&'static str] {
        &[
            Self::HASH_FIELD,
            Self::SIGNATURE_FIELD,
            Self::SIGNATURE_DICT_FIELD,
        ]
    }
}

// ── Purchase Confirmation ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PurchaseConfirmation {
    pub sha3_256_hash_of_credit_pack_purchase_request_fields: String,
    pub sha3_256_hash_of_credit_pack_purchase_response_fields: String,
    pub txid_of_credit_purchase_burn_transaction: String,
    pub requesting_end_user_pastelid: Identity,
    pub credit_pack_purchase_confirmation_utc_timestamp: DateTime<Utc>,
    pub credit_pack_purchase_confirmation_pastel_block_height: u64,
    pub credit_pack_purchase_confirmation_version: String,
    pub sha3_256_hash_of_credit_pack_purchase_confirmation_fields: String,
    pub requesting_end_user_pastelid_signature_on_confirmation_hash: String,
}

envelope_impl!(
    PurchaseConfirmation,
    hash = "sha3_256_hash_of_credit_pack_purchase_confirmation_fields",
    sig = "requesting_end_user_pastelid_signature_on_confirmation_hash",
    ts = credit_pack_purchase_confirmation_utc_timestamp,
    height = credit_pack_purchase_confirmation_pastel_block_height,
    version = credit_pack_purchase_confirmation_version,
    hash_field_ident = sha3_256_hash_of_credit_pack_purchase_confirmation_fields,
    sig_field_ident = requesting_end_user_pastelid_signature_on_confirmation_hash
);

// ── Purchase Status ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatusValue {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PurchaseStatus {
    pub sha3_256_hash_of_credit_pack_purchase_confirmation_fields: String,
    pub status: PurchaseStatusValue,
    pub status_details: Option<String>,
    pub credit_pack_registration_txid: Option<String>,
    pub responding_supernode_pastelid: Identity,
    pub credit_pack_purchase_status_utc_timestamp: DateTime<Utc>,
    pub credit_pack_purchase_status_pastel_block_height: u64,
    pub credit_pack_purchase_status_version: String,
    pub sha3_256_hash_of_credit_pack_purchase_status_fields: String,
    pub responding_supernode_signature_on_status_hash: String,
}

envelope_impl!(
    PurchaseStatus,
    hash = "sha3_256_hash_of_credit_pack_purchase_status_fields",
    sig = "responding_supernode_signature_on_status_hash",
    ts = credit_pack_purchase_status_utc_timestamp,
    height = credit_pack_purchase_status_pastel_block_height,
    version = credit_pack_purchase_status_version,
    hash_field_ident = sha3_256_hash_of_credit_pack_purchase_status_fields,
    sig_field_ident = responding_supernode_signature_on_status_hash
);

// ── Storage Retry Request / Response ──────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageRetryRequest {
    pub sha3_256_hash_of_credit_pack_purchase_confirmation_fields: String,
    pub requesting_end_user_pastelid: Identity,
    pub closest_agreeing_supernode_pastelid: Identity,
    pub credit_pack_storage_retry_request_utc_timestamp: DateTime<Utc>,
    pub credit_pack_storage_retry_request_pastel_block_height: u64,
    pub credit_pack_storage_retry_request_version: String,
    pub sha3_256_hash_of_credit_pack_storage_retry_request_fields: String,
    pub requesting_end_user_pastelid_signature_on_storage_retry_request_hash: String,
}

envelope_impl!(
    StorageRetryRequest,
    hash = "sha3_256_hash_of_credit_pack_storage_retry_request_fields",
    sig = "requesting_end_user_pastelid_signature_on_storage_retry_request_hash",
    ts = credit_pack_storage_retry_request_utc_timestamp,
    height = credit_pack_storage_retry_request_pastel_block_height,
    version = credit_pack_storage_retry_request_version,
    hash_field_ident = sha3_256_hash_of_credit_pack_storage_retry_request_fields,
    sig_field_ident = requesting_end_user_pastelid_signature_on_storage_retry_request_hash
);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageRetryResponse {
    pub sha3_256_hash_of_credit_pack_storage_retry_request_fields: String,
    pub credit_pack_registration_txid: String,
    pub responding_supernode_pastelid: Identity,
    pub credit_pack_storage_retry_response_utc_timestamp: DateTime<Utc>,
    pub credit_pack_storage_retry_response_pastel_block_height: u64,
    pub credit_pack_storage_retry_response_version: String,
    pub sha3_256_hash_of_credit_pack_storage_retry_response_fields: String,
    pub responding_supernode_signature_on_storage_retry_response_hash: String,
}

envelope_impl!(
    StorageRetryResponse,
    hash = "sha3_256_hash_of_credit_pack_storage_retry_response_fields",
    sig = "responding_supernode_signature_on_storage_retry_response_hash",
    ts = credit_pack_storage_retry_response_utc_timestamp,
    height = credit_pack_storage_retry_response_pastel_block_height,
    version = credit_pack_storage_retry_response_version,
    hash_field_ident = sha3_256_hash_of_credit_pack_storage_retry_response_fields,
    sig_field_ident = responding_supernode_signature_on_storage_retry_response_hash
);

/// Broadcast after a successful storage retry (spec §4.3's "broadcast a
/// completion announcement to every agreeing peer").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreditPackPurchaseCompletionAnnouncement {
    pub sha3_256_hash_of_credit_pack_purchase_request_fields: String,
    pub credit_pack_registration_txid: String,
    pub announcing_pastelid: Identity,
    pub completion_announcement_utc_timestamp: DateTime<Utc>,
    pub completion_announcement_pastel_block_height: u64,
    pub completion_announcement_version: String,
    pub sha3_256_hash_of_completion_announcement_fields: String,
    pub announcing_pastelid_signature_on_completion_announcement_hash: String,
}

envelope_impl!(
    CreditPackPurchaseCompletionAnnouncement,
    hash = "sha3_256_hash_of_completion_announcement_fields",
    sig = "announcing_pastelid_signature_on_completion_announcement_hash",
    ts = completion_announcement_utc_timestamp,
    height = completion_announcement_pastel_block_height,
    version = completion_announcement_version,
    hash_field_ident = sha3_256_hash_of_completion_announcement_fields,
    sig_field_ident = announcing_pastelid_signature_on_completion_announcement_hash
);

// ── Inference Usage Request / Response ────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InferenceUsageRequest {
    pub inference_request_id: Uuid,
    pub credit_pack_ticket_registration_txid: String,
    pub requesting_user_pastelid: Identity,
    pub requested_model_canonical_string: String,
    pub model_inference_type_string: String,
    pub model_parameters_json_b64: String,
    pub model_input_data_json_b64: String,
    pub inference_request_utc_timestamp: DateTime<Utc>,
    pub inference_request_pastel_block_height: u64,
    pub inference_request_version: String,
    pub sha3_256_hash_of_inference_request_fields: String,
    pub requesting_user_pastelid_signature_on_request_hash: String,
}

envelope_impl!(
    InferenceUsageRequest,
    hash = "sha3_256_hash_of_inference_request_fields",
    sig = "requesting_user_pastelid_signature_on_request_hash",
    ts = inference_request_utc_timestamp,
    height = inference_request_pastel_block_height,
    version = inference_request_version,
    hash_field_ident = sha3_256_hash_of_inference_request_fields,
    sig_field_ident = requesting_user_pastelid_signature_on_request_hash
);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InferenceUsageResponse {
    pub inference_response_id: Uuid,
    pub sha3_256_hash_of_inference_request_fields: String,
    pub proposed_cost_in_inference_credits: f64,
    pub remaining_credits_after_request: f64,
    pub credit_usage_tracking_psl_address: String,
    pub request_confirmation_message_amount_in_patoshis: u64,
    pub max_block_height_to_include_confirmation_transaction: u64,
    pub responding_supernode_pastelid: Identity,
    pub inference_response_utc_timestamp: DateTime<Utc>,
    pub inference_response_pastel_block_height: u64,
    pub inference_response_version: String,
    pub sha3_256_hash_of_inference_response_fields: String,
    pub responding_supernode_signature_on_response_hash: String,
}

envelope_impl!(
    InferenceUsageResponse,
    hash = "sha3_256_hash_of_inference_response_fields",
    sig = "responding_supernode_signature_on_response_hash",
    ts = inference_response_utc_timestamp,
    height = inference_response_pastel_block_height,
    version = inference_response_version,
    hash_field_ident = sha3_256_hash_of_inference_response_fields,
    sig_field_ident = responding_supernode_signature_on_response_hash
);

// ── Inference Confirmation ────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InferenceConfirmation {
    pub inference_request_id: Uuid,
    pub requesting_user_pastelid: Identity,
    pub txid: String,
    pub inference_confirmation_utc_timestamp: DateTime<Utc>,
    pub inference_confirmation_pastel_block_height: u64,
    pub inference_confirmation_version: String,
    pub sha3_256_hash_of_inference_confirmation_fields: String,
    pub requesting_user_pastelid_signature_on_confirmation_hash: String,
}

envelope_impl!(
    InferenceConfirmation,
    hash = "sha3_256_hash_of_inference_confirmation_fields",
    sig = "requesting_user_pastelid_signature_on_confirmation_hash",
    ts = inference_confirmation_utc_timestamp,
    height = inference_confirmation_pastel_block_height,
    version = inference_confirmation_version,
    hash_field_ident = sha3_256_hash_of_inference_confirmation_fields,
    sig_field_ident = requesting_user_pastelid_signature_on_confirmation_hash
);

// ── Inference Output Result ───────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InferenceOutputResult {
    pub inference_result_id: Uuid,
    pub inference_response_id: Uuid,
    pub inference_request_id: Uuid,
    pub responding_supernode_pastelid: Identity,
    pub inference_result_file_type_strings: Vec<String>,
    pub inference_result_json_b64: String,
    pub inference_result_utc_timestamp: DateTime<Utc>,
    pub inference_result_pastel_block_height: u64,
    pub inference_result_version: String,
    pub sha3_256_hash_of_inference_result_fields: String,
    /// Signs `inference_result_id` specifically, not the whole-message
    /// hash (spec §4.5's "responder signature on result id"), but still
    /// named with the `_signature` suffix so the generic envelope
    /// exclusion rule applies when canonicalizing the rest of the fields.
    pub responding_supernode_signature_on_result_id: String,
}

envelope_impl!(
    InferenceOutputResult,
    hash = "sha3_256_hash_of_inference_result_fields",
    sig = "responding_supernode_signature_on_result_id",
    ts = inference_result_utc_timestamp,
    height = inference_result_pastel_block_height,
    version = inference_result_version,
    hash_field_ident = sha3_256_hash_of_inference_result_fields,
    sig_field_ident = responding_supernode_signature_on_result_id
);
