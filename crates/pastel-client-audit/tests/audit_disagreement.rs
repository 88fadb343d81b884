//! Audit-disagreement scenario against a mock supernode quorum (spec §8
//! scenario 6).
//!
//! Run with:
//!   cargo test -p pastel-client-audit --test audit_disagreement

use async_trait::async_trait;
use chrono::Utc;
use pastel_client_audit::AuditValidator;
use pastel_client_core::messages::{InferenceOutputResult, InferenceUsageResponse};
use pastel_client_core::{Identity, Peer, PeerStatus};
use pastel_client_crypto::{hash_fields, Signer};
use pastel_client_peers::{MasternodeSource, PeerRegistry};
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone)]
struct FakeChain;

#[derive(Debug, thiserror::Error)]
#[error("fake chain error")]
struct FakeChainError;

#[async_trait]
impl Signer for FakeChain {
    type Error = FakeChainError;
    async fn sign(&self, _identity: &Identity, hex_hash: &str, _passphrase: &str) -> Result<String, FakeChainError> {
        Ok(format!("sig-{hex_hash}"))
    }
}

struct FixedPeerList(Vec<Peer>);

#[async_trait]
impl MasternodeSource for FixedPeerList {
    type Error = FakeChainError;
    async fn masternode_list_full(&self) -> Result<Vec<Peer>, FakeChainError> {
        Ok(self.0.clone())
    }
}

fn make_peer(id: &str) -> Peer {
    let identity = Identity::new_unchecked(id);
    Peer {
        identity: identity.clone(),
        socket_addr: "127.0.0.1:7123".to_string(),
        status: PeerStatus::Enabled,
        protocol_version: "1.0".to_string(),
        rank: 1,
        ext_key: identity,
    }
}

async fn start_mock_server_on_protocol_port() -> MockServer {
    let listener = std::net::TcpListener::bind("127.0.0.1:7123").expect("bind fixed supernode port 7123 for test");
    MockServer::builder().listener(listener).start().await
}

fn usage_response(responder: &str, proposed_cost: f64) -> InferenceUsageResponse {
    let mut response = InferenceUsageResponse {
        inference_response_id: Uuid::new_v4(),
        sha3_256_hash_of_inference_request_fields: "0".repeat(64),
        proposed_cost_in_inference_credits: proposed_cost,
        remaining_credits_after_request: 1_880.0,
        credit_usage_tracking_psl_address: "tAddrTracking".to_string(),
        request_confirmation_message_amount_in_patoshis: 300_000,
        max_block_height_to_include_confirmation_transaction: 1_100,
        responding_supernode_pastelid: Identity::new_unchecked(responder),
        inference_response_utc_timestamp: Utc::now(),
        inference_response_pastel_block_height: 1_000,
        inference_response_version: "1.0".to_string(),
        sha3_256_hash_of_inference_response_fields: String::new(),
        responding_supernode_signature_on_response_hash: String::new(),
    };
    let hash = hash_fields(&response).unwrap();
    response.sha3_256_hash_of_inference_response_fields = hash.clone();
    response.responding_supernode_signature_on_response_hash = format!("sig-{hash}");
    response
}

fn output_result(responder: &str) -> InferenceOutputResult {
    let result_id = Uuid::new_v4();
    let mut result = InferenceOutputResult {
        inference_result_id: result_id,
        inference_response_id: Uuid::new_v4(),
        inference_request_id: Uuid::new_v4(),
        responding_supernode_pastelid: Identity::new_unchecked(responder),
        inference_result_file_type_strings: vec!["text/plain".to_string()],
        inference_result_json_b64: "aGVsbG8=".to_string(),
        inference_result_utc_timestamp: Utc::now(),
        inference_result_pastel_block_height: 1_000,
        inference_result_version: "1.0".to_string(),
        sha3_256_hash_of_inference_result_fields: String::new(),
        responding_supernode_signature_on_result_id: String::new(),
    };
    let hash = hash_fields(&result).unwrap();
    result.sha3_256_hash_of_inference_result_fields = hash;
    result.responding_supernode_signature_on_result_id = "sig-result".to_string();
    result
}

/// Five auditors are queried; three agree with the responder's claimed
/// `proposed_cost_in_inference_credits` of 120, two report 130. The
/// validator should report that field `true` (spec §8 scenario 6).
#[tokio::test]
async fn audit_reports_true_when_responder_matches_majority() {
    let server = start_mock_server_on_protocol_port().await;
    let client_identity = Identity::new_unchecked("requester-pastelid");
    let responder = Identity::new_unchecked("responder-pastelid");

    Mock::given(method("GET"))
        .and(path(format!("/request_challenge/{}", client_identity.as_str())))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "challenge": "deadbeef",
            "challenge_id": "chal-1",
        })))
        .mount(&server)
        .await;

    // Every auditor hits the same mock server (wiremock has no per-peer
    // routing on loopback:7123), so the "majority" here is just the
    // response mounted for this path — three-vs-two disagreement across
    // distinct peers is exercised at the unit level in
    // `validator::tests::majority_picks_strict_plurality`; this
    // integration test exercises the plumbing that gets a claimed field
    // compared against a single consistent auditor report.
    let auditor_response = usage_response("auditor-1", 120.0);
    Mock::given(method("POST"))
        .and(path("audit_inference_request_response"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Accepted": auditor_response })))
        .mount(&server)
        .await;

    let auditor_result = output_result("auditor-1");
    Mock::given(method("POST"))
        .and(path("audit_inference_request_result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Accepted": auditor_result })))
        .mount(&server)
        .await;

    // Four auditors, all routed to the same mock server.
    let auditors: Vec<Peer> = (0..4).map(|i| make_peer(&format!("auditor-{i}"))).collect();
    let registry = PeerRegistry::new(FixedPeerList(auditors));

    let validator = AuditValidator::new(FakeChain, Duration::from_secs(5));
    let original_response = usage_response(responder.as_str(), 120.0);
    let original_result = output_result(responder.as_str());

    let outcome = validator
        .audit(
            &registry,
            &client_identity,
            "passphrase",
            &responder,
            original_response.inference_response_id,
            &original_response,
            &original_result,
        )
        .await
        .expect("audit should succeed");

    assert_eq!(outcome.response_validation.get("proposed_cost_in_credits"), Some(&true));
    assert_eq!(outcome.response_validation.get("tracking_address"), Some(&true));
    // The responder identity differs (responder vs auditor-1), so
    // `responder_identity` on the result side disagrees with the auditors.
    assert_eq!(outcome.result_validation.get("responder_identity"), Some(&false));

    drop(server);
}
