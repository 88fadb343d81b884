//! End-to-end inference-request flow against a mock supernode (spec §8
//! scenarios 4 and 5).
//!
//! Run with:
//!   cargo test -p pastel-client-inference --test inference_flow

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use pastel_client_core::messages::{InferenceOutputResult, InferenceUsageResponse, MessageKind};
use pastel_client_core::{ChainFacade, ClientConfig, Envelope, Identity, Peer, PeerStatus};
use pastel_client_crypto::{hash_fields, Signer, Verifier};
use pastel_client_inference::{InferenceEngine, InferenceError, InferenceOutput};
use pastel_client_store::{MemoryStore, Store};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Clone)]
struct FakeChain {
    height: Arc<AtomicU64>,
    balance: Arc<std::sync::Mutex<f64>>,
    sent: Arc<std::sync::Mutex<Vec<(String, f64)>>>,
}

impl FakeChain {
    fn new(balance: f64) -> Self {
        Self {
            height: Arc::new(AtomicU64::new(1_000)),
            balance: Arc::new(std::sync::Mutex::new(balance)),
            sent: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("fake chain error")]
struct FakeChainError;

#[async_trait]
impl ChainFacade for FakeChain {
    type Error = FakeChainError;

    async fn best_block_height(&self) -> Result<u64, FakeChainError> {
        Ok(self.height.load(Ordering::Relaxed))
    }
    async fn best_block_merkle_root(&self) -> Result<String, FakeChainError> {
        Ok("0".repeat(64))
    }
    async fn send_to_address(&self, _address: &str, _amount: f64) -> Result<String, FakeChainError> {
        unimplemented!("not exercised by the inference flow")
    }
    async fn send_many(&self, from_account: &str, payments: HashMap<String, f64>, _memo: &str) -> Result<String, FakeChainError> {
        for (addr, amt) in payments {
            self.sent.lock().unwrap().push((addr, amt));
        }
        let _ = from_account;
        Ok("a".repeat(64))
    }
    async fn address_balance(&self, _address: &str) -> Result<f64, FakeChainError> {
        Ok(*self.balance.lock().unwrap())
    }
}

#[async_trait]
impl Signer for FakeChain {
    type Error = FakeChainError;
    async fn sign(&self, _identity: &Identity, hex_hash: &str, _passphrase: &str) -> Result<String, FakeChainError> {
        Ok(format!("sig-{hex_hash}"))
    }
}

#[async_trait]
impl Verifier for FakeChain {
    type Error = FakeChainError;
    async fn verify(&self, _identity: &Identity, _hex_hash: &str, _signature: &str) -> Result<bool, FakeChainError> {
        Ok(true)
    }
}

fn make_peer(id: &str, base_url: &str) -> Peer {
    let host = base_url.trim_start_matches("http://");
    let identity = Identity::new_unchecked(id);
    Peer {
        identity: identity.clone(),
        socket_addr: host.to_string(),
        status: PeerStatus::Enabled,
        protocol_version: "1.0".to_string(),
        rank: 1,
        ext_key: identity,
    }
}

async fn start_mock_server_on_protocol_port() -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:7123").expect("bind fixed supernode port 7123 for test");
    MockServer::builder().listener(listener).start().await
}

fn build_usage_response(responder: &str, proposed_cost: f64, amount_patoshis: u64) -> serde_json::Value {
    let mut response = InferenceUsageResponse {
        inference_response_id: Uuid::new_v4(),
        sha3_256_hash_of_inference_request_fields: "0".repeat(64),
        proposed_cost_in_inference_credits: proposed_cost,
        remaining_credits_after_request: 1_880.0,
        credit_usage_tracking_psl_address: "tAddrTracking".to_string(),
        request_confirmation_message_amount_in_patoshis: amount_patoshis,
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
    serde_json::to_value(response).unwrap()
}

fn build_output_result(responder: &str, result_text: &str) -> serde_json::Value {
    let result_id = Uuid::new_v4();
    let mut result = InferenceOutputResult {
        inference_result_id: result_id,
        inference_response_id: Uuid::new_v4(),
        inference_request_id: Uuid::new_v4(),
        responding_supernode_pastelid: Identity::new_unchecked(responder),
        inference_result_file_type_strings: vec!["text/plain".to_string()],
        inference_result_json_b64: STANDARD.encode(result_text.as_bytes()),
        inference_result_utc_timestamp: Utc::now(),
        inference_result_pastel_block_height: 1_000,
        inference_result_version: "1.0".to_string(),
        sha3_256_hash_of_inference_result_fields: String::new(),
        responding_supernode_signature_on_result_id: String::new(),
    };
    let hash = hash_fields(&result).unwrap();
    result.sha3_256_hash_of_inference_result_fields = hash;
    let result_id_hash = pastel_client_crypto::hash_bytes(result_id.to_string().as_bytes());
    result.responding_supernode_signature_on_result_id = format!("sig-{result_id_hash}");
    serde_json::to_value(result).unwrap()
}

fn accepted(body: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "Accepted": body })
}

// `SupernodeClient::base_url` hardcodes port 7123 for every peer (spec
// §4.2), so both scenarios below bind that fixed port. They run as
// sequential phases of one test rather than separate `#[tokio::test]`
// functions that `cargo test` would otherwise run concurrently against
// the same port.
#[tokio::test]
async fn inference_flow_happy_path_then_insufficient_funds() {
    happy_path_inference_request_completes().await;
    aborts_before_burn_when_tracking_balance_insufficient().await;
}

async fn happy_path_inference_request_completes() {
    let server = start_mock_server_on_protocol_port().await;
    let client_identity = Identity::new_unchecked("requester-pastelid");
    let responder_identity = "responder-pastelid";
    let peer = make_peer(responder_identity, "127.0.0.1:7123");

    Mock::given(method("GET"))
        .and(path(format!("/request_challenge/{}", client_identity.as_str())))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "challenge": "deadbeef",
            "challenge_id": "chal-1",
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("make_inference_api_usage_request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accepted(build_usage_response(
            responder_identity,
            120.0,
            // 3 PSL tracking amount, comfortably under the 5 PSL balance.
            300_000,
        ))))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("confirm_inference_request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accepted(serde_json::json!({}))))
        .mount(&server)
        .await;

    // Polling succeeds on attempt 3 (spec §8 scenario 4): `false, false, true`.
    Mock::given(method("GET"))
        .and(path_regex("^/check_status_of_inference_request_results/.*"))
        .respond_with(SequencedBool::new(vec![false, false, true]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex("^/retrieve_inference_output_results.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(build_output_result(responder_identity, "hello from the model")))
        .mount(&server)
        .await;

    let chain = FakeChain::new(5.0);
    let store = Arc::new(MemoryStore::new());
    let config = ClientConfig::with_defaults(pastel_client_core::config::Network::Devnet);
    let engine = InferenceEngine::new(chain.clone(), store.clone(), config);

    let outcome = engine
        .submit(
            &client_identity,
            "passphrase",
            &peer,
            "credit-pack-txid",
            "claude3-opus",
            "text_completion",
            STANDARD.encode(b"{}"),
            STANDARD.encode(b"{\"prompt\":\"hi\"}"),
            200.0,
        )
        .await
        .expect("inference request should succeed");

    match outcome.decoded {
        InferenceOutput::Text(text) => assert_eq!(text, "hello from the model"),
        other => panic!("expected decoded text, got {other:?}"),
    }
    assert_eq!(outcome.usage_response.proposed_cost_in_inference_credits, 120.0);
    assert_eq!(chain.sent.lock().unwrap().len(), 1);

    let persisted = store.list_for_identity(MessageKind::InferenceUsageRequest, client_identity.as_str()).unwrap();
    assert_eq!(persisted.len(), 1);

    drop(server);
}

async fn aborts_before_burn_when_tracking_balance_insufficient() {
    let server = start_mock_server_on_protocol_port().await;
    let client_identity = Identity::new_unchecked("requester-pastelid-2");
    let responder_identity = "responder-pastelid-2";
    let peer = make_peer(responder_identity, "127.0.0.1:7123");

    Mock::given(method("GET"))
        .and(path(format!("/request_challenge/{}", client_identity.as_str())))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "challenge": "deadbeef",
            "challenge_id": "chal-2",
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("make_inference_api_usage_request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accepted(build_usage_response(
            responder_identity,
            60.0,
            // 3 PSL required, balance is only 2.9 PSL (spec §8 scenario 5).
            300_000,
        ))))
        .mount(&server)
        .await;

    let chain = FakeChain::new(2.9);
    let store = Arc::new(MemoryStore::new());
    let config = ClientConfig::with_defaults(pastel_client_core::config::Network::Devnet);
    let engine = InferenceEngine::new(chain.clone(), store.clone(), config);

    let result = engine
        .submit(
            &client_identity,
            "passphrase",
            &peer,
            "credit-pack-txid",
            "claude3-opus",
            "text_completion",
            STANDARD.encode(b"{}"),
            STANDARD.encode(b"{\"prompt\":\"hi\"}"),
            200.0,
        )
        .await;

    assert!(matches!(result, Err(InferenceError::InsufficientFunds { .. })));
    assert!(chain.sent.lock().unwrap().is_empty(), "no burn transaction should be sent when balance is insufficient");
}

/// Returns each body in `values` in turn across successive matching
/// requests, repeating the last value once the list is exhausted. Used to
/// simulate `check_status_of_inference_request_results` returning `false`
/// on the first two polls and `true` on the third (spec §8 scenario 4).
struct SequencedBool {
    values: Vec<bool>,
    call: AtomicU64,
}

impl SequencedBool {
    fn new(values: Vec<bool>) -> Self {
        Self {
            values,
            call: AtomicU64::new(0),
        }
    }
}

impl Respond for SequencedBool {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let idx = self.call.fetch_add(1, Ordering::SeqCst) as usize;
        let ready = *self.values.get(idx).unwrap_or_else(|| self.values.last().unwrap());
        ResponseTemplate::new(200).set_body_json(serde_json::json!(ready))
    }
}
