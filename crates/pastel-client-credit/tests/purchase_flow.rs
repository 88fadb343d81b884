//! End-to-end purchase-flow test against a mock supernode.
//!
//! A fake chain façade supplies deterministic signatures and always-valid
//! verification (the crypto crate's own round-trip tests already cover
//! real signing); this test only exercises the state machine's HTTP and
//! decision-making surface.
//!
//! Run with:
//!   cargo test -p pastel-client-credit --test purchase_flow

use async_trait::async_trait;
use chrono::Utc;
use pastel_client_core::messages::{CreditPackPurchaseResponse, PreliminaryPriceQuote, PurchaseStatus, PurchaseStatusValue};
use pastel_client_core::{ChainFacade, ClientConfig, Envelope, Identity, Peer, PeerStatus};
use pastel_client_credit::CreditPackEngine;
use pastel_client_crypto::{hash_fields, Signer, Verifier};
use pastel_client_oracle::FairMarketPrice;
use pastel_client_peers::{MasternodeSource, PeerRegistry};
use pastel_client_store::MemoryStore;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Fake chain façade ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct FakeChain {
    height: Arc<AtomicU64>,
    burns: Arc<std::sync::Mutex<Vec<(String, f64)>>>,
}

impl FakeChain {
    fn new() -> Self {
        Self {
            height: Arc::new(AtomicU64::new(1_000)),
            burns: Arc::new(std::sync::Mutex::new(Vec::new())),
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
    async fn send_to_address(&self, address: &str, amount: f64) -> Result<String, FakeChainError> {
        self.burns.lock().unwrap().push((address.to_string(), amount));
        Ok("burn-txid-0000000000000000000000000000000000000000000000000000000000".to_string())
    }
    async fn send_many(&self, _from: &str, _payments: HashMap<String, f64>, _memo: &str) -> Result<String, FakeChainError> {
        unimplemented!("not exercised by the credit-pack purchase flow")
    }
    async fn address_balance(&self, _address: &str) -> Result<f64, FakeChainError> {
        unimplemented!("not exercised by the credit-pack purchase flow")
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

struct FakeOracle(f64);

#[async_trait]
impl FairMarketPrice for FakeOracle {
    async fn fair_market_usd_per_psl(&self) -> Result<f64, pastel_client_oracle::OracleError> {
        Ok(self.0)
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

/// `SupernodeClient::base_url` hardcodes port 7123 (spec §4.2), so the mock
/// server must actually listen there for the engine's URLs to resolve.
async fn start_mock_server_on_protocol_port() -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:7123").expect("bind fixed supernode port 7123 for test");
    MockServer::builder().listener(listener).start().await
}

// `SupernodeClient::base_url` hardcodes port 7123 for every peer (spec
// §4.2), so both scenarios below bind that fixed port. They run as
// sequential phases of one test, each dropping its `MockServer` before the
// next binds, rather than as separate `#[tokio::test]` functions that
// `cargo test` would otherwise run concurrently against the same port.
#[tokio::test]
async fn purchase_flow_happy_path_then_decline() {
    happy_path_purchase_completes_without_storage_retry().await;
    declines_when_quote_exceeds_configured_maximum().await;
}

async fn happy_path_purchase_completes_without_storage_retry() {
    let server = start_mock_server_on_protocol_port().await;
    let client_identity = Identity::new_unchecked("buyer-pastelid");
    let responder_identity = "responder-pastelid";

    Mock::given(method("GET"))
        .and(path(format!("/request_challenge/{}", client_identity.as_str())))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "challenge": "deadbeef",
            "challenge_id": "chal-1",
        })))
        .mount(&server)
        .await;

    let request_hash_placeholder = "0".repeat(64);
    Mock::given(method("POST"))
        .and(path("/credit_purchase_initial_request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(build_quote(&request_hash_placeholder, responder_identity)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/credit_purchase_preliminary_price_quote_response"))
        .respond_with(ResponseTemplate::new(200).set_body_json(build_response(responder_identity)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/credit_pack_purchase_confirmation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(build_completed_status(responder_identity)))
        .mount(&server)
        .await;

    let chain = FakeChain::new();
    // Chosen so `(target_usd_per_credit / (1 - margin)) / fair_usd_per_psl`
    // (the default `ClientConfig`'s target values) lands on exactly the
    // quoted 0.0001 PSL/credit used below, keeping the acceptance delta at 0.
    let oracle: Arc<dyn FairMarketPrice> = Arc::new(FakeOracle(1.0 / 0.9));
    let store = Arc::new(MemoryStore::new());
    let config = ClientConfig::with_defaults(pastel_client_core::config::Network::Devnet);

    let peer = make_peer(responder_identity, "127.0.0.1:7123");
    let registry = PeerRegistry::new(FixedPeerList(vec![peer]));

    let engine = CreditPackEngine::new(chain, oracle, store, config);
    let outcome = engine
        .purchase_credit_pack(&registry, &client_identity, "passphrase", 1_000, vec![], "tAddrTracking")
        .await
        .expect("purchase should succeed");

    assert_eq!(outcome.credit_pack_registration_txid, "reg-txid-completed");
    assert!(!outcome.recovered_via_storage_retry);
    drop(server);
}

async fn declines_when_quote_exceeds_configured_maximum() {
    let server = start_mock_server_on_protocol_port().await;
    let client_identity = Identity::new_unchecked("buyer-pastelid-2");
    let responder_identity = "responder-pastelid-2";

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "challenge": "deadbeef",
            "challenge_id": "chal-2",
        })))
        .mount(&server)
        .await;

    let mut quote = build_quote("0".repeat(64).as_str(), responder_identity);
    quote["preliminary_quoted_price_per_credit_in_psl"] = serde_json::json!(10_000.0);
    quote["preliminary_total_cost_of_credit_pack_in_psl"] = serde_json::json!(10_000_000.0);
    Mock::given(method("POST"))
        .and(path("/credit_purchase_initial_request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote))
        .mount(&server)
        .await;

    let chain = FakeChain::new();
    // Chosen so `(target_usd_per_credit / (1 - margin)) / fair_usd_per_psl`
    // (the default `ClientConfig`'s target values) lands on exactly the
    // quoted 0.0001 PSL/credit used below, keeping the acceptance delta at 0.
    let oracle: Arc<dyn FairMarketPrice> = Arc::new(FakeOracle(1.0 / 0.9));
    let store = Arc::new(MemoryStore::new());
    let config = ClientConfig::with_defaults(pastel_client_core::config::Network::Devnet);

    let peer = make_peer(responder_identity, "127.0.0.1:7123");
    let registry = PeerRegistry::new(FixedPeerList(vec![peer]));

    let engine = CreditPackEngine::new(chain, oracle, store, config);
    let result = engine
        .purchase_credit_pack(&registry, &client_identity, "passphrase", 1_000, vec![], "tAddrTracking")
        .await;

    assert!(matches!(result, Err(pastel_client_credit::CreditPackError::Declined { .. })));
}

fn build_quote(request_hash: &str, responder: &str) -> serde_json::Value {
    let mut quote = PreliminaryPriceQuote {
        sha3_256_hash_of_credit_pack_purchase_request_fields: request_hash.to_string(),
        credit_usage_tracking_psl_address: "tAddrTracking".to_string(),
        preliminary_quoted_price_per_credit_in_psl: 0.0001,
        preliminary_total_cost_of_credit_pack_in_psl: 100.0,
        responding_supernode_pastelid: Identity::new_unchecked(responder),
        preliminary_price_quote_utc_timestamp: Utc::now(),
        preliminary_price_quote_pastel_block_height: 1_000,
        preliminary_price_quote_version: "1.0".to_string(),
        sha3_256_hash_of_preliminary_price_quote_fields: String::new(),
        responding_supernode_signature_on_price_quote_hash: String::new(),
    };
    let hash = hash_fields(&quote).unwrap();
    quote.sha3_256_hash_of_preliminary_price_quote_fields = hash.clone();
    quote.responding_supernode_signature_on_price_quote_hash = format!("sig-{hash}");
    serde_json::to_value(quote).unwrap()
}

fn build_response(responder: &str) -> serde_json::Value {
    let selected = vec![Identity::new_unchecked(responder)];
    let mut dict = HashMap::new();
    dict.insert(responder.to_string(), "quorum-sig".to_string());

    let mut response = CreditPackPurchaseResponse {
        sha3_256_hash_of_credit_pack_purchase_request_fields: "0".repeat(64),
        psl_cost_per_credit: 0.0001,
        proposed_total_cost_of_credit_pack_in_psl: 100.0,
        credit_usage_tracking_psl_address: "tAddrTracking".to_string(),
        best_block_merkle_root: "0".repeat(64),
        best_block_height: 1_000,
        list_of_potentially_agreeing_supernodes: selected.clone(),
        list_of_supernode_pastelids_agreeing_to_credit_pack_purchase_terms_selected_for_signature_inclusion: selected,
        selected_agreeing_supernodes_signatures_dict: dict,
        responding_supernode_pastelid: Identity::new_unchecked(responder),
        credit_pack_purchase_response_utc_timestamp: Utc::now(),
        credit_pack_purchase_response_pastel_block_height: 1_000,
        credit_pack_purchase_response_version: "1.0".to_string(),
        sha3_256_hash_of_credit_pack_purchase_response_fields: String::new(),
        responding_supernode_signature_on_response_hash: String::new(),
    };
    let hash = hash_fields(&response).unwrap();
    response.sha3_256_hash_of_credit_pack_purchase_response_fields = hash.clone();
    response.responding_supernode_signature_on_response_hash = format!("sig-{hash}");
    serde_json::to_value(response).unwrap()
}

fn build_completed_status(responder: &str) -> serde_json::Value {
    let mut status = PurchaseStatus {
        sha3_256_hash_of_credit_pack_purchase_confirmation_fields: "0".repeat(64),
        status: PurchaseStatusValue::Completed,
        status_details: None,
        credit_pack_registration_txid: Some("reg-txid-completed".to_string()),
        responding_supernode_pastelid: Identity::new_unchecked(responder),
        credit_pack_purchase_status_utc_timestamp: Utc::now(),
        credit_pack_purchase_status_pastel_block_height: 1_000,
        credit_pack_purchase_status_version: "1.0".to_string(),
        sha3_256_hash_of_credit_pack_purchase_status_fields: String::new(),
        responding_supernode_signature_on_status_hash: String::new(),
    };
    let hash = hash_fields(&status).unwrap();
    status.sha3_256_hash_of_credit_pack_purchase_status_fields = hash.clone();
    status.responding_supernode_signature_on_status_hash = format!("sig-{hash}");
    serde_json::to_value(status).unwrap()
}
