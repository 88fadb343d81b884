use crate::error::ClientError;
use pastel_client_audit::{AuditOutcome, AuditValidator};
use pastel_client_core::model_menu::ParamValue;
use pastel_client_core::{ClientConfig, Identity};
use pastel_client_credit::{CreditPackEngine, PurchaseOutcome};
use pastel_client_inference::{discover, InferenceEngine, InferenceOutcome};
use pastel_client_oracle::FairMarketPrice;
use pastel_client_peers::PeerRegistry;
use pastel_client_rpc::ChainRpcClient;
use pastel_client_store::Store;
use std::collections::HashMap;
use std::sync::Arc;

/// `{ inference_result, audit_results?, validation_results? }` (spec
/// §4.4): the decoded inference outcome, plus the audit validator's two
/// per-field agreement maps when auditing is enabled. `audit_results`
/// covers the fields of interest on the usage response; `validation_results`
/// covers the fields of interest on the output result (spec §4.5 step 3's
/// two field lists).
#[derive(Clone, Debug)]
pub struct InferenceRequestOutcome {
    pub inference_result: InferenceOutcome,
    pub audit_results: Option<HashMap<String, bool>>,
    pub validation_results: Option<HashMap<String, bool>>,
}

/// The library facade (spec §9 design note: "a global mutable
/// identity/passphrase is replaced by an explicit `Client { identity,
/// passphrase }` handle passed to every engine call"). Assembles the
/// chain-RPC client, peer registry, persistence store, and cost oracle
/// into the purchase/inference/audit engines, and exposes one call per
/// top-level operation.
pub struct Client {
    identity: Identity,
    passphrase: String,
    chain: Arc<ChainRpcClient>,
    registry: PeerRegistry<Arc<ChainRpcClient>>,
    store: Arc<dyn Store>,
    config: ClientConfig,
    credit_engine: CreditPackEngine<Arc<ChainRpcClient>>,
    inference_engine: InferenceEngine<Arc<ChainRpcClient>>,
    audit_validator: AuditValidator<Arc<ChainRpcClient>>,
    audit_enabled: bool,
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Identity,
        passphrase: impl Into<String>,
        chain_rpc_base_url: impl Into<String>,
        chain_rpc_user: impl Into<String>,
        chain_rpc_password: impl Into<String>,
        config: ClientConfig,
        store: Arc<dyn Store>,
        oracle: Arc<dyn FairMarketPrice>,
        audit_enabled: bool,
    ) -> Self {
        let chain = Arc::new(ChainRpcClient::new(chain_rpc_base_url, chain_rpc_user, chain_rpc_password));
        let registry = PeerRegistry::new(chain.clone());
        let credit_engine = CreditPackEngine::new(chain.clone(), oracle, store.clone(), config.clone());
        let inference_engine = InferenceEngine::new(chain.clone(), store.clone(), config.clone());
        let audit_validator = AuditValidator::new(chain.clone(), config.messaging_timeout);
        Self {
            identity,
            passphrase: passphrase.into(),
            chain,
            registry,
            store,
            config,
            credit_engine,
            inference_engine,
            audit_validator,
            audit_enabled,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Drops the cached peer snapshot so the next routing query re-fetches
    /// the masternode list (spec §3: snapshots are cached "for the length
    /// of one top-level operation").
    pub async fn invalidate_peer_cache(&self) {
        self.registry.invalidate().await;
    }

    /// `purchase_credit_pack` (spec §4.3): the full purchase state machine,
    /// from price quote through quorum signing, burn, confirmation, and
    /// status poll (with storage-retry fallback).
    pub async fn purchase_credit_pack(
        &self,
        requested_credits: u64,
        authorized_identities: Vec<Identity>,
        tracking_address: &str,
    ) -> Result<PurchaseOutcome, ClientError> {
        let deadline = self.config.operation_deadline;
        tokio::time::timeout(
            deadline,
            self.credit_engine.purchase_credit_pack(
                &self.registry,
                &self.identity,
                &self.passphrase,
                requested_credits,
                authorized_identities,
                tracking_address,
            ),
        )
        .await
        .map_err(|_| ClientError::OperationTimedOut(deadline))?
        .map_err(ClientError::from)
    }

    /// `submit_inference_request` (spec §4.4 `discover` + `submit`, §4.5
    /// audit): discovers a peer advertising the requested model, submits
    /// the inference request to it, and — when `audit_enabled` was set at
    /// construction — audits the response and result against the four
    /// XOR-closest other peers.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_inference_request(
        &self,
        credit_pack_txid: &str,
        model_name: &str,
        inference_type: &str,
        parameters: HashMap<String, ParamValue>,
        model_parameters_json_b64: String,
        model_input_data_json_b64: String,
        max_cost_in_credits: f64,
    ) -> Result<InferenceRequestOutcome, ClientError> {
        let deadline = self.config.operation_deadline;
        tokio::time::timeout(deadline, async {
            let discovered = discover(
                &self.registry,
                &self.chain,
                &self.identity,
                &self.passphrase,
                self.config.messaging_timeout,
                model_name,
                inference_type,
                &parameters,
            )
            .await?;

            let inference_result = self
                .inference_engine
                .submit(
                    &self.identity,
                    &self.passphrase,
                    &discovered.peer,
                    credit_pack_txid,
                    model_name,
                    inference_type,
                    model_parameters_json_b64,
                    model_input_data_json_b64,
                    max_cost_in_credits,
                )
                .await?;

            let (audit_results, validation_results) = if self.audit_enabled {
                let outcome = self
                    .run_audit(&discovered.peer.identity, &inference_result)
                    .await?;
                (Some(outcome.response_validation), Some(outcome.result_validation))
            } else {
                (None, None)
            };

            Ok(InferenceRequestOutcome {
                inference_result,
                audit_results,
                validation_results,
            })
        })
        .await
        .map_err(|_| ClientError::OperationTimedOut(deadline))?
    }

    async fn run_audit(&self, responder: &Identity, outcome: &InferenceOutcome) -> Result<AuditOutcome, ClientError> {
        self.audit_validator
            .audit(
                &self.registry,
                &self.identity,
                &self.passphrase,
                responder,
                outcome.usage_response.inference_response_id,
                &outcome.usage_response,
                &outcome.output_result,
            )
            .await
            .map_err(ClientError::from)
    }
}
