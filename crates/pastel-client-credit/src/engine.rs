use crate::error::CreditPackError;
use crate::state::{PurchaseOutcome, PurchaseState};
use chrono::Utc;
use pastel_client_core::messages::{
    CreditPackPurchaseCompletionAnnouncement, CreditPackPurchaseRequest, CreditPackPurchaseResponse,
    MessageKind, PeerOutcome, PriceQuoteResponse, PurchaseConfirmation, PurchaseStatus, PurchaseStatusValue,
    StorageRetryRequest,
};
use pastel_client_core::{ChainFacade, ClientConfig, Envelope, Identity, Peer, PeerSnapshot};
use pastel_client_crypto::{hash_fields, validate_local, verify_signature, Signer, Verifier};
use pastel_client_http::SupernodeClient;
use pastel_client_oracle::FairMarketPrice;
use pastel_client_peers::{MasternodeSource, PeerRegistry};
use pastel_client_store::{Record, Store};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;

/// Number of XOR-closest active peers the buyer draws its responder from
/// (spec §4.3: "the 12 XOR-closest active peers to the buyer's identity").
pub const RESPONDER_BAND_SIZE: usize = 12;

/// Credit-pack purchase state machine (spec §4.3): price quote, quorum
/// signing, burn, confirmation, status poll, storage-retry fallback.
///
/// Generic over `C`, a cheap-to-clone handle implementing the chain-node
/// `Signer`/`Verifier`/[`ChainFacade`] seams (in practice `Arc<ChainRpcClient>`)
/// — the engine hands a clone to each per-peer [`SupernodeClient`] it builds
/// without needing its own internal `Arc` wrapper.
pub struct CreditPackEngine<C>
where
    C: ChainFacade + Signer + Verifier + Clone + Send + Sync + 'static,
{
    chain: C,
    oracle: Arc<dyn FairMarketPrice>,
    store: Arc<dyn Store>,
    config: ClientConfig,
}

impl<C> CreditPackEngine<C>
where
    C: ChainFacade + Signer + Verifier + Clone + Send + Sync + 'static,
{
    pub fn new(chain: C, oracle: Arc<dyn FairMarketPrice>, store: Arc<dyn Store>, config: ClientConfig) -> Self {
        Self {
            chain,
            oracle,
            store,
            config,
        }
    }

    fn supernode_client(&self, peer: &Peer, client_identity: &Identity, passphrase: &str) -> Result<SupernodeClient<C>, CreditPackError> {
        let base_url = peer.base_url().ok_or_else(|| {
            CreditPackError::ProtocolViolation(format!("peer {} has no well-formed base url", peer.identity))
        })?;
        Ok(SupernodeClient::new(
            base_url,
            client_identity.clone(),
            passphrase.to_string(),
            self.chain.clone(),
            self.config.messaging_timeout,
        ))
    }

    /// Run the full purchase state machine: `INIT -> REQUESTED -> QUOTED ->
    /// AGREED -> SIGNED -> BURN_SENT -> CONFIRMED -> COMPLETED` (or one of
    /// the terminal failure states along the way).
    #[tracing::instrument(skip(self, registry, passphrase), fields(requester = %client_identity, credits = requested_credits))]
    pub async fn purchase_credit_pack<MS: MasternodeSource>(
        &self,
        registry: &PeerRegistry<MS>,
        client_identity: &Identity,
        passphrase: &str,
        requested_credits: u64,
        authorized_identities: Vec<Identity>,
        tracking_address: &str,
    ) -> Result<PurchaseOutcome, CreditPackError> {
        let top12 = registry
            .top_n_active_by_xor(client_identity, RESPONDER_BAND_SIZE)
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        if top12.is_empty() {
            return Err(CreditPackError::NoPeersAvailable);
        }
        let responder = top12
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(CreditPackError::NoPeersAvailable)?;
        tracing::info!(responder = %responder.identity, "selected purchase responder");

        // ── INIT -> REQUESTED ──────────────────────────────────────────────
        let request = self
            .build_purchase_request(client_identity, passphrase, requested_credits, authorized_identities, tracking_address)
            .await?;
        self.persist(MessageKind::CreditPackPurchaseRequest, client_identity, &request)?;

        let client = self.supernode_client(&responder, client_identity, passphrase)?;
        let quote = client
            .credit_purchase_initial_request(&request)
            .await
            .map_err(|e| peer_unreachable_or_fatal(&responder, e))?
            .into_accepted()
            .map_err(|e| CreditPackError::Rejected { reason: e.to_string() })?;
        tracing::info!(state = ?PurchaseState::Quoted, per_credit = quote.preliminary_quoted_price_per_credit_in_psl);

        self.validate_envelope(
            &quote,
            &quote.responding_supernode_pastelid,
            &[&quote.sha3_256_hash_of_credit_pack_purchase_request_fields],
            MessageKind::CreditPackPurchaseRequest,
        )
        .await?;

        // ── QUOTED -> AGREED | DECLINED ────────────────────────────────────
        let max_per_credit = self.config.max_per_credit_price_psl;
        let max_total = max_per_credit * requested_credits as f64;
        let fair_market_usd_per_psl = self
            .oracle
            .fair_market_usd_per_psl()
            .await
            .map_err(|e| CreditPackError::ProtocolViolation(e.to_string()))?;
        let fair_market_psl_per_credit =
            (self.config.target_value_per_credit_usd / (1.0 - self.config.target_profit_margin)) / fair_market_usd_per_psl;

        let delta = (quote.preliminary_quoted_price_per_credit_in_psl - fair_market_psl_per_credit).abs()
            / fair_market_psl_per_credit;
        let agree = quote.preliminary_quoted_price_per_credit_in_psl <= max_per_credit
            && quote.preliminary_total_cost_of_credit_pack_in_psl <= max_total
            && delta <= self.config.max_local_credit_price_difference;

        if !agree {
            tracing::warn!(state = ?PurchaseState::Declined, per_credit = quote.preliminary_quoted_price_per_credit_in_psl, max_per_credit, delta);
            return Err(CreditPackError::Declined {
                reason: format!(
                    "quoted {} PSL/credit (total {}) outside acceptance bounds (max {max_per_credit}/credit, max delta {})",
                    quote.preliminary_quoted_price_per_credit_in_psl,
                    quote.preliminary_total_cost_of_credit_pack_in_psl,
                    self.config.max_local_credit_price_difference
                ),
            });
        }
        tracing::info!(state = ?PurchaseState::Agreed);

        // ── AGREED -> SIGNED | TERMINATED ──────────────────────────────────
        let quote_response = self.build_quote_response(client_identity, passphrase, &request, &quote, true).await?;
        let response = client
            .credit_purchase_preliminary_price_quote_response(&quote_response)
            .await
            .map_err(|e| peer_unreachable_or_fatal(&responder, e))?
            .into_accepted()
            .map_err(|e| CreditPackError::Rejected { reason: e.to_string() })?;
        tracing::info!(state = ?PurchaseState::Signed, proposed_total = response.proposed_total_cost_of_credit_pack_in_psl);

        self.validate_envelope(
            &response,
            &response.responding_supernode_pastelid,
            &[&response.sha3_256_hash_of_credit_pack_purchase_request_fields],
            MessageKind::CreditPackPurchaseRequest,
        )
        .await?;
        self.verify_quorum(&response).await?;
        self.persist(MessageKind::CreditPackPurchaseResponse, client_identity, &response)?;

        // ── SIGNED -> BURN_SENT ─────────────────────────────────────────────
        let burn_amount = pastel_client_core::units::floor_to_patoshi(response.proposed_total_cost_of_credit_pack_in_psl);
        let burn_address = self.config.network.burn_address();
        let burn_txid = self
            .chain
            .send_to_address(burn_address, burn_amount)
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        tracing::info!(state = ?PurchaseState::BurnSent, txid = %burn_txid, amount = burn_amount);

        // ── BURN_SENT -> CONFIRMED ──────────────────────────────────────────
        let confirmation = self
            .build_confirmation(client_identity, passphrase, &request, &response, &burn_txid)
            .await?;
        self.persist(MessageKind::PurchaseConfirmation, client_identity, &confirmation)?;

        let initial_status = client
            .credit_pack_purchase_confirmation(&confirmation)
            .await
            .map_err(|e| peer_unreachable_or_fatal(&responder, e))?
            .into_accepted()
            .map_err(|e| CreditPackError::Rejected { reason: e.to_string() })?;
        tracing::info!(state = ?PurchaseState::Confirmed, status = ?initial_status.status);

        // ── CONFIRMED -> COMPLETED | STORAGE_FAILED ─────────────────────────
        let final_status = self
            .poll_status(&top12, &responder, &confirmation, initial_status, client_identity, passphrase)
            .await;

        if let Some(status) = final_status {
            if status.status == PurchaseStatusValue::Completed {
                let registration_txid = status.credit_pack_registration_txid.clone().ok_or_else(|| {
                    CreditPackError::ProtocolViolation("completed status carried no registration txid".to_string())
                })?;
                tracing::info!(state = ?PurchaseState::Completed, registration_txid = %registration_txid);
                return Ok(PurchaseOutcome {
                    request,
                    response,
                    burn_txid,
                    credit_pack_registration_txid: registration_txid,
                    recovered_via_storage_retry: false,
                });
            }
        }

        // ── STORAGE_FAILED -> COMPLETED | FAILED ─────────────────────────────
        tracing::warn!(state = ?PurchaseState::StorageFailed, "no peer reported completion; attempting storage retry");
        let registration_txid = self
            .storage_retry(registry, client_identity, passphrase, &confirmation, &response)
            .await?;
        Ok(PurchaseOutcome {
            request,
            response,
            burn_txid,
            credit_pack_registration_txid: registration_txid,
            recovered_via_storage_retry: true,
        })
    }

    async fn build_purchase_request(
        &self,
        client_identity: &Identity,
        passphrase: &str,
        requested_credits: u64,
        authorized_identities: Vec<Identity>,
        tracking_address: &str,
    ) -> Result<CreditPackPurchaseRequest, CreditPackError> {
        let height = self.chain.best_block_height().await.map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        let mut draft = CreditPackPurchaseRequest {
            requesting_end_user_pastelid: client_identity.clone(),
            requested_initial_credits_in_credit_pack: requested_credits,
            list_of_authorized_pastelids_allowed_to_use_credit_pack: authorized_identities,
            credit_usage_tracking_psl_address: tracking_address.to_string(),
            credit_pack_purchase_request_utc_timestamp: Utc::now(),
            credit_pack_purchase_request_pastel_block_height: height,
            credit_pack_purchase_request_version: "1.0".to_string(),
            sha3_256_hash_of_credit_pack_purchase_request_fields: String::new(),
            requesting_end_user_pastelid_signature_on_request_hash: String::new(),
        };
        let hash = hash_fields(&draft).map_err(|e| CreditPackError::ProtocolViolation(e.to_string()))?;
        draft.sha3_256_hash_of_credit_pack_purchase_request_fields = hash.clone();
        draft.requesting_end_user_pastelid_signature_on_request_hash = self
            .chain
            .sign(client_identity, &hash, passphrase)
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        Ok(draft)
    }

    async fn build_quote_response(
        &self,
        client_identity: &Identity,
        passphrase: &str,
        request: &CreditPackPurchaseRequest,
        quote: &pastel_client_core::messages::PreliminaryPriceQuote,
        agree: bool,
    ) -> Result<PriceQuoteResponse, CreditPackError> {
        let height = self.chain.best_block_height().await.map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        let mut draft = PriceQuoteResponse {
            sha3_256_hash_of_credit_pack_purchase_request_fields: request
                .sha3_256_hash_of_credit_pack_purchase_request_fields
                .clone(),
            sha3_256_hash_of_preliminary_price_quote_fields: quote
                .sha3_256_hash_of_preliminary_price_quote_fields
                .clone(),
            agree_with_preliminary_price_quote: agree,
            requesting_end_user_pastelid: client_identity.clone(),
            credit_pack_purchase_price_quote_response_utc_timestamp: Utc::now(),
            credit_pack_purchase_price_quote_response_pastel_block_height: height,
            credit_pack_purchase_price_quote_response_version: "1.0".to_string(),
            sha3_256_hash_of_price_quote_response_fields: String::new(),
            requesting_end_user_pastelid_signature_on_price_quote_response_hash: String::new(),
        };
        let hash = hash_fields(&draft).map_err(|e| CreditPackError::ProtocolViolation(e.to_string()))?;
        draft.sha3_256_hash_of_price_quote_response_fields = hash.clone();
        draft.requesting_end_user_pastelid_signature_on_price_quote_response_hash = self
            .chain
            .sign(client_identity, &hash, passphrase)
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        Ok(draft)
    }

    async fn build_confirmation(
        &self,
        client_identity: &Identity,
        passphrase: &str,
        request: &CreditPackPurchaseRequest,
        response: &CreditPackPurchaseResponse,
        burn_txid: &str,
    ) -> Result<PurchaseConfirmation, CreditPackError> {
        let height = self.chain.best_block_height().await.map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        let mut draft = PurchaseConfirmation {
            sha3_256_hash_of_credit_pack_purchase_request_fields: request
                .sha3_256_hash_of_credit_pack_purchase_request_fields
                .clone(),
            sha3_256_hash_of_credit_pack_purchase_response_fields: response
                .sha3_256_hash_of_credit_pack_purchase_response_fields
                .clone(),
            txid_of_credit_purchase_burn_transaction: burn_txid.to_string(),
            requesting_end_user_pastelid: client_identity.clone(),
            credit_pack_purchase_confirmation_utc_timestamp: Utc::now(),
            credit_pack_purchase_confirmation_pastel_block_height: height,
            credit_pack_purchase_confirmation_version: "1.0".to_string(),
            sha3_256_hash_of_credit_pack_purchase_confirmation_fields: String::new(),
            requesting_end_user_pastelid_signature_on_confirmation_hash: String::new(),
        };
        let hash = hash_fields(&draft).map_err(|e| CreditPackError::ProtocolViolation(e.to_string()))?;
        draft.sha3_256_hash_of_credit_pack_purchase_confirmation_fields = hash.clone();
        draft.requesting_end_user_pastelid_signature_on_confirmation_hash = self
            .chain
            .sign(client_identity, &hash, passphrase)
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        Ok(draft)
    }

    /// Invariants 1-5 of spec §3 for any message the responder produced:
    /// hash recomputation, clock skew, height skew, `predecessors` presence
    /// in `self.store` under `predecessor_kind`, and (invariant 2) signature
    /// verification under `signer`.
    async fn validate_envelope<T: Envelope>(
        &self,
        message: &T,
        signer: &Identity,
        predecessors: &[&str],
        predecessor_kind: MessageKind,
    ) -> Result<(), CreditPackError> {
        let local_height = self.chain.best_block_height().await.map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        let mut violations = validate_local(
            message,
            Utc::now(),
            local_height,
            self.config.clock_skew_tolerance,
            self.config.max_block_height_difference,
            predecessors,
            |hash| self.store.get_by_hash(predecessor_kind, hash).ok().flatten().is_some(),
        );
        if let Some(v) = verify_signature(message, signer, &self.chain)
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?
        {
            violations.push(v);
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CreditPackError::Validation(violations))
        }
    }

    /// Spec §4.3's quorum collection: every listed signer must verify, and
    /// the signer set must match the "selected for signature inclusion"
    /// list exactly.
    async fn verify_quorum(&self, response: &CreditPackPurchaseResponse) -> Result<(), CreditPackError> {
        let selected: HashSet<&str> = response
            .list_of_supernode_pastelids_agreeing_to_credit_pack_purchase_terms_selected_for_signature_inclusion
            .iter()
            .map(|id| id.as_str())
            .collect();
        let signers: HashSet<&str> = response
            .selected_agreeing_supernodes_signatures_dict
            .keys()
            .map(String::as_str)
            .collect();
        if selected != signers {
            return Err(CreditPackError::ConsensusFailure(
                "quorum signer set does not match the selected-for-signature list".to_string(),
            ));
        }
        for (signer, signature) in &response.selected_agreeing_supernodes_signatures_dict {
            let signer_identity = Identity::new_unchecked(signer.clone());
            let ok = self
                .chain
                .verify(
                    &signer_identity,
                    &response.sha3_256_hash_of_credit_pack_purchase_response_fields,
                    signature,
                )
                .await
                .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
            if !ok {
                return Err(CreditPackError::ConsensusFailure(format!(
                    "signature from quorum signer {signer} does not verify"
                )));
            }
        }
        Ok(())
    }

    /// Spec §4.3 status polling: the same responder's confirmation reply is
    /// the first sample; if it isn't `completed`, poll the remaining 11
    /// closest peers in order and take the first `completed` answer.
    async fn poll_status(
        &self,
        top12: &[Peer],
        responder: &Peer,
        confirmation: &PurchaseConfirmation,
        initial_status: PurchaseStatus,
        client_identity: &Identity,
        passphrase: &str,
    ) -> Option<PurchaseStatus> {
        if initial_status.status == PurchaseStatusValue::Completed {
            return Some(initial_status);
        }
        for peer in top12.iter().filter(|p| p.identity != responder.identity) {
            let Ok(client) = self.supernode_client(peer, client_identity, passphrase) else {
                continue;
            };
            let outcome = client
                .check_status_of_credit_purchase_request(
                    &confirmation.sha3_256_hash_of_credit_pack_purchase_confirmation_fields,
                )
                .await;
            if let Ok(PeerOutcome::Accepted(status)) = outcome {
                if status.status == PurchaseStatusValue::Completed {
                    return Some(status);
                }
            }
        }
        None
    }

    /// Spec §4.3 storage-retry fallback: the XOR-closest agreeing peer
    /// re-anchors the ticket, then a completion announcement is broadcast
    /// to the remaining agreeing peers (failures there are logged, not
    /// fatal).
    async fn storage_retry<MS: MasternodeSource>(
        &self,
        registry: &PeerRegistry<MS>,
        client_identity: &Identity,
        passphrase: &str,
        confirmation: &PurchaseConfirmation,
        response: &CreditPackPurchaseResponse,
    ) -> Result<String, CreditPackError> {
        let active = registry
            .active_snapshot()
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        let agreeing_ids = &response
            .list_of_supernode_pastelids_agreeing_to_credit_pack_purchase_terms_selected_for_signature_inclusion;
        let agreeing = PeerSnapshot::new(
            active
                .peers
                .iter()
                .filter(|p| agreeing_ids.contains(&p.identity))
                .cloned()
                .collect(),
        );
        let closest = pastel_client_peers::closest_to_pastelid(client_identity, &agreeing)
            .cloned()
            .ok_or_else(|| CreditPackError::StorageRetryFailed("no agreeing peer is currently active".to_string()))?;

        let height = self
            .chain
            .best_block_height()
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;
        let mut retry_request = StorageRetryRequest {
            sha3_256_hash_of_credit_pack_purchase_confirmation_fields: confirmation
                .sha3_256_hash_of_credit_pack_purchase_confirmation_fields
                .clone(),
            requesting_end_user_pastelid: client_identity.clone(),
            closest_agreeing_supernode_pastelid: closest.identity.clone(),
            credit_pack_storage_retry_request_utc_timestamp: Utc::now(),
            credit_pack_storage_retry_request_pastel_block_height: height,
            credit_pack_storage_retry_request_version: "1.0".to_string(),
            sha3_256_hash_of_credit_pack_storage_retry_request_fields: String::new(),
            requesting_end_user_pastelid_signature_on_storage_retry_request_hash: String::new(),
        };
        let hash = hash_fields(&retry_request).map_err(|e| CreditPackError::ProtocolViolation(e.to_string()))?;
        retry_request.sha3_256_hash_of_credit_pack_storage_retry_request_fields = hash.clone();
        retry_request.requesting_end_user_pastelid_signature_on_storage_retry_request_hash = self
            .chain
            .sign(client_identity, &hash, passphrase)
            .await
            .map_err(|e| CreditPackError::ChainRpc(e.to_string()))?;

        let retry_client = self.supernode_client(&closest, client_identity, passphrase)?;
        let retry_response = retry_client
            .credit_pack_storage_retry_request(&retry_request)
            .await
            .map_err(|e| CreditPackError::StorageRetryFailed(e.to_string()))?
            .into_accepted()
            .map_err(|e| CreditPackError::StorageRetryFailed(e.to_string()))?;

        tracing::info!(state = ?PurchaseState::Completed, via = "storage_retry", registration_txid = %retry_response.credit_pack_registration_txid);

        let announcement_height = height;
        let mut announcement = CreditPackPurchaseCompletionAnnouncement {
            sha3_256_hash_of_credit_pack_purchase_request_fields: confirmation
                .sha3_256_hash_of_credit_pack_purchase_request_fields
                .clone(),
            credit_pack_registration_txid: retry_response.credit_pack_registration_txid.clone(),
            announcing_pastelid: client_identity.clone(),
            completion_announcement_utc_timestamp: Utc::now(),
            completion_announcement_pastel_block_height: announcement_height,
            completion_announcement_version: "1.0".to_string(),
            sha3_256_hash_of_completion_announcement_fields: String::new(),
            announcing_pastelid_signature_on_completion_announcement_hash: String::new(),
        };
        if let Ok(ahash) = hash_fields(&announcement) {
            announcement.sha3_256_hash_of_completion_announcement_fields = ahash.clone();
            if let Ok(sig) = self.chain.sign(client_identity, &ahash, passphrase).await {
                announcement.announcing_pastelid_signature_on_completion_announcement_hash = sig;
                for peer in &agreeing.peers {
                    if peer.identity == closest.identity {
                        continue;
                    }
                    if let Ok(client) = self.supernode_client(peer, client_identity, passphrase) {
                        if let Err(e) = client.credit_pack_storage_retry_completion_announcement(&announcement).await {
                            tracing::warn!(peer = %peer.identity, error = %e, "completion announcement broadcast failed");
                        }
                    }
                }
            }
        }

        Ok(retry_response.credit_pack_registration_txid)
    }

    fn persist<T: Envelope>(&self, kind: MessageKind, identity: &Identity, message: &T) -> Result<(), CreditPackError> {
        let payload = serde_json::to_value(message).map_err(|e| CreditPackError::ProtocolViolation(e.to_string()))?;
        self.store
            .put(
                kind,
                Record {
                    identity: identity.to_string(),
                    request_hash: message.hash_value().to_string(),
                    block_height: message.block_height(),
                    payload,
                },
            )
            .map_err(|e| CreditPackError::ProtocolViolation(e.to_string()))
    }
}

fn peer_unreachable_or_fatal(peer: &Peer, e: pastel_client_http::SupernodeError) -> CreditPackError {
    if e.is_peer_unreachable() {
        CreditPackError::PeerUnreachable {
            peer: peer.identity.to_string(),
            reason: e.to_string(),
        }
    } else {
        CreditPackError::Rejected { reason: e.to_string() }
    }
}
