use crate::error::InferenceError;
use crate::result::{InferenceOutcome, InferenceOutput};
use chrono::Utc;
use pastel_client_core::messages::{InferenceConfirmation, InferenceUsageRequest, MessageKind};
use pastel_client_core::units::patoshis_to_psl;
use pastel_client_core::{ChainFacade, ClientConfig, Envelope, Identity, Peer};
use pastel_client_crypto::{hash_bytes, hash_fields, validate_local, Signer, Verifier};
use pastel_client_http::SupernodeClient;
use pastel_client_store::{Record, Store};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on result-polling attempts (spec §4.4 step 6: "up to 60
/// attempts").
pub const MAX_RESULT_POLL_ATTEMPTS: u32 = 60;

/// `w_i = 3 × 1.04^i` seconds, the exponential-ish backoff spec §4.4 step 6
/// specifies between polling attempts.
pub fn poll_wait(attempt: u32) -> Duration {
    Duration::from_secs_f64(3.0 * 1.04f64.powi(attempt as i32))
}

/// Inference-request engine (spec §4.4): usage request, cost/balance
/// checks, tracking-amount confirmation transfer, result polling, decode.
///
/// Generic over `C` exactly as [`pastel_client_credit::CreditPackEngine`]
/// is, for the same reason: one cheap-to-clone chain-node handle is handed
/// to each per-peer [`SupernodeClient`] this engine builds.
pub struct InferenceEngine<C>
where
    C: ChainFacade + Signer + Verifier + Clone + Send + Sync + 'static,
{
    chain: C,
    store: Arc<dyn Store>,
    config: ClientConfig,
}

impl<C> InferenceEngine<C>
where
    C: ChainFacade + Signer + Verifier + Clone + Send + Sync + 'static,
{
    pub fn new(chain: C, store: Arc<dyn Store>, config: ClientConfig) -> Self {
        Self { chain, store, config }
    }

    fn supernode_client(&self, peer: &Peer, client_identity: &Identity, passphrase: &str) -> Result<SupernodeClient<C>, InferenceError> {
        let base_url = peer
            .base_url()
            .ok_or_else(|| InferenceError::ProtocolViolation(format!("peer {} has no well-formed base url", peer.identity)))?;
        Ok(SupernodeClient::new(
            base_url,
            client_identity.clone(),
            passphrase.to_string(),
            self.chain.clone(),
            self.config.messaging_timeout,
        ))
    }

    /// `submit(credit_pack_txid, input, model, type, parameters, max_cost,
    /// burn_addr)` (spec §4.4). `peer` is the result of [`crate::discover`].
    /// Every non-success outcome — cost ceiling, insufficient balance,
    /// malformed txid, rejection, timeout — surfaces as a typed
    /// [`InferenceError`] rather than a null result.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip(self, passphrase, model_parameters_json_b64, model_input_data_json_b64), fields(requester = %client_identity, model = model_name))]
    pub async fn submit(
        &self,
        client_identity: &Identity,
        passphrase: &str,
        peer: &Peer,
        credit_pack_txid: &str,
        model_name: &str,
        inference_type: &str,
        model_parameters_json_b64: String,
        model_input_data_json_b64: String,
        max_cost_in_credits: f64,
    ) -> Result<InferenceOutcome, InferenceError> {
        let client = self.supernode_client(peer, client_identity, passphrase)?;

        // ── Step 1: build + sign + send the usage request ───────────────────
        let request = self
            .build_usage_request(
                client_identity,
                passphrase,
                credit_pack_txid,
                model_name,
                inference_type,
                model_parameters_json_b64,
                model_input_data_json_b64,
            )
            .await?;
        self.persist(MessageKind::InferenceUsageRequest, client_identity, &request)?;

        let response = client
            .make_inference_api_usage_request(&request)
            .await
            .map_err(|e| peer_unreachable_or_fatal(peer, e))?
            .into_accepted()
            .map_err(|e| InferenceError::Rejected { reason: e.to_string() })?;
        self.validate_envelope(
            &response,
            &response.responding_supernode_pastelid,
            &[&response.sha3_256_hash_of_inference_request_fields],
            MessageKind::InferenceUsageRequest,
        )
        .await?;
        self.persist(MessageKind::InferenceUsageResponse, client_identity, &response)?;
        tracing::info!(
            proposed_cost = response.proposed_cost_in_inference_credits,
            remaining = response.remaining_credits_after_request,
            "received inference usage response"
        );

        // ── Step 2: cost ceiling + tracking-address balance check ───────────
        if response.proposed_cost_in_inference_credits > max_cost_in_credits {
            return Err(InferenceError::CostExceedsMaximum {
                proposed: response.proposed_cost_in_inference_credits,
                max: max_cost_in_credits,
            });
        }
        let required_psl = patoshis_to_psl(response.request_confirmation_message_amount_in_patoshis);
        let balance = self
            .chain
            .address_balance(&response.credit_usage_tracking_psl_address)
            .await
            .map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        if balance < required_psl {
            return Err(InferenceError::InsufficientFunds {
                need: required_psl,
                have: balance,
            });
        }

        // ── Step 3: send the tracking amount to the burn address ────────────
        let burn_address = self.config.network.burn_address();
        let mut payments = HashMap::new();
        payments.insert(burn_address.to_string(), required_psl);
        let memo = format!(
            "Confirmation tracking transaction for inference request with request_id {}",
            request.inference_request_id
        );
        let txid = self
            .chain
            .send_many(&response.credit_usage_tracking_psl_address, payments, &memo)
            .await
            .map_err(|e| InferenceError::ChainRpc(e.to_string()))?;

        // ── Step 4: validate the returned txid ───────────────────────────────
        if !is_well_formed_txid(&txid) {
            return Err(InferenceError::MalformedTxid(txid));
        }
        tracing::info!(txid = %txid, amount = required_psl, "sent inference confirmation tracking transaction");

        // ── Step 5: confirm ───────────────────────────────────────────────────
        let confirmation = self.build_confirmation(client_identity, passphrase, request.inference_request_id, &txid).await?;
        self.persist(MessageKind::InferenceConfirmation, client_identity, &confirmation)?;
        client
            .confirm_inference_request(&confirmation)
            .await
            .map_err(|e| peer_unreachable_or_fatal(peer, e))?
            .into_accepted()
            .map_err(|e| InferenceError::Rejected { reason: e.to_string() })?;

        // ── Step 6: poll for the result ───────────────────────────────────────
        let mut ready = false;
        for attempt in 0..MAX_RESULT_POLL_ATTEMPTS {
            tokio::time::sleep(poll_wait(attempt)).await;
            match client.check_status_of_inference_request_results(response.inference_response_id).await {
                Ok(true) => {
                    ready = true;
                    break;
                }
                Ok(false) => continue,
                Err(e) if e.is_peer_unreachable() => continue,
                Err(e) => return Err(InferenceError::Rejected { reason: e.to_string() }),
            }
        }
        if !ready {
            return Err(InferenceError::ResultNotReady);
        }

        // ── Step 7: retrieve + decode ─────────────────────────────────────────
        let output_result = client
            .retrieve_inference_output_results(response.inference_response_id, client_identity.as_str())
            .await
            .map_err(|e| peer_unreachable_or_fatal(peer, e))?;
        self.validate_output_result(
            &output_result,
            &response.responding_supernode_pastelid,
            &request.sha3_256_hash_of_inference_request_fields,
            &response.sha3_256_hash_of_inference_response_fields,
        )
        .await?;
        self.persist(MessageKind::InferenceOutputResult, client_identity, &output_result)?;

        let decoded = InferenceOutput::decode(&output_result, inference_type)?;
        tracing::info!(result_id = %output_result.inference_result_id, "decoded inference output result");

        Ok(InferenceOutcome {
            responder: peer.clone(),
            usage_response: response,
            output_result,
            decoded,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_usage_request(
        &self,
        client_identity: &Identity,
        passphrase: &str,
        credit_pack_txid: &str,
        model_name: &str,
        inference_type: &str,
        model_parameters_json_b64: String,
        model_input_data_json_b64: String,
    ) -> Result<InferenceUsageRequest, InferenceError> {
        let height = self.chain.best_block_height().await.map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        let mut draft = InferenceUsageRequest {
            inference_request_id: Uuid::new_v4(),
            credit_pack_ticket_registration_txid: credit_pack_txid.to_string(),
            requesting_user_pastelid: client_identity.clone(),
            requested_model_canonical_string: model_name.to_string(),
            model_inference_type_string: inference_type.to_string(),
            model_parameters_json_b64,
            model_input_data_json_b64,
            inference_request_utc_timestamp: Utc::now(),
            inference_request_pastel_block_height: height,
            inference_request_version: "1.0".to_string(),
            sha3_256_hash_of_inference_request_fields: String::new(),
            requesting_user_pastelid_signature_on_request_hash: String::new(),
        };
        let hash = hash_fields(&draft).map_err(|e| InferenceError::ProtocolViolation(e.to_string()))?;
        draft.sha3_256_hash_of_inference_request_fields = hash.clone();
        draft.requesting_user_pastelid_signature_on_request_hash = self
            .chain
            .sign(client_identity, &hash, passphrase)
            .await
            .map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        Ok(draft)
    }

    async fn build_confirmation(
        &self,
        client_identity: &Identity,
        passphrase: &str,
        inference_request_id: Uuid,
        txid: &str,
    ) -> Result<InferenceConfirmation, InferenceError> {
        let height = self.chain.best_block_height().await.map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        let mut draft = InferenceConfirmation {
            inference_request_id,
            requesting_user_pastelid: client_identity.clone(),
            txid: txid.to_string(),
            inference_confirmation_utc_timestamp: Utc::now(),
            inference_confirmation_pastel_block_height: height,
            inference_confirmation_version: "1.0".to_string(),
            sha3_256_hash_of_inference_confirmation_fields: String::new(),
            requesting_user_pastelid_signature_on_confirmation_hash: String::new(),
        };
        let hash = hash_fields(&draft).map_err(|e| InferenceError::ProtocolViolation(e.to_string()))?;
        draft.sha3_256_hash_of_inference_confirmation_fields = hash.clone();
        draft.requesting_user_pastelid_signature_on_confirmation_hash = self
            .chain
            .sign(client_identity, &hash, passphrase)
            .await
            .map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        Ok(draft)
    }

    /// Invariants 1, 3, 4 (hash/clock/height), invariant 5 (`predecessors`
    /// must be present in `self.store` under `predecessor_kind`), plus
    /// invariant 2 (signature), matching `CreditPackEngine::validate_envelope`.
    async fn validate_envelope<T: Envelope>(
        &self,
        message: &T,
        signer: &Identity,
        predecessors: &[&str],
        predecessor_kind: MessageKind,
    ) -> Result<(), InferenceError> {
        let local_height = self.chain.best_block_height().await.map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        let mut violations = validate_local(
            message,
            Utc::now(),
            local_height,
            self.config.clock_skew_tolerance,
            self.config.max_block_height_difference,
            predecessors,
            |hash| self.store.get_by_hash(predecessor_kind, hash).ok().flatten().is_some(),
        );
        let ok = self
            .chain
            .verify(signer, message.hash_value(), message.signature_value())
            .await
            .map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        if !ok {
            violations.push(pastel_client_crypto::Violation::SignatureInvalid {
                signer: signer.to_string(),
            });
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(InferenceError::Validation(violations))
        }
    }

    /// [`pastel_client_core::messages::InferenceOutputResult`]'s carried
    /// signature signs `inference_result_id`, not the whole-fields hash
    /// (spec §4.5's "responder signature on result id"; see that message's
    /// doc comment). So this checks the ordinary hash/clock/height
    /// invariants via [`validate_local`], then verifies the signature
    /// against a hash of the result id specifically rather than via the
    /// generic `validate_envelope` path, which would check it against the
    /// wrong hash.
    ///
    /// `request_hash`/`response_hash` are the originating
    /// `InferenceUsageRequest`/`InferenceUsageResponse` hashes this result
    /// links back to (invariant 5); both must already be in `self.store`.
    async fn validate_output_result(
        &self,
        result: &pastel_client_core::messages::InferenceOutputResult,
        signer: &Identity,
        request_hash: &str,
        response_hash: &str,
    ) -> Result<(), InferenceError> {
        let local_height = self.chain.best_block_height().await.map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        let mut violations = validate_local(
            result,
            Utc::now(),
            local_height,
            self.config.clock_skew_tolerance,
            self.config.max_block_height_difference,
            &[request_hash, response_hash],
            |hash| {
                self.store.get_by_hash(MessageKind::InferenceUsageRequest, hash).ok().flatten().is_some()
                    || self.store.get_by_hash(MessageKind::InferenceUsageResponse, hash).ok().flatten().is_some()
            },
        );
        let result_id_hash = hash_bytes(result.inference_result_id.to_string().as_bytes());
        let ok = self
            .chain
            .verify(signer, &result_id_hash, &result.responding_supernode_signature_on_result_id)
            .await
            .map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
        if !ok {
            violations.push(pastel_client_crypto::Violation::SignatureInvalid {
                signer: signer.to_string(),
            });
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(InferenceError::Validation(violations))
        }
    }

    fn persist<T: Envelope>(&self, kind: MessageKind, identity: &Identity, message: &T) -> Result<(), InferenceError> {
        let payload = serde_json::to_value(message).map_err(|e| InferenceError::ProtocolViolation(e.to_string()))?;
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
            .map_err(|e| InferenceError::ProtocolViolation(e.to_string()))
    }
}

/// `/^[0-9a-fA-F]{64}$/` (spec §4.4 step 4).
fn is_well_formed_txid(txid: &str) -> bool {
    txid.len() == 64 && txid.bytes().all(|b| b.is_ascii_hexdigit())
}

fn peer_unreachable_or_fatal(peer: &Peer, e: pastel_client_http::SupernodeError) -> InferenceError {
    if e.is_peer_unreachable() {
        InferenceError::PeerUnreachable {
            peer: peer.identity.to_string(),
            reason: e.to_string(),
        }
    } else {
        InferenceError::Rejected { reason: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txid_must_be_64_hex_chars() {
        assert!(is_well_formed_txid(&"a".repeat(64)));
        assert!(!is_well_formed_txid(&"a".repeat(63)));
        assert!(!is_well_formed_txid("not-hex-at-all-and-also-too-short"));
    }

    #[test]
    fn poll_wait_grows_exponentially() {
        assert!((poll_wait(0).as_secs_f64() - 3.0).abs() < 1e-9);
        assert!(poll_wait(10).as_secs_f64() > poll_wait(0).as_secs_f64());
    }
}
