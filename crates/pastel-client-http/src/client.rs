use crate::envelope::{wrap_payload, Challenge};
use crate::error::SupernodeError;
use pastel_client_core::messages::{
    CreditPackPurchaseCompletionAnnouncement, CreditPackPurchaseRequest, CreditPackPurchaseResponse,
    InferenceConfirmation, InferenceOutputResult, InferenceUsageRequest, InferenceUsageResponse,
    PeerOutcome, PreliminaryPriceQuote, PriceQuoteResponse, PurchaseConfirmation, PurchaseStatus,
    StorageRetryRequest, StorageRetryResponse,
};
use pastel_client_core::model_menu::ModelMenu;
use pastel_client_core::retry::with_backoff;
use pastel_client_core::Identity;
use pastel_client_crypto::Signer;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;

/// Per-edge retry budget for network/5xx failures (spec §4.3's failure
/// semantics: "retried with exponential backoff..., max 2 attempts per
/// edge"). A typed rejection is never retried — see
/// [`SupernodeError::is_peer_unreachable`].
const MAX_RETRIES_PER_EDGE: u32 = 2;
const RETRY_BASE: Duration = Duration::from_millis(250);

/// Per-endpoint timeout multipliers on `T_msg` (spec §5): ordinary calls
/// use `T_msg`; long-running endpoints (price-quote response, inference
/// usage request, inference confirmation) use a multiple of it.
#[derive(Clone, Copy, Debug)]
pub enum TimeoutTier {
    Standard,
    Long,
    ExtraLong,
}

impl TimeoutTier {
    fn multiplier(self) -> u32 {
        match self {
            TimeoutTier::Standard => 1,
            TimeoutTier::Long => 2,
            TimeoutTier::ExtraLong => 3,
        }
    }
}

/// A typed client for one supernode's HTTP interface (spec §4.3/§4.4/§4.5,
/// base URL from spec §4.2's `http://<host>:7123`).
pub struct SupernodeClient<S: Signer> {
    base_url: String,
    http: reqwest::Client,
    client_identity: Identity,
    passphrase: String,
    signer: S,
    base_timeout: Duration,
    challenge: RwLock<Option<Challenge>>,
}

impl<S: Signer> SupernodeClient<S> {
    pub fn new(base_url: impl Into<String>, client_identity: Identity, passphrase: String, signer: S, base_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            client_identity,
            passphrase,
            signer,
            base_timeout,
            challenge: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn challenge(&self) -> Result<Challenge, SupernodeError> {
        if let Some(c) = self.challenge.read().await.clone() {
            return Ok(c);
        }
        let endpoint = format!("request_challenge/{}", self.client_identity.as_str());
        let url = format!("{}/request_challenge/{}", self.base_url, self.client_identity.as_str());
        let resp = self
            .http
            .get(&url)
            .timeout(self.base_timeout)
            .send()
            .await
            .map_err(|source| SupernodeError::Transport {
                peer: self.base_url.clone(),
                endpoint: endpoint.clone(),
                source,
            })?;
        let challenge: Challenge = resp.json().await.map_err(|source| SupernodeError::Transport {
            peer: self.base_url.clone(),
            endpoint,
            source,
        })?;
        *self.challenge.write().await = Some(challenge.clone());
        Ok(challenge)
    }

    async fn challenge_signature(&self, challenge: &str) -> Result<String, SupernodeError> {
        let hash = pastel_client_crypto::hash::hash_bytes(challenge.as_bytes());
        self.signer
            .sign(&self.client_identity, &hash, &self.passphrase)
            .await
            .map_err(|e| SupernodeError::Signing {
                peer: self.base_url.clone(),
                reason: e.to_string(),
            })
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        payload: &Req,
        tier: TimeoutTier,
    ) -> Result<PeerOutcome<Resp>, SupernodeError> {
        let challenge = self.challenge().await?;
        let signature = self.challenge_signature(&challenge.challenge).await?;
        let body = wrap_payload(
            serde_json::to_value(payload).expect("payload serialization is infallible"),
            &challenge,
            &signature,
        );

        let url = format!("{}/{}", self.base_url, path);
        let timeout = self.base_timeout * tier.multiplier();

        let value: Value = with_backoff(MAX_RETRIES_PER_EDGE, RETRY_BASE, is_retryable_edge_failure, || async {
            let resp = self
                .http
                .post(&url)
                .timeout(timeout)
                .json(&body)
                .send()
                .await
                .map_err(|source| SupernodeError::Transport {
                    peer: self.base_url.clone(),
                    endpoint: path.to_string(),
                    source,
                })?;

            if !resp.status().is_success() {
                return Err(SupernodeError::HttpStatus {
                    peer: self.base_url.clone(),
                    endpoint: path.to_string(),
                    status: resp.status().as_u16(),
                });
            }

            resp.json().await.map_err(|source| SupernodeError::Transport {
                peer: self.base_url.clone(),
                endpoint: path.to_string(),
                source,
            })
        })
        .await?;

        serde_json::from_value(value).map_err(|source| SupernodeError::Decode {
            peer: self.base_url.clone(),
            endpoint: path.to_string(),
            source,
        })
    }

    async fn get<Resp: DeserializeOwned>(&self, path: &str, tier: TimeoutTier) -> Result<Resp, SupernodeError> {
        let timeout = self.base_timeout * tier.multiplier();
        let url = format!("{}/{}", self.base_url, path);

        with_backoff(MAX_RETRIES_PER_EDGE, RETRY_BASE, is_retryable_edge_failure, || async {
            let resp = self
                .http
                .get(&url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|source| SupernodeError::Transport {
                    peer: self.base_url.clone(),
                    endpoint: path.to_string(),
                    source,
                })?;
            if !resp.status().is_success() {
                return Err(SupernodeError::HttpStatus {
                    peer: self.base_url.clone(),
                    endpoint: path.to_string(),
                    status: resp.status().as_u16(),
                });
            }
            resp.json().await.map_err(|source| SupernodeError::Transport {
                peer: self.base_url.clone(),
                endpoint: path.to_string(),
                source,
            })
        })
        .await
    }

    // ── Credit-pack purchase endpoints ───────────────────────────────────────

    pub async fn credit_purchase_initial_request(
        &self,
        req: &CreditPackPurchaseRequest,
    ) -> Result<PeerOutcome<PreliminaryPriceQuote>, SupernodeError> {
        self.post("credit_purchase_initial_request", req, TimeoutTier::Standard).await
    }

    pub async fn credit_purchase_preliminary_price_quote_response(
        &self,
        req: &PriceQuoteResponse,
    ) -> Result<PeerOutcome<CreditPackPurchaseResponse>, SupernodeError> {
        self.post(
            "credit_purchase_preliminary_price_quote_response",
            req,
            TimeoutTier::Long,
        )
        .await
    }

    /// `POST /credit_pack_purchase_confirmation`: the BURN_SENT → CONFIRMED
    /// transition of the purchase state machine, embedding the burn txid.
    pub async fn credit_pack_purchase_confirmation(
        &self,
        confirmation: &PurchaseConfirmation,
    ) -> Result<PeerOutcome<PurchaseStatus>, SupernodeError> {
        self.post("credit_pack_purchase_confirmation", confirmation, TimeoutTier::Standard).await
    }

    pub async fn check_status_of_credit_purchase_request(
        &self,
        confirmation_hash: &str,
    ) -> Result<PeerOutcome<PurchaseStatus>, SupernodeError> {
        self.post(
            "check_status_of_credit_purchase_request",
            &serde_json::json!({ "sha3_256_hash_of_credit_pack_purchase_confirmation_fields": confirmation_hash }),
            TimeoutTier::Standard,
        )
        .await
    }

    pub async fn credit_pack_purchase_completion_announcement(
        &self,
        announcement: &CreditPackPurchaseCompletionAnnouncement,
    ) -> Result<(), SupernodeError> {
        let _: PeerOutcome<Value> = self
            .post(
                "credit_pack_purchase_completion_announcement",
                announcement,
                TimeoutTier::Standard,
            )
            .await?;
        Ok(())
    }

    pub async fn credit_pack_storage_retry_request(
        &self,
        req: &StorageRetryRequest,
    ) -> Result<PeerOutcome<StorageRetryResponse>, SupernodeError> {
        self.post("credit_pack_storage_retry_request", req, TimeoutTier::Standard).await
    }

    pub async fn credit_pack_storage_retry_completion_announcement(
        &self,
        announcement: &CreditPackPurchaseCompletionAnnouncement,
    ) -> Result<(), SupernodeError> {
        let _: PeerOutcome<Value> = self
            .post(
                "credit_pack_storage_retry_completion_announcement",
                announcement,
                TimeoutTier::Standard,
            )
            .await?;
        Ok(())
    }

    pub async fn get_credit_pack_ticket_from_txid(&self, txid: &str) -> Result<Value, SupernodeError> {
        self.get(&format!("get_credit_pack_ticket_from_txid?txid={txid}"), TimeoutTier::Standard)
            .await
    }

    // ── Inference endpoints ───────────────────────────────────────────────────

    pub async fn get_inference_model_menu(&self) -> Result<ModelMenu, SupernodeError> {
        self.get("get_inference_model_menu", TimeoutTier::Standard).await
    }

    pub async fn make_inference_api_usage_request(
        &self,
        req: &InferenceUsageRequest,
    ) -> Result<PeerOutcome<InferenceUsageResponse>, SupernodeError> {
        self.post("make_inference_api_usage_request", req, TimeoutTier::ExtraLong).await
    }

    pub async fn confirm_inference_request(
        &self,
        confirmation: &InferenceConfirmation,
    ) -> Result<PeerOutcome<Value>, SupernodeError> {
        self.post("confirm_inference_request", confirmation, TimeoutTier::ExtraLong).await
    }

    pub async fn check_status_of_inference_request_results(
        &self,
        response_id: uuid::Uuid,
    ) -> Result<bool, SupernodeError> {
        self.get(
            &format!("check_status_of_inference_request_results/{response_id}"),
            TimeoutTier::Standard,
        )
        .await
    }

    pub async fn retrieve_inference_output_results(
        &self,
        inference_response_id: uuid::Uuid,
        pastelid: &str,
    ) -> Result<InferenceOutputResult, SupernodeError> {
        self.get(
            &format!("retrieve_inference_output_results?inference_response_id={inference_response_id}&pastelid={pastelid}"),
            TimeoutTier::Standard,
        )
        .await
    }

    // ── Audit endpoints ───────────────────────────────────────────────────────

    pub async fn audit_inference_request_response(
        &self,
        inference_response_id: uuid::Uuid,
    ) -> Result<InferenceUsageResponse, SupernodeError> {
        self.post(
            "audit_inference_request_response",
            &serde_json::json!({ "inference_response_id": inference_response_id }),
            TimeoutTier::Standard,
        )
        .await
        .and_then(|outcome| {
            outcome.into_accepted().map_err(|e| SupernodeError::Rejected {
                peer: self.base_url.clone(),
                endpoint: "audit_inference_request_response".to_string(),
                reason: e.to_string(),
            })
        })
    }

    pub async fn audit_inference_request_result(
        &self,
        inference_response_id: uuid::Uuid,
    ) -> Result<InferenceOutputResult, SupernodeError> {
        self.post(
            "audit_inference_request_result",
            &serde_json::json!({ "inference_response_id": inference_response_id }),
            TimeoutTier::Standard,
        )
        .await
        .and_then(|outcome| {
            outcome.into_accepted().map_err(|e| SupernodeError::Rejected {
                peer: self.base_url.clone(),
                endpoint: "audit_inference_request_result".to_string(),
                reason: e.to_string(),
            })
        })
    }

    // ── Messaging ─────────────────────────────────────────────────────────────

    pub async fn send_user_message(&self, to_pastelid: &str, body: &str) -> Result<(), SupernodeError> {
        let _: PeerOutcome<Value> = self
            .post(
                "send_user_message",
                &serde_json::json!({ "to_pastelid": to_pastelid, "message_body": body }),
                TimeoutTier::Standard,
            )
            .await?;
        Ok(())
    }

    pub async fn get_user_messages(&self, pastelid: &str) -> Result<Vec<Value>, SupernodeError> {
        self.get(&format!("get_user_messages?pastelid={pastelid}"), TimeoutTier::Standard)
            .await
    }
}

/// Transport failures and HTTP 5xx are worth one retry before falling
/// through to the next peer; a rejection, a decode failure, or a 4xx is
/// not (spec §4.3: "network/HTTP 5xx at any step is retried...").
fn is_retryable_edge_failure(err: &SupernodeError) -> bool {
    matches!(
        err,
        SupernodeError::Transport { .. } | SupernodeError::Timeout { .. }
    ) || matches!(err, SupernodeError::HttpStatus { status, .. } if *status >= 500)
}
