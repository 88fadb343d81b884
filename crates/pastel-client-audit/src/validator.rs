use crate::error::AuditError;
use crate::fields::{response_fields, result_fields, RESPONSE_FIELD_NAMES, RESULT_FIELD_NAMES};
use pastel_client_core::messages::{InferenceOutputResult, InferenceUsageResponse};
use pastel_client_core::peer::PeerSnapshot;
use pastel_client_core::{Identity, Peer};
use pastel_client_crypto::Signer;
use pastel_client_http::SupernodeClient;
use pastel_client_peers::{top_n_by_xor, MasternodeSource, PeerRegistry};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Number of audit peers queried per spec §4.5 step 1: "the four
/// XOR-closest peers to the local identity, excluding the responder".
pub const AUDITOR_COUNT: usize = 4;

/// Gap between the audit-response and audit-result phases (spec §4.5 step
/// 2, and spec §9's resolution of the hung `new Promise()` bug: the
/// original intent was a bounded ~20 s sleep, not an unresolved promise).
pub const AUDIT_PHASE_GAP: Duration = Duration::from_secs(20);

/// `{response_validation: {field: bool}, result_validation: {field: bool}}`
/// (spec §4.5 step 4): whether the responder's claimed value equals the
/// plurality value observed across the auditor peers queried.
#[derive(Clone, Debug)]
pub struct AuditOutcome {
    pub response_validation: HashMap<String, bool>,
    pub result_validation: HashMap<String, bool>,
}

/// Quorum audit validator (spec §4.5). Re-queries peers other than the
/// original responder and checks the responder's claimed fields against
/// the majority value those auditors report.
///
/// Generic over `C` for the same reason `CreditPackEngine`/`InferenceEngine`
/// are: one cheap-to-clone chain-node handle signs the challenge-response
/// handshake for every per-auditor [`SupernodeClient`] this validator
/// builds.
pub struct AuditValidator<C>
where
    C: Signer + Clone + Send + Sync + 'static,
{
    chain: C,
    messaging_timeout: Duration,
}

impl<C> AuditValidator<C>
where
    C: Signer + Clone + Send + Sync + 'static,
{
    pub fn new(chain: C, messaging_timeout: Duration) -> Self {
        Self { chain, messaging_timeout }
    }

    fn client_for(&self, peer: &Peer, client_identity: &Identity, passphrase: &str) -> Option<SupernodeClient<C>> {
        let base_url = peer.base_url()?;
        Some(SupernodeClient::new(
            base_url,
            client_identity.clone(),
            passphrase.to_string(),
            self.chain.clone(),
            self.messaging_timeout,
        ))
    }

    /// Audits one inference response/result pair (spec §4.5).
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip(self, passphrase, original_response, original_result), fields(responder = %responder))]
    pub async fn audit<MS>(
        &self,
        registry: &PeerRegistry<MS>,
        client_identity: &Identity,
        passphrase: &str,
        responder: &Identity,
        inference_response_id: Uuid,
        original_response: &InferenceUsageResponse,
        original_result: &InferenceOutputResult,
    ) -> Result<AuditOutcome, AuditError>
    where
        MS: MasternodeSource,
    {
        let active = registry
            .active_snapshot()
            .await
            .map_err(|e| AuditError::PeerRegistry(e.to_string()))?;
        let candidates = PeerSnapshot::new(active.peers.into_iter().filter(|p| &p.identity != responder).collect());
        let auditors: Vec<Peer> = top_n_by_xor(client_identity, &candidates, AUDITOR_COUNT)
            .into_iter()
            .cloned()
            .collect();
        if auditors.is_empty() {
            return Err(AuditError::NoAuditorsAvailable);
        }
        tracing::info!(auditor_count = auditors.len(), "selected audit peers");

        // ── Phase 1: audit_inference_request_response ────────────────────────
        let mut phase1: JoinSet<Option<InferenceUsageResponse>> = JoinSet::new();
        for peer in &auditors {
            let Some(client) = self.client_for(peer, client_identity, passphrase) else { continue };
            phase1.spawn(async move { client.audit_inference_request_response(inference_response_id).await.ok() });
        }
        let mut response_reports = Vec::new();
        while let Some(joined) = phase1.join_next().await {
            if let Ok(Some(response)) = joined {
                response_reports.push(response);
            }
        }
        tracing::info!(reports = response_reports.len(), "collected audit response phase");

        tokio::time::sleep(AUDIT_PHASE_GAP).await;

        // ── Phase 2: audit_inference_request_result ──────────────────────────
        let mut phase2: JoinSet<Option<InferenceOutputResult>> = JoinSet::new();
        for peer in &auditors {
            let Some(client) = self.client_for(peer, client_identity, passphrase) else { continue };
            phase2.spawn(async move { client.audit_inference_request_result(inference_response_id).await.ok() });
        }
        let mut result_reports = Vec::new();
        while let Some(joined) = phase2.join_next().await {
            if let Ok(Some(result)) = joined {
                result_reports.push(result);
            }
        }
        tracing::info!(reports = result_reports.len(), "collected audit result phase");

        let response_votes: Vec<HashMap<&'static str, String>> = response_reports.iter().map(response_fields).collect();
        let result_votes: Vec<HashMap<&'static str, String>> = result_reports.iter().map(result_fields).collect();
        let original_response_fields = response_fields(original_response);
        let original_result_fields = result_fields(original_result);

        let response_validation = RESPONSE_FIELD_NAMES
            .iter()
            .map(|&field| {
                let votes: Vec<&str> = response_votes.iter().filter_map(|m| m.get(field).map(String::as_str)).collect();
                let agrees = match majority(&votes) {
                    Some(plurality) => original_response_fields.get(field).map(String::as_str) == Some(plurality),
                    None => false,
                };
                (field.to_string(), agrees)
            })
            .collect();

        let result_validation = RESULT_FIELD_NAMES
            .iter()
            .map(|&field| {
                let votes: Vec<&str> = result_votes.iter().filter_map(|m| m.get(field).map(String::as_str)).collect();
                let agrees = match majority(&votes) {
                    Some(plurality) => original_result_fields.get(field).map(String::as_str) == Some(plurality),
                    None => false,
                };
                (field.to_string(), agrees)
            })
            .collect();

        Ok(AuditOutcome {
            response_validation,
            result_validation,
        })
    }
}

/// Strict-plurality majority with ties broken by first occurrence (spec
/// §4.5 step 3 / §8 scenario 6): the candidate with the first strictly
/// greater vote count wins; a value seen earlier keeps its lead over one
/// seen later with the same count.
fn majority<'a>(votes: &[&'a str]) -> Option<&'a str> {
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    for &vote in votes {
        match counts.iter_mut().find(|(value, _)| *value == vote) {
            Some(entry) => entry.1 += 1,
            None => counts.push((vote, 1)),
        }
    }
    let mut best: Option<(&'a str, usize)> = None;
    for (value, count) in counts {
        if best.map(|(_, best_count)| count > best_count).unwrap_or(true) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_picks_strict_plurality() {
        assert_eq!(majority(&["120", "120", "130"]), Some("120"));
    }

    #[test]
    fn majority_breaks_ties_by_first_occurrence() {
        assert_eq!(majority(&["b", "a", "a", "b"]), Some("b"));
    }

    #[test]
    fn majority_of_no_votes_is_none() {
        assert_eq!(majority(&[]), None);
    }
}
