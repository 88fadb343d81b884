use crate::hash::hash_fields;
use crate::signer::Verifier;
use chrono::{DateTime, Utc};
use pastel_client_core::{Envelope, Identity};
use std::time::Duration;

/// One failed invariant from spec §3. The caller decides whether a given
/// violation is fatal or a warning (spec §4.1 `validate`).
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Invariant 1: the recomputed hash doesn't match the carried hash.
    HashMismatch { expected: String, computed: String },
    /// Invariant 2: the signature doesn't verify under the claimed signer.
    SignatureInvalid { signer: String },
    /// Invariant 3: `|now - message_timestamp| > T_clock`.
    ClockSkewExceeded { skew_secs: i64, tolerance_secs: i64 },
    /// Invariant 4: `|local_best_height - message_height| > H_skew`.
    HeightSkewExceeded { skew_blocks: i64, tolerance_blocks: u64 },
    /// Invariant 5: a hash-linked predecessor is unknown.
    UnknownPredecessor { hash: String },
}

/// Run the invariants that can be checked without contacting a peer or
/// the chain node: hash recomputation (invariant 1), clock skew
/// (invariant 3), height skew (invariant 4), and predecessor presence
/// (invariant 5).
///
/// `predecessors` lists every hash this message links back to (spec §3
/// invariant 5: "all hash-linked predecessors referenced by a message are
/// known and valid, or the message is rejected"). Each one is looked up
/// via `is_known_predecessor`, a thin closure the caller supplies over its
/// own `Store` (e.g. `|hash| store.get_by_hash(MessageKind::X, hash).ok().flatten().is_some()`)
/// — this crate has no persistence dependency of its own, so the lookup
/// itself stays at the call site while the invariant check stays here.
///
/// Invariant 2 (signature verification) requires the external signer and
/// is checked separately by [`verify_signature`], since it is the only
/// invariant that needs network I/O.
pub fn validate_local<T: Envelope>(
    message: &T,
    now: DateTime<Utc>,
    local_best_height: u64,
    clock_skew_tolerance: Duration,
    height_skew_tolerance: u64,
    predecessors: &[&str],
    is_known_predecessor: impl Fn(&str) -> bool,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    match hash_fields(message) {
        Ok(computed) if computed != message.hash_value() => {
            violations.push(Violation::HashMismatch {
                expected: message.hash_value().to_string(),
                computed,
            });
        }
        Err(_) => {
            violations.push(Violation::HashMismatch {
                expected: message.hash_value().to_string(),
                computed: String::new(),
            });
        }
        _ => {}
    }

    let skew_secs = (now - message.timestamp()).num_seconds();
    if skew_secs.unsigned_abs() > clock_skew_tolerance.as_secs() {
        violations.push(Violation::ClockSkewExceeded {
            skew_secs,
            tolerance_secs: clock_skew_tolerance.as_secs() as i64,
        });
    }

    let height_skew = local_best_height as i64 - message.block_height() as i64;
    if height_skew.unsigned_abs() > height_skew_tolerance {
        violations.push(Violation::HeightSkewExceeded {
            skew_blocks: height_skew,
            tolerance_blocks: height_skew_tolerance,
        });
    }

    for predecessor in predecessors {
        if predecessor.is_empty() || !is_known_predecessor(predecessor) {
            violations.push(Violation::UnknownPredecessor {
                hash: (*predecessor).to_string(),
            });
        }
    }

    violations
}

/// Invariant 2: the carried signature verifies under `signer` over
/// `message.hash_value()`.
pub async fn verify_signature<T: Envelope, V: Verifier>(
    message: &T,
    signer: &Identity,
    verifier: &V,
) -> Result<Option<Violation>, V::Error> {
    let ok = verifier
        .verify(signer, message.hash_value(), message.signature_value())
        .await?;
    if ok {
        Ok(None)
    } else {
        Ok(Some(Violation::SignatureInvalid {
            signer: signer.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pastel_client_core::messages::CreditPackPurchaseRequest;
    use pastel_client_core::Identity;

    fn sample_message() -> CreditPackPurchaseRequest {
        CreditPackPurchaseRequest {
            requesting_end_user_pastelid: Identity::new_unchecked("requester"),
            requested_initial_credits_in_credit_pack: 100,
            list_of_authorized_pastelids_allowed_to_use_credit_pack: vec![],
            credit_usage_tracking_psl_address: "addr".to_string(),
            credit_pack_purchase_request_utc_timestamp: Utc::now(),
            credit_pack_purchase_request_pastel_block_height: 1_000,
            credit_pack_purchase_request_version: "1.0".to_string(),
            sha3_256_hash_of_credit_pack_purchase_request_fields: "irrelevant".to_string(),
            requesting_end_user_pastelid_signature_on_request_hash: "irrelevant".to_string(),
        }
    }

    #[test]
    fn known_predecessor_produces_no_violation() {
        let message = sample_message();
        let violations = validate_local(
            &message,
            Utc::now(),
            1_000,
            Duration::from_secs(600),
            2,
            &["predecessor-hash"],
            |h| h == "predecessor-hash",
        );
        assert!(!violations
            .iter()
            .any(|v| matches!(v, Violation::UnknownPredecessor { .. })));
    }

    #[test]
    fn unreferenced_predecessor_is_rejected() {
        let message = sample_message();
        let violations = validate_local(
            &message,
            Utc::now(),
            1_000,
            Duration::from_secs(600),
            2,
            &["never-persisted-hash"],
            |_| false,
        );
        assert!(violations.iter().any(
            |v| matches!(v, Violation::UnknownPredecessor { hash } if hash == "never-persisted-hash")
        ));
    }

    #[test]
    fn empty_predecessor_hash_is_always_unknown() {
        let message = sample_message();
        let violations = validate_local(&message, Utc::now(), 1_000, Duration::from_secs(600), 2, &[""], |_| true);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::UnknownPredecessor { .. })));
    }
}
