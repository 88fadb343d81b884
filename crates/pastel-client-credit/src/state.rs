use pastel_client_core::messages::{CreditPackPurchaseRequest, CreditPackPurchaseResponse};

/// States of the purchase state machine (spec §4.3). Tracked purely for
/// structured logging at each transition; the engine itself is a straight
/// line of `async fn` calls rather than an explicit state-transition table,
/// since no external event re-enters the machine mid-flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PurchaseState {
    Init,
    Requested,
    Quoted,
    Agreed,
    Signed,
    BurnSent,
    Confirmed,
    Completed,
    Declined,
    Rejected,
    Terminated,
    StorageFailed,
    Failed,
}

impl PurchaseState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PurchaseState::Completed
                | PurchaseState::Declined
                | PurchaseState::Rejected
                | PurchaseState::Terminated
                | PurchaseState::Failed
        )
    }
}

/// The successful result of a completed purchase.
#[derive(Clone, Debug)]
pub struct PurchaseOutcome {
    pub request: CreditPackPurchaseRequest,
    pub response: CreditPackPurchaseResponse,
    pub burn_txid: String,
    pub credit_pack_registration_txid: String,
    /// True when the original responder's status poll never reported
    /// `completed` and the registration txid came from the storage-retry
    /// fallback path instead (spec §4.3 scenario 3).
    pub recovered_via_storage_retry: bool,
}
