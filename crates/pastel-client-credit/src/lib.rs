//! pastel-client-credit
//!
//! Credit-pack purchase state machine (spec §4.3): build and sign a
//! purchase request, negotiate a price quote, collect and verify the
//! quorum-signed purchase response, burn the agreed PSL total, confirm
//! the purchase, poll for completion, and fall back to storage retry
//! when no peer reports completion in time.

pub mod engine;
pub mod error;
pub mod state;

pub use engine::{CreditPackEngine, RESPONDER_BAND_SIZE};
pub use error::CreditPackError;
pub use state::{PurchaseOutcome, PurchaseState};
