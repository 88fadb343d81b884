//! pastel-client-core
//!
//! Shared data model for the Pastel inference client: identities, peers,
//! the envelope trait every protocol message implements, the concrete
//! message kinds of the credit-pack purchase and inference-request
//! protocols, configuration, and the shared error taxonomy.

pub mod chain;
pub mod config;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod messages;
pub mod model_menu;
pub mod peer;
pub mod retry;
pub mod units;

pub use chain::ChainFacade;
pub use config::ClientConfig;
pub use envelope::Envelope;
pub use error::ProtocolError;
pub use identity::Identity;
pub use peer::{Peer, PeerStatus};
