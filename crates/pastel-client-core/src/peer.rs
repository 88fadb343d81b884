use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// Status of a masternode as reported by `masternode list full`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerStatus {
    Enabled,
    /// Any other status string (`PRE_ENABLED`, `EXPIRED`, `WATCHDOG_EXPIRED`,
    /// ...). Carried verbatim since the protocol only distinguishes
    /// `ENABLED` from everything else.
    Other(String),
}

impl PeerStatus {
    pub fn from_raw(s: &str) -> Self {
        if s == "ENABLED" {
            PeerStatus::Enabled
        } else {
            PeerStatus::Other(s.to_string())
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, PeerStatus::Enabled)
    }
}

/// A supernode entry from the masternode-list snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peer {
    pub identity: Identity,
    /// `ip:port` as reported by `masternode list full`.
    pub socket_addr: String,
    pub status: PeerStatus,
    pub protocol_version: String,
    pub rank: u32,
    /// Equals `identity`; kept as a distinct field because the routing
    /// layer receives it over the wire as its own key (spec §3).
    pub ext_key: Identity,
}

impl Peer {
    /// Host portion of `socket_addr`, used to build the supernode HTTP base
    /// URL (`http://<host>:7123`, spec §4.2).
    pub fn host(&self) -> Option<&str> {
        self.socket_addr.split(':').next().filter(|h| !h.is_empty())
    }

    /// True if `socket_addr` parses as `host:port` with a non-empty host
    /// and a numeric port.
    pub fn has_well_formed_socket_addr(&self) -> bool {
        match self.socket_addr.split_once(':') {
            Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
            None => false,
        }
    }

    /// `http://<host>:7123`, the fixed supernode HTTP port (spec §4.2).
    pub fn base_url(&self) -> Option<String> {
        self.host().map(|h| format!("http://{h}:7123"))
    }
}

/// A snapshot of the masternode list at one point in time, cached for the
/// length of one top-level operation (spec §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub peers: Vec<Peer>,
}

impl PeerSnapshot {
    pub fn new(peers: Vec<Peer>) -> Self {
        Self { peers }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn find(&self, identity: &Identity) -> Option<&Peer> {
        self.peers.iter().find(|p| &p.identity == identity)
    }
}
