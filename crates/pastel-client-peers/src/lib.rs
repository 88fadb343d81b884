//! pastel-client-peers
//!
//! Maintains a current peer set and answers routing queries (spec §4.2).

pub mod registry;
pub mod source;

pub use registry::PeerRegistry;
pub use source::MasternodeSource;

use pastel_client_core::{Identity, Peer, PeerSnapshot};
use pastel_client_crypto::xor_distance;

/// `top_n_by_xor(identity, snapshot, n)`: the `n` peers whose identity is
/// XOR-closest to `identity`, ties broken by lexicographic identity
/// (stable). Spec §8: `top_n_by_xor(I, P, n)` must be a stable prefix of
/// `top_n_by_xor(I, P, n+1)` — guaranteed here by sorting the whole
/// snapshot once and truncating.
pub fn top_n_by_xor<'a>(identity: &Identity, snapshot: &'a PeerSnapshot, n: usize) -> Vec<&'a Peer> {
    let mut ranked: Vec<&Peer> = snapshot.peers.iter().collect();
    ranked.sort_by(|a, b| {
        let da = xor_distance(identity.as_str(), a.identity.as_str());
        let db = xor_distance(identity.as_str(), b.identity.as_str());
        da.cmp(&db).then_with(|| a.identity.as_str().cmp(b.identity.as_str()))
    });
    ranked.truncate(n);
    ranked
}

/// `closest_to_pastelid(identity, snapshot)`: `top_n_by_xor(..., 1)[0]`.
pub fn closest_to_pastelid<'a>(identity: &Identity, snapshot: &'a PeerSnapshot) -> Option<&'a Peer> {
    top_n_by_xor(identity, snapshot, 1).into_iter().next()
}

/// `filter_active(snapshot)`: keeps only peers whose `status` is
/// `"ENABLED"` and that have a well-formed `ip:port`.
pub fn filter_active(snapshot: &PeerSnapshot) -> PeerSnapshot {
    let peers = snapshot
        .peers
        .iter()
        .filter(|p| p.status.is_enabled() && p.has_well_formed_socket_addr())
        .cloned()
        .collect();
    PeerSnapshot::new(peers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pastel_client_core::peer::PeerStatus;

    fn peer(id: &str, socket: &str, status: PeerStatus) -> Peer {
        let identity = Identity::new_unchecked(id);
        Peer {
            identity: identity.clone(),
            socket_addr: socket.to_string(),
            status,
            protocol_version: "1.0".to_string(),
            rank: 1,
            ext_key: identity,
        }
    }

    #[test]
    fn top_n_is_a_stable_prefix() {
        let snapshot = PeerSnapshot::new(vec![
            peer("a", "1.1.1.1:9933", PeerStatus::Enabled),
            peer("b", "2.2.2.2:9933", PeerStatus::Enabled),
            peer("c", "3.3.3.3:9933", PeerStatus::Enabled),
            peer("d", "4.4.4.4:9933", PeerStatus::Enabled),
        ]);
        let me = Identity::new_unchecked("me");
        let top2: Vec<String> = top_n_by_xor(&me, &snapshot, 2)
            .iter()
            .map(|p| p.identity.as_str().to_string())
            .collect();
        let top3: Vec<String> = top_n_by_xor(&me, &snapshot, 3)
            .iter()
            .map(|p| p.identity.as_str().to_string())
            .collect();
        assert_eq!(&top3[..2], &top2[..]);
    }

    #[test]
    fn filter_active_drops_disabled_and_malformed() {
        let snapshot = PeerSnapshot::new(vec![
            peer("a", "1.1.1.1:9933", PeerStatus::Enabled),
            peer("b", "2.2.2.2:9933", PeerStatus::Other("EXPIRED".into())),
            peer("c", "not-an-addr", PeerStatus::Enabled),
        ]);
        let active = filter_active(&snapshot);
        assert_eq!(active.len(), 1);
        assert_eq!(active.peers[0].identity.as_str(), "a");
    }

    #[test]
    fn closest_matches_first_of_top_n_1() {
        let snapshot = PeerSnapshot::new(vec![
            peer("a", "1.1.1.1:9933", PeerStatus::Enabled),
            peer("b", "2.2.2.2:9933", PeerStatus::Enabled),
        ]);
        let me = Identity::new_unchecked("me");
        let closest = closest_to_pastelid(&me, &snapshot).unwrap();
        let top1 = top_n_by_xor(&me, &snapshot, 1);
        assert_eq!(closest.identity, top1[0].identity);
    }
}
