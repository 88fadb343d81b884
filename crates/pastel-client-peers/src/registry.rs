use crate::source::MasternodeSource;
use crate::{closest_to_pastelid, filter_active, top_n_by_xor};
use pastel_client_core::{Identity, Peer, PeerSnapshot};
use tokio::sync::RwLock;

/// Maintains a current peer set, cached for the length of one top-level
/// operation (spec §3: "Peer snapshots are refreshed on demand and cached
/// for the length of one top-level operation").
pub struct PeerRegistry<S: MasternodeSource> {
    source: S,
    cached: RwLock<Option<PeerSnapshot>>,
}

impl<S: MasternodeSource> PeerRegistry<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// `refresh()`: pulls the masternode list from the chain node and
    /// replaces the cached snapshot.
    pub async fn refresh(&self) -> Result<PeerSnapshot, S::Error> {
        let peers = self.source.masternode_list_full().await?;
        let snapshot = PeerSnapshot::new(peers);
        *self.cached.write().await = Some(snapshot.clone());
        tracing::debug!(peer_count = snapshot.len(), "refreshed masternode snapshot");
        Ok(snapshot)
    }

    /// Returns the cached snapshot, refreshing it first if none has been
    /// fetched yet in this operation.
    pub async fn snapshot(&self) -> Result<PeerSnapshot, S::Error> {
        if let Some(snapshot) = self.cached.read().await.clone() {
            return Ok(snapshot);
        }
        self.refresh().await
    }

    /// The cached snapshot with `filter_active` applied.
    pub async fn active_snapshot(&self) -> Result<PeerSnapshot, S::Error> {
        Ok(filter_active(&self.snapshot().await?))
    }

    pub async fn top_n_active_by_xor(
        &self,
        identity: &Identity,
        n: usize,
    ) -> Result<Vec<Peer>, S::Error> {
        let active = self.active_snapshot().await?;
        Ok(top_n_by_xor(identity, &active, n)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn closest_active(&self, identity: &Identity) -> Result<Option<Peer>, S::Error> {
        let active = self.active_snapshot().await?;
        Ok(closest_to_pastelid(identity, &active).cloned())
    }

    /// Drop the cache so the next call re-fetches. A host calls this
    /// between top-level operations.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
