use async_trait::async_trait;
use pastel_client_core::{Peer, PeerSnapshot};

/// The chain-node collaborator this registry pulls snapshots from
/// (`masternode list full`, spec §6.1). Implemented by
/// `pastel-client-rpc`'s `ChainRpcClient`; named here so the registry
/// doesn't depend on the RPC façade crate.
#[async_trait]
pub trait MasternodeSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn masternode_list_full(&self) -> Result<Vec<Peer>, Self::Error>;
}

#[async_trait]
impl<T: MasternodeSource + ?Sized> MasternodeSource for std::sync::Arc<T> {
    type Error = T::Error;

    async fn masternode_list_full(&self) -> Result<Vec<Peer>, Self::Error> {
        (**self).masternode_list_full().await
    }
}
