use async_trait::async_trait;
use pastel_client_core::Identity;

/// `sign(identity, hex_hash, passphrase) -> signature` (spec §4.1):
/// delegates to the chain node's `pastelid sign` RPC. Implemented by
/// `pastel-client-rpc`'s `ChainRpcClient`; this crate only names the
/// seam so the envelope/crypto layer never depends on the RPC façade.
#[async_trait]
pub trait Signer: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn sign(
        &self,
        identity: &Identity,
        hex_hash: &str,
        passphrase: &str,
    ) -> Result<String, Self::Error>;
}

/// `verify(identity, hex_hash, signature) -> bool` (spec §4.1): delegates
/// to the chain node's `pastelid verify` (ed448) RPC.
#[async_trait]
pub trait Verifier: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn verify(
        &self,
        identity: &Identity,
        hex_hash: &str,
        signature: &str,
    ) -> Result<bool, Self::Error>;
}

// Engines share one chain-node client across many per-peer `SupernodeClient`s
// (one client, many supernode HTTP connections), so `Signer`/`Verifier` must
// also be implemented for `Arc<T>`.
#[async_trait]
impl<T: Signer + ?Sized> Signer for std::sync::Arc<T> {
    type Error = T::Error;

    async fn sign(&self, identity: &Identity, hex_hash: &str, passphrase: &str) -> Result<String, Self::Error> {
        (**self).sign(identity, hex_hash, passphrase).await
    }
}

#[async_trait]
impl<T: Verifier + ?Sized> Verifier for std::sync::Arc<T> {
    type Error = T::Error;

    async fn verify(&self, identity: &Identity, hex_hash: &str, signature: &str) -> Result<bool, Self::Error> {
        (**self).verify(identity, hex_hash, signature).await
    }
}
