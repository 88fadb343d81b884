use async_trait::async_trait;
use std::collections::HashMap;

/// The narrow slice of the chain-node RPC (spec §6.1) that the purchase and
/// inference engines need directly: best-block info for envelope stamping,
/// and the wallet calls that move PSL to a burn address. Implemented by
/// `pastel-client-rpc`'s `ChainRpcClient`; named here, alongside
/// [`crate::envelope::Envelope`] and the crypto crate's `Signer`/`Verifier`,
/// so the engine crates never depend on the concrete RPC façade.
#[async_trait]
pub trait ChainFacade: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn best_block_height(&self) -> Result<u64, Self::Error>;
    async fn best_block_merkle_root(&self) -> Result<String, Self::Error>;

    /// `sendtoaddress(addr, amt, ...)` — burns the purchase total (spec
    /// §4.3) to the network's well-known burn address.
    async fn send_to_address(&self, address: &str, amount: f64) -> Result<String, Self::Error>;

    /// `sendmany(fromAccount, {addr→amt}, minconf, memo, [""], change)` —
    /// sends the confirmation tracking amount (spec §4.4 step 3).
    async fn send_many(
        &self,
        from_account: &str,
        payments: HashMap<String, f64>,
        memo: &str,
    ) -> Result<String, Self::Error>;

    /// Summed balance of `address` (spec §4.4 step 2's tracking-address
    /// balance check).
    async fn address_balance(&self, address: &str) -> Result<f64, Self::Error>;
}

#[async_trait]
impl<T: ChainFacade + ?Sized> ChainFacade for std::sync::Arc<T> {
    type Error = T::Error;

    async fn best_block_height(&self) -> Result<u64, Self::Error> {
        (**self).best_block_height().await
    }
    async fn best_block_merkle_root(&self) -> Result<String, Self::Error> {
        (**self).best_block_merkle_root().await
    }
    async fn send_to_address(&self, address: &str, amount: f64) -> Result<String, Self::Error> {
        (**self).send_to_address(address, amount).await
    }
    async fn send_many(
        &self,
        from_account: &str,
        payments: HashMap<String, f64>,
        memo: &str,
    ) -> Result<String, Self::Error> {
        (**self).send_many(from_account, payments, memo).await
    }
    async fn address_balance(&self, address: &str) -> Result<f64, Self::Error> {
        (**self).address_balance(address).await
    }
}
