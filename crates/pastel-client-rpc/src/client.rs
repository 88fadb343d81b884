use crate::error::RpcError;
use crate::types::{
    BlockHeader, ListAddressAmount, MasternodeListEntry, MasternodeTopEntry, RawTransactionInfo,
    SendManyPayments, SignResult, TicketListEntry, Transaction, VerifyResult, WalletInfo,
};
use async_trait::async_trait;
use pastel_client_core::{Identity, Peer, PeerStatus};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default global concurrency cap for outstanding chain-RPC calls (spec
/// §4.7: "a global semaphore limiting concurrent calls (default 5000)").
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 5000;

/// A JSON-RPC 1.1 client to the Pastel chain node (spec §4.7, §6.1).
pub struct ChainRpcClient {
    base_url: String,
    http: reqwest::Client,
    auth: (String, String),
    semaphore: Arc<Semaphore>,
    next_id: AtomicU64,
    max_retries: u32,
}

impl ChainRpcClient {
    pub fn new(base_url: impl Into<String>, rpc_user: impl Into<String>, rpc_password: impl Into<String>) -> Self {
        Self::with_concurrency(base_url, rpc_user, rpc_password, DEFAULT_MAX_CONCURRENT_CALLS)
    }

    pub fn with_concurrency(
        base_url: impl Into<String>,
        rpc_user: impl Into<String>,
        rpc_password: impl Into<String>,
        max_concurrent_calls: usize,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            // reqwest::Client pools and keeps connections alive by default.
            http: reqwest::Client::new(),
            auth: (rpc_user.into(), rpc_password.into()),
            semaphore: Arc::new(Semaphore::new(max_concurrent_calls)),
            next_id: AtomicU64::new(1),
            max_retries: 2,
        }
    }

    /// Issue one JSON-RPC 1.1 call and return the raw `result` value.
    /// Retries transient transport failures with exponential backoff
    /// (base 200ms × 2^i), bounded by `max_retries`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut attempt = 0;
        loop {
            let result = self
                .http
                .post(&self.base_url)
                .basic_auth(&self.auth.0, Some(&self.auth.1))
                .json(&body)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let json: Value = resp.json().await.map_err(|source| RpcError::Transport {
                        method: method.to_string(),
                        source,
                    })?;
                    return Self::unwrap_result(method, json);
                }
                Err(source) if attempt < self.max_retries => {
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    tracing::warn!(method, attempt, ?backoff, error = %source, "chain RPC call failed, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(RpcError::Transport {
                        method: method.to_string(),
                        source,
                    })
                }
            }
        }
    }

    fn unwrap_result(method: &str, json: Value) -> Result<Value, RpcError> {
        if let Some(error) = json.get("error") {
            if !error.is_null() {
                let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(RpcError::NodeError {
                    method: method.to_string(),
                    code,
                    message,
                });
            }
        }
        json.get("result")
            .cloned()
            .ok_or_else(|| RpcError::MissingResult {
                method: method.to_string(),
            })
    }

    async fn call_typed<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|source| RpcError::Decode {
            method: method.to_string(),
            source,
        })
    }

    // ── Chain queries ──────────────────────────────────────────────────────

    pub async fn get_best_block_hash(&self) -> Result<String, RpcError> {
        self.call_typed("getbestblockhash", json!([])).await
    }

    pub async fn get_block_hash(&self, height: u64) -> Result<String, RpcError> {
        self.call_typed("getblockhash", json!([height])).await
    }

    pub async fn get_block(&self, hash: &str) -> Result<BlockHeader, RpcError> {
        self.call_typed("getblock", json!([hash])).await
    }

    pub async fn get_transaction(&self, txid: &str) -> Result<Transaction, RpcError> {
        self.call_typed("gettransaction", json!([txid])).await
    }

    pub async fn get_raw_transaction(&self, txid: &str) -> Result<String, RpcError> {
        self.call_typed("getrawtransaction", json!([txid])).await
    }

    pub async fn decode_raw_transaction(&self, hex: &str) -> Result<RawTransactionInfo, RpcError> {
        self.call_typed("decoderawtransaction", json!([hex])).await
    }

    // ── Wallet ───────────────────────────────────────────────────────────────

    pub async fn get_new_address(&self) -> Result<String, RpcError> {
        self.call_typed("getnewaddress", json!([])).await
    }

    /// `sendtoaddress(addr, amt, ...)`. Used to burn the purchase total
    /// (spec §4.3) and is also the primitive behind a single-recipient
    /// confirmation transfer.
    pub async fn send_to_address(&self, address: &str, amount: f64) -> Result<String, RpcError> {
        self.call_typed("sendtoaddress", json!([address, amount])).await
    }

    /// `sendmany(fromAccount, {addr→amt}, minconf, memo, [""], change)`.
    /// Used to send the confirmation tracking amount from the credit
    /// tracking address (spec §4.4 step 3).
    pub async fn send_many(
        &self,
        from_account: &str,
        payments: SendManyPayments,
        min_conf: u32,
        memo: &str,
    ) -> Result<String, RpcError> {
        self.call_typed(
            "sendmany",
            json!([from_account, payments, min_conf, memo, [""], true]),
        )
        .await
    }

    pub async fn import_address(&self, address: &str) -> Result<(), RpcError> {
        let _: Value = self.call_typed("importaddress", json!([address])).await?;
        Ok(())
    }

    pub async fn import_privkey(&self, privkey: &str) -> Result<(), RpcError> {
        let _: Value = self.call_typed("importprivkey", json!([privkey])).await?;
        Ok(())
    }

    pub async fn import_wallet(&self, filename: &str) -> Result<(), RpcError> {
        let _: Value = self.call_typed("importwallet", json!([filename])).await?;
        Ok(())
    }

    pub async fn list_address_amounts(&self) -> Result<Vec<ListAddressAmount>, RpcError> {
        self.call_typed("listaddressamounts", json!([])).await
    }

    pub async fn get_balance(&self) -> Result<f64, RpcError> {
        self.call_typed("getbalance", json!([])).await
    }

    pub async fn get_wallet_info(&self) -> Result<WalletInfo, RpcError> {
        self.call_typed("getwalletinfo", json!([])).await
    }

    pub async fn z_get_balance(&self, address: &str) -> Result<f64, RpcError> {
        self.call_typed("z_getbalance", json!([address])).await
    }

    /// Balance of `address`, summed across `listaddressamounts`, in PSL.
    /// Used by the inference engine to check the tracking address before
    /// sending the confirmation transaction (spec §4.4 step 2).
    pub async fn address_balance(&self, address: &str) -> Result<f64, RpcError> {
        let amounts = self.list_address_amounts().await?;
        Ok(amounts
            .into_iter()
            .find(|a| a.address == address)
            .map(|a| a.amount)
            .unwrap_or(0.0))
    }

    // ── Masternode / peer list ───────────────────────────────────────────────

    pub async fn masternode_top(&self) -> Result<Vec<MasternodeTopEntry>, RpcError> {
        self.call_typed("masternode", json!(["top"])).await
    }

    pub async fn masternode_list_full_raw(&self) -> Result<Vec<MasternodeListEntry>, RpcError> {
        self.call_typed("masternode", json!(["list", "full"])).await
    }

    // ── Identity signing ─────────────────────────────────────────────────────

    pub async fn pastelid_sign(
        &self,
        identity: &str,
        hex_hash: &str,
        passphrase: &str,
    ) -> Result<String, RpcError> {
        let result: SignResult = self
            .call_typed("pastelid", json!(["sign", hex_hash, identity, passphrase]))
            .await?;
        Ok(result.signature)
    }

    pub async fn pastelid_verify(
        &self,
        identity: &str,
        hex_hash: &str,
        signature: &str,
    ) -> Result<bool, RpcError> {
        let result: VerifyResult = self
            .call_typed(
                "pastelid",
                json!(["verify", hex_hash, signature, identity, "ed448"]),
            )
            .await?;
        Ok(result.verification)
    }

    // ── Tickets ───────────────────────────────────────────────────────────────

    pub async fn tickets_list_id(&self) -> Result<Vec<TicketListEntry>, RpcError> {
        self.call_typed("tickets", json!(["list", "id"])).await
    }

    pub async fn tickets_find_id(&self, pastelid: &str) -> Result<Value, RpcError> {
        self.call("tickets", json!(["find", "id", pastelid])).await
    }

    pub async fn tickets_find_contract(&self, key: &str) -> Result<Value, RpcError> {
        self.call("tickets", json!(["find", "contract", key])).await
    }

    pub async fn tickets_get(&self, txid: &str) -> Result<Value, RpcError> {
        self.call("tickets", json!(["get", txid])).await
    }
}

#[async_trait]
impl pastel_client_crypto::Signer for ChainRpcClient {
    type Error = RpcError;

    async fn sign(&self, identity: &Identity, hex_hash: &str, passphrase: &str) -> Result<String, RpcError> {
        self.pastelid_sign(identity.as_str(), hex_hash, passphrase).await
    }
}

#[async_trait]
impl pastel_client_crypto::Verifier for ChainRpcClient {
    type Error = RpcError;

    async fn verify(&self, identity: &Identity, hex_hash: &str, signature: &str) -> Result<bool, RpcError> {
        self.pastelid_verify(identity.as_str(), hex_hash, signature).await
    }
}

#[async_trait]
impl pastel_client_core::ChainFacade for ChainRpcClient {
    type Error = RpcError;

    async fn best_block_height(&self) -> Result<u64, RpcError> {
        let hash = self.get_best_block_hash().await?;
        let block = self.get_block(&hash).await?;
        Ok(block.height)
    }

    async fn best_block_merkle_root(&self) -> Result<String, RpcError> {
        let hash = self.get_best_block_hash().await?;
        let block = self.get_block(&hash).await?;
        Ok(block.merkleroot)
    }

    async fn send_to_address(&self, address: &str, amount: f64) -> Result<String, RpcError> {
        ChainRpcClient::send_to_address(self, address, amount).await
    }

    async fn send_many(
        &self,
        from_account: &str,
        payments: SendManyPayments,
        memo: &str,
    ) -> Result<String, RpcError> {
        ChainRpcClient::send_many(self, from_account, payments, 1, memo).await
    }

    async fn address_balance(&self, address: &str) -> Result<f64, RpcError> {
        ChainRpcClient::address_balance(self, address).await
    }
}

#[async_trait]
impl pastel_client_peers::MasternodeSource for ChainRpcClient {
    type Error = RpcError;

    async fn masternode_list_full(&self) -> Result<Vec<Peer>, RpcError> {
        let raw = self.masternode_list_full_raw().await?;
        Ok(raw
            .into_iter()
            .map(|entry| {
                let identity = Identity::new_unchecked(entry.pastelid);
                Peer {
                    identity: identity.clone(),
                    socket_addr: entry.addr,
                    status: PeerStatus::from_raw(&entry.status),
                    protocol_version: entry.protocol_version,
                    rank: entry.rank,
                    ext_key: identity,
                }
            })
            .collect())
    }
}
