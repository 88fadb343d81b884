use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub height: u64,
    pub merkleroot: String,
    pub time: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    pub confirmations: i64,
    pub amount: f64,
    #[serde(default)]
    pub blockhash: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawTransactionInfo {
    pub txid: String,
    pub hex: String,
    #[serde(default)]
    pub vout: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WalletInfo {
    pub balance: f64,
    pub unconfirmed_balance: f64,
    pub txcount: u64,
}

/// One entry of `masternode list full`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MasternodeListEntry {
    /// `<status> <pastelid> <addr> ...` columns the node packs into a
    /// single line per entry; the façade only surfaces the parsed fields
    /// a client needs.
    pub status: String,
    pub pastelid: String,
    pub addr: String,
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub rank: u32,
}

/// One entry of `masternode top`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MasternodeTopEntry {
    pub pastelid: String,
    pub rank: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListAddressAmount {
    pub address: String,
    pub amount: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignResult {
    pub signature: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyResult {
    pub verification: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketListEntry {
    pub txid: String,
    pub height: u64,
    #[serde(default)]
    pub ticket: serde_json::Value,
}

pub type SendManyPayments = HashMap<String, f64>;
