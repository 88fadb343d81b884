use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A recovered credit-pack bundle, persisted as `promo_pack_<identity>.json`
/// so a host can recover a pack purchased by a batch tool without
/// re-deriving it from chain state (spec §6.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromoPack {
    pub identity: String,
    pub passphrase: String,
    #[serde(rename = "secureContainerBase64")]
    pub secure_container_base64: String,
    pub credit_pack_registration_txid: String,
    pub credit_purchase_request_confirmation_pastel_block_height: u64,
    pub requested_initial_credits_in_credit_pack: u64,
    pub tracking_address: String,
    pub tracking_address_private_key: String,
}

impl PromoPack {
    pub fn file_name(identity: &str) -> String {
        format!("promo_pack_{identity}.json")
    }

    pub fn path_in(dir: impl AsRef<Path>, identity: &str) -> PathBuf {
        dir.as_ref().join(Self::file_name(identity))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| StoreError::PromoPackIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, StoreError> {
        let path = Self::path_in(dir, &self.identity);
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, raw).map_err(|source| StoreError::PromoPackIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }
}
