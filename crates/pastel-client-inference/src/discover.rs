use crate::error::InferenceError;
use pastel_client_core::model_menu::{ModelMenu, ModelMenuEntry, ParamValue};
use pastel_client_core::{Identity, Peer};
use pastel_client_crypto::Signer;
use pastel_client_http::SupernodeClient;
use pastel_client_peers::{top_n_by_xor, MasternodeSource, PeerRegistry};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinSet;

/// The peer `submit` should talk to, and the menu entry that matched
/// (spec §4.4 `discover`).
#[derive(Clone, Debug)]
pub struct DiscoveredPeer {
    pub peer: Peer,
    pub model_entry: ModelMenuEntry,
}

/// `discover(model, type, parameters) -> {peer_url, peer_id}` (spec §4.4):
/// query every active peer in XOR-sorted order for its model menu in
/// parallel, then return the closest peer (by that same XOR order) whose
/// menu advertises a matching, type-checked entry.
#[allow(clippy::too_many_arguments)]
pub async fn discover<MS, C>(
    registry: &PeerRegistry<MS>,
    chain: &C,
    client_identity: &Identity,
    passphrase: &str,
    messaging_timeout: Duration,
    model_name: &str,
    inference_type: &str,
    parameters: &HashMap<String, ParamValue>,
) -> Result<DiscoveredPeer, InferenceError>
where
    MS: MasternodeSource,
    C: Signer + Clone + Send + Sync + 'static,
{
    let active = registry
        .active_snapshot()
        .await
        .map_err(|e| InferenceError::ChainRpc(e.to_string()))?;
    if active.is_empty() {
        return Err(InferenceError::NoPeersAvailable);
    }
    let ranked: Vec<Peer> = top_n_by_xor(client_identity, &active, active.len())
        .into_iter()
        .cloned()
        .collect();

    let mut menu_calls: JoinSet<(usize, Result<ModelMenu, pastel_client_http::SupernodeError>)> = JoinSet::new();
    for (idx, peer) in ranked.iter().enumerate() {
        let Some(base_url) = peer.base_url() else { continue };
        let client = SupernodeClient::new(
            base_url,
            client_identity.clone(),
            passphrase.to_string(),
            chain.clone(),
            messaging_timeout,
        );
        menu_calls.spawn(async move { (idx, client.get_inference_model_menu().await) });
    }

    let mut menus: Vec<Option<ModelMenu>> = vec![None; ranked.len()];
    while let Some(joined) = menu_calls.join_next().await {
        if let Ok((idx, Ok(menu))) = joined {
            menus[idx] = Some(menu);
        }
    }

    for (idx, peer) in ranked.into_iter().enumerate() {
        let Some(menu) = &menus[idx] else { continue };
        if let Some(entry) = menu.models.iter().find(|entry| {
            entry.model_name == model_name
                && entry.supported_inference_types.iter().any(|t| t.is(inference_type))
                && ModelMenu::admits(entry, parameters)
        }) {
            tracing::info!(peer = %peer.identity, model = model_name, "discovered matching inference peer");
            return Ok(DiscoveredPeer {
                peer,
                model_entry: entry.clone(),
            });
        }
    }

    Err(InferenceError::NoMatchingModel)
}
