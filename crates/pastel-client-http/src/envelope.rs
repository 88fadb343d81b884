use serde::{Deserialize, Serialize};

/// `GET /request_challenge/<identity>` response (spec §6.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge: String,
    pub challenge_id: String,
}

/// Every supernode request body carries the challenge envelope alongside
/// the endpoint-specific payload (spec §6.2: "Each request body carries
/// `{<payload>, challenge, challenge_id, challenge_signature}`").
pub fn wrap_payload(payload: serde_json::Value, challenge: &Challenge, challenge_signature: &str) -> serde_json::Value {
    let mut body = match payload {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other);
            map
        }
    };
    body.insert("challenge".to_string(), serde_json::Value::String(challenge.challenge.clone()));
    body.insert(
        "challenge_id".to_string(),
        serde_json::Value::String(challenge.challenge_id.clone()),
    );
    body.insert(
        "challenge_signature".to_string(),
        serde_json::Value::String(challenge_signature.to_string()),
    );
    serde_json::Value::Object(body)
}
