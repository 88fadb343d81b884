use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One inference type a model can serve (spec §4.4 `discover`). Kept as an
/// opaque wire string, like `model_inference_type_string` on the usage
/// request, rather than a closed enum — supernodes add new inference
/// types without a client-side release.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InferenceType(pub String);

impl InferenceType {
    pub const TEXT_COMPLETION: &'static str = "text_completion";
    pub const TEXT_TO_IMAGE: &'static str = "text_to_image";
    pub const EMBEDDING_DOCUMENT: &'static str = "embedding_document";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, s: &str) -> bool {
        self.0 == s
    }
}

impl std::fmt::Display for InferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The declared type of one model parameter, used to type-check a
/// requested parameter value against a model's menu entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ParamType {
    Int,
    Float,
    String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// When present, the requested value must be one of these (spec §4.4:
    /// "with `options` enforcement when present").
    pub options: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelMenuEntry {
    pub model_name: String,
    pub supported_inference_types: Vec<InferenceType>,
    pub model_parameters: Vec<ModelParameterSpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelMenu {
    pub models: Vec<ModelMenuEntry>,
}

impl ModelMenu {
    /// A requested parameter value, as sent by the caller of `discover`/
    /// `submit`. Type-checked against [`ModelParameterSpec`] before a
    /// menu entry is considered a match.
    pub fn admits(entry: &ModelMenuEntry, requested: &HashMap<String, ParamValue>) -> bool {
        requested.iter().all(|(key, value)| {
            entry
                .model_parameters
                .iter()
                .find(|p| &p.name == key)
                .map(|spec| spec.accepts(value))
                .unwrap_or(false)
        })
    }
}

impl ModelParameterSpec {
    pub fn accepts(&self, value: &ParamValue) -> bool {
        let type_ok = matches!(
            (&self.param_type, value),
            (ParamType::Int, ParamValue::Int(_))
                | (ParamType::Float, ParamValue::Float(_))
                | (ParamType::String, ParamValue::String(_))
        );
        if !type_ok {
            return false;
        }
        match (&self.options, value) {
            (Some(options), ParamValue::String(s)) => options.contains(s),
            _ => true,
        }
    }
}

/// A typed parameter value supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    String(String),
}
