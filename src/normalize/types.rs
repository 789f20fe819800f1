use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label used when a classification carries no resolvable name.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// One predicted label for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEntry {
    pub label: String,
    /// Probability-like score. Always finite; 0 when the backend sent nothing usable.
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
}

impl ClassificationEntry {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: finite_or_zero(confidence),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Normalized result of one classifier call.
///
/// Built once per round trip by the normalizer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub success: bool,
    /// Backend order; only the `probs` map shape arrives pre-sorted.
    pub classifications: Vec<ClassificationEntry>,
    pub heatmap_url: Option<String>,
    pub original_image_url: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub raw_response: Value,
    /// Set when the call itself failed (transport or HTTP status).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisRecord {
    /// Record standing in for a call that never produced a payload.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            classifications: Vec::new(),
            heatmap_url: None,
            original_image_url: None,
            meta: Map::new(),
            raw_response: Value::Null,
            error: Some(reason.into()),
        }
    }

    /// Highest-ranked entry in backend order.
    pub fn top(&self) -> Option<&ClassificationEntry> {
        self.classifications.first()
    }

    /// `view` tag from backend metadata (e.g. "PA", "AP").
    pub fn view(&self) -> Option<&str> {
        self.meta
            .get("view")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
