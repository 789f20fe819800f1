use serde_json::Value;

use super::AnalysisBackend;
use crate::normalize::{decode_body, unwrap_envelope};

/// The CheXpert label set, used whenever the labels endpoint is unusable.
pub const DEFAULT_CHEXPERT_LABELS: [&str; 14] = [
    "No Finding",
    "Enlarged Cardiomediastinum",
    "Cardiomegaly",
    "Lung Opacity",
    "Lung Lesion",
    "Edema",
    "Consolidation",
    "Pneumonia",
    "Atelectasis",
    "Pneumothorax",
    "Pleural Effusion",
    "Pleural Other",
    "Fracture",
    "Support Devices",
];

pub fn default_labels() -> Vec<String> {
    DEFAULT_CHEXPERT_LABELS.iter().map(|l| l.to_string()).collect()
}

/// Read a label list from a bare array or `{labels: [...]}`.
/// Non-string and empty entries are dropped.
pub fn parse_labels(body: &str) -> Vec<String> {
    let payload = unwrap_envelope(&decode_body(body));
    let list = match &payload {
        Value::Array(items) => Some(items),
        other => other.get("labels").and_then(Value::as_array),
    };
    list.map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Labels supported by the pathology classifier. Never fails: any error or
/// an empty list falls back to [`DEFAULT_CHEXPERT_LABELS`].
pub async fn fetch_pathology_labels<B: AnalysisBackend + ?Sized>(backend: &B) -> Vec<String> {
    match backend.pathology_labels().await {
        Ok(body) => {
            let labels = parse_labels(&body);
            if labels.is_empty() {
                tracing::warn!("Labels endpoint returned no labels, using CheXpert defaults");
                default_labels()
            } else {
                labels
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Labels endpoint failed, using CheXpert defaults");
            default_labels()
        }
    }
}
