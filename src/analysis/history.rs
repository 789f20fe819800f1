//! Analysis history: the write body after each analysis and the list view.
//!
//! Writes are best-effort. A failed write is logged and swallowed, never
//! joined into the analyze result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AggregatedResult, AnalysisBackend, AnalysisError};
use crate::normalize::{decode_body, unwrap_envelope, ClassificationEntry};

pub const HISTORY_STATUS_COMPLETED: &str = "completed";
pub const HISTORY_SOURCE_CHEXPERT: &str = "chexpert";

/// Body of `POST /api/v1/history/add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub file_name: String,
    pub top1: String,
    pub confidence: f64,
    /// Top-3 of the first classifier.
    pub diagnosis: Vec<ClassificationEntry>,
    pub heatmap_url: Option<String>,
    pub original_url: Option<String>,
    pub status: String,
    pub source: String,
}

impl HistoryEntry {
    pub fn from_aggregated(file_name: &str, result: &AggregatedResult) -> Self {
        Self {
            file_name: file_name.to_string(),
            top1: result.disease.clone(),
            confidence: result.confidence,
            diagnosis: result.top3.clone(),
            heatmap_url: result.heatmap_url.clone(),
            original_url: result.original_image_url.clone(),
            status: HISTORY_STATUS_COMPLETED.to_string(),
            source: HISTORY_SOURCE_CHEXPERT.to_string(),
        }
    }
}

/// One row of `GET /api/v1/history/list`. Every field is optional because
/// older backends stored fewer of them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryItem {
    pub id: Option<Value>,
    #[serde(alias = "fileName")]
    pub file_name: Option<String>,
    pub top1: Option<String>,
    pub confidence: Option<f64>,
    pub diagnosis: Option<Value>,
    pub heatmap_url: Option<String>,
    pub original_url: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
    #[serde(alias = "date", alias = "timestamp")]
    pub created_at: Option<String>,
}

/// Write a history entry, logging instead of failing.
pub async fn persist_history<B: AnalysisBackend + ?Sized>(backend: &B, entry: &HistoryEntry) {
    match backend.add_history(entry).await {
        Ok(()) => tracing::debug!(file = %entry.file_name, "History entry saved"),
        Err(e) => tracing::warn!(file = %entry.file_name, error = %e, "History save failed"),
    }
}

/// Fetch and parse the history list.
pub async fn fetch_history<B: AnalysisBackend + ?Sized>(
    backend: &B,
) -> Result<Vec<HistoryItem>, AnalysisError> {
    let body = backend.list_history().await?;
    Ok(parse_history(&body))
}

/// Accepts `{items: [...]}` or a bare array, optionally enveloped.
pub fn parse_history(body: &str) -> Vec<HistoryItem> {
    let payload = unwrap_envelope(&decode_body(body));
    let items = match &payload {
        Value::Array(items) => Some(items.as_slice()),
        other => other.get("items").and_then(Value::as_array).map(Vec::as_slice),
    };
    parse_array_lenient(items)
}

/// Parse an array leniently, skipping items that fail to deserialize.
fn parse_array_lenient<T: for<'de> Deserialize<'de>>(items: Option<&[Value]>) -> Vec<T> {
    match items {
        None => vec![],
        Some(arr) => arr
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
    }
}
