//! Derives the report-generator query from an aggregated analysis.
//!
//! Label sources are consulted in a fixed priority order (pathology model,
//! chexpert model, a loose `pathologies` list, legacy `top3`) and the first
//! non-empty one wins.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analysis::AggregatedResult;
use crate::normalize::fields::{pick_text, LABEL_ALIASES};
use crate::normalize::{to_relative, unwrap_envelope, ClassificationEntry};

/// Labels sent as `pathology_labels`.
pub const MAX_REPORT_LABELS: usize = 3;
/// Entries summarized in the RAG query.
pub const MAX_RAG_ENTRIES: usize = 6;

/// Input for the report-generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    /// Backend-relative path of the original image; never an absolute URL.
    pub image_path: Option<String>,
    pub pathology_labels: Vec<String>,
    pub rag_query: String,
    /// Label -> clamped confidence for the entries in `rag_query`.
    pub classifier_probs: Map<String, Value>,
}

/// A label with an optional score, whatever source it came from.
#[derive(Debug, Clone, PartialEq)]
struct RankedLabel {
    label: String,
    confidence: Option<f64>,
}

impl From<&ClassificationEntry> for RankedLabel {
    fn from(entry: &ClassificationEntry) -> Self {
        Self {
            label: entry.label.clone(),
            confidence: Some(entry.confidence),
        }
    }
}

impl RankedLabel {
    /// Legacy entries are either bare strings or loosely shaped objects.
    fn from_legacy(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self {
                label: s.clone(),
                confidence: None,
            }),
            Value::Object(obj) => Some(Self {
                label: pick_text(obj, LABEL_ALIASES).unwrap_or_default(),
                confidence: ["confidence", "probability"]
                    .iter()
                    .find_map(|key| obj.get(*key).and_then(Value::as_f64)),
            }),
            _ => None,
        }
    }

    fn token(&self) -> String {
        match self.confidence {
            Some(c) => format!("{}:{:.2}", self.label, clamp_unit(c)),
            None => self.label.clone(),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn typed(entries: &[ClassificationEntry]) -> Vec<RankedLabel> {
    entries.iter().map(RankedLabel::from).collect()
}

/// Loose `pathologies` list: from the pathology response first, then the
/// top-level field of a rehydrated result.
fn legacy_pathologies(result: &AggregatedResult) -> Vec<RankedLabel> {
    let payload = unwrap_envelope(&result.pathology.raw_response);
    let from_response: Vec<RankedLabel> = payload
        .get("pathologies")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(RankedLabel::from_legacy).collect())
        .unwrap_or_default();
    if !from_response.is_empty() {
        return from_response;
    }
    result.pathologies.iter().filter_map(RankedLabel::from_legacy).collect()
}

/// First non-empty label source, in priority order.
fn ranked_source(result: &AggregatedResult) -> Vec<RankedLabel> {
    let sources = [
        typed(&result.pathology.classifications),
        typed(&result.chexpert.classifications),
        legacy_pathologies(result),
        typed(&result.top3),
    ];
    sources.into_iter().find(|s| !s.is_empty()).unwrap_or_default()
}

/// View tag: chexpert metadata, then top-level metadata, then a bare `view`.
fn resolve_view(result: &AggregatedResult) -> Option<String> {
    result
        .chexpert
        .view()
        .or_else(|| result.meta.get("view").and_then(Value::as_str))
        .or(result.view.as_deref())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn build_report_payload(result: &AggregatedResult) -> ReportPayload {
    let source = ranked_source(result);

    let pathology_labels: Vec<String> = source
        .iter()
        .take(MAX_REPORT_LABELS)
        .map(|r| r.label.clone())
        .filter(|l| !l.is_empty())
        .collect();

    let rag_entries: Vec<&RankedLabel> = source.iter().take(MAX_RAG_ENTRIES).collect();

    let mut tokens: Vec<String> = Vec::new();
    if let Some(view) = resolve_view(result) {
        tokens.push(format!("view={view}"));
    }

    let mut classifier_probs = Map::new();
    if rag_entries.is_empty() {
        tokens.extend(pathology_labels.iter().cloned());
    } else {
        for entry in &rag_entries {
            tokens.push(entry.token());
            if let Some(c) = entry.confidence {
                classifier_probs.insert(entry.label.clone(), Value::from(clamp_unit(c)));
            }
        }
    }

    ReportPayload {
        image_path: result
            .original_image_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(to_relative),
        pathology_labels,
        rag_query: tokens.join(", "),
        classifier_probs,
    }
}
