//! Classification-list extraction.
//!
//! Backends disagree on how a ranked label list is shaped. Each shape is a
//! named strategy; strategies run in a fixed priority order and the first one
//! that yields at least one entry wins.

use serde_json::{Map, Value};

use super::types::{finite_or_zero, ClassificationEntry, UNKNOWN_LABEL};

// ═══════════════════════════════════════════════════════════
// Alias lists
// ═══════════════════════════════════════════════════════════

pub const LABEL_ALIASES: &[&str] = &["label", "name", "class", "category"];
pub const CONFIDENCE_ALIASES: &[&str] = &["confidence", "probability", "score", "prob"];
pub const DESCRIPTION_ALIASES: &[&str] = &["description", "desc"];

pub const CANONICAL_FIELD: &str = "classifications";
pub const PROBS_FIELD: &str = "probs";
pub const ALTERNATIVE_ARRAY_FIELDS: &[&str] = &["predictions", "results", "topk", "top_k", "items"];
pub const PARALLEL_LABEL_FIELDS: &[&str] = &["labels", "classes", "top_labels"];
pub const PARALLEL_SCORE_FIELDS: &[&str] = &["scores", "top_scores", "confidences"];
pub const SHORTHAND_LABEL_FIELDS: &[&str] = &["disease", "label", "name"];

/// First alias whose value is truthy text (a non-empty string, or a number).
pub fn pick_text(obj: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| value_as_text(obj.get(*key)?))
}

/// First alias whose value is present and non-null.
pub fn pick_value<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|key| obj.get(*key).filter(|v| !v.is_null()))
}

/// Numeric reading of a JSON value; numeric strings count.
pub fn value_as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_confidence(value: Option<&Value>) -> f64 {
    value.and_then(value_as_number).map(finite_or_zero).unwrap_or(0.0)
}

/// Resolve one array element into an entry. Bare strings become a label
/// with zero confidence; other non-objects are dropped.
fn entry_from_element(element: &Value) -> Option<ClassificationEntry> {
    match element {
        Value::Object(obj) => {
            let label = pick_text(obj, LABEL_ALIASES).unwrap_or_else(|| UNKNOWN_LABEL.to_string());
            let confidence = coerce_confidence(pick_value(obj, CONFIDENCE_ALIASES));
            let description = pick_text(obj, DESCRIPTION_ALIASES).unwrap_or_default();
            Some(ClassificationEntry::new(label, confidence).with_description(description))
        }
        Value::String(s) if !s.is_empty() => Some(ClassificationEntry::new(s.clone(), 0.0)),
        _ => None,
    }
}

fn entries_from_array(items: &[Value]) -> Vec<ClassificationEntry> {
    items.iter().filter_map(entry_from_element).collect()
}

// ═══════════════════════════════════════════════════════════
// Strategies
// ═══════════════════════════════════════════════════════════

/// A named way of reading a classification list out of a payload.
pub struct ClassificationStrategy {
    pub name: &'static str,
    extract: fn(&Value) -> Vec<ClassificationEntry>,
}

impl ClassificationStrategy {
    pub fn apply(&self, payload: &Value) -> Vec<ClassificationEntry> {
        (self.extract)(payload)
    }
}

/// Strategies in priority order.
pub const STRATEGIES: &[ClassificationStrategy] = &[
    ClassificationStrategy { name: "canonical_array", extract: canonical_array },
    ClassificationStrategy { name: "probs_map", extract: probs_map },
    ClassificationStrategy { name: "alternative_array", extract: alternative_array },
    ClassificationStrategy { name: "parallel_arrays", extract: parallel_arrays },
    ClassificationStrategy { name: "bare_array", extract: bare_array },
    ClassificationStrategy { name: "single_object", extract: single_object },
];

/// Extract classifications from an already unwrapped payload.
pub fn extract_classifications(payload: &Value) -> Vec<ClassificationEntry> {
    for strategy in STRATEGIES {
        let entries = strategy.apply(payload);
        if !entries.is_empty() {
            tracing::trace!(strategy = strategy.name, count = entries.len(), "Classifications resolved");
            return entries;
        }
    }
    Vec::new()
}

fn canonical_array(payload: &Value) -> Vec<ClassificationEntry> {
    match payload.get(CANONICAL_FIELD) {
        Some(Value::Array(items)) => entries_from_array(items),
        _ => Vec::new(),
    }
}

/// `{label: prob}` map, sorted by descending confidence. The sort is stable,
/// so ties keep first-seen key order.
fn probs_map(payload: &Value) -> Vec<ClassificationEntry> {
    let Some(Value::Object(map)) = payload.get(PROBS_FIELD) else {
        return Vec::new();
    };
    let mut entries: Vec<ClassificationEntry> = map
        .iter()
        .map(|(label, prob)| {
            let label = if label.is_empty() { UNKNOWN_LABEL } else { label.as_str() };
            ClassificationEntry::new(label, coerce_confidence(Some(prob)))
        })
        .collect();
    entries.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    entries
}

fn alternative_array(payload: &Value) -> Vec<ClassificationEntry> {
    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };
    ALTERNATIVE_ARRAY_FIELDS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
        .map(|items| entries_from_array(items))
        .unwrap_or_default()
}

fn parallel_arrays(payload: &Value) -> Vec<ClassificationEntry> {
    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };
    let labels = PARALLEL_LABEL_FIELDS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array));
    let scores = PARALLEL_SCORE_FIELDS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array));

    match (labels, scores) {
        (Some(labels), Some(scores)) if labels.len() == scores.len() => labels
            .iter()
            .zip(scores)
            .map(|(label, score)| {
                let label = value_as_text(label).unwrap_or_else(|| UNKNOWN_LABEL.to_string());
                ClassificationEntry::new(label, coerce_confidence(Some(score)))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn bare_array(payload: &Value) -> Vec<ClassificationEntry> {
    match payload {
        Value::Array(items) => entries_from_array(items),
        _ => Vec::new(),
    }
}

fn single_object(payload: &Value) -> Vec<ClassificationEntry> {
    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };
    let Some(label) = pick_text(obj, SHORTHAND_LABEL_FIELDS) else {
        return Vec::new();
    };
    let confidence = coerce_confidence(pick_value(obj, CONFIDENCE_ALIASES));
    let description = pick_text(obj, DESCRIPTION_ALIASES).unwrap_or_default();
    vec![ClassificationEntry::new(label, confidence).with_description(description)]
}
