use serde_json::{Map, Value};

use super::envelope::unwrap_envelope;
use super::fields::extract_classifications;
use super::types::AnalysisRecord;
use super::urls::UrlResolver;

/// Turns raw classifier responses into [`AnalysisRecord`]s.
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    urls: UrlResolver,
}

impl ResponseNormalizer {
    pub fn new(base_url: &str) -> Self {
        Self {
            urls: UrlResolver::new(base_url),
        }
    }

    pub fn urls(&self) -> &UrlResolver {
        &self.urls
    }

    /// Normalize a response body delivered as text. Malformed JSON is
    /// treated as an empty object.
    pub fn normalize(&self, body: &str) -> AnalysisRecord {
        self.normalize_value(decode_body(body))
    }

    /// Normalize an already decoded response.
    pub fn normalize_value(&self, raw: Value) -> AnalysisRecord {
        let payload = unwrap_envelope(&raw);

        let classifications = extract_classifications(&payload);
        let heatmap_url = self.urls.resolve_heatmap(&payload);
        let original_image_url = self.urls.resolve_original(&payload);
        let meta = match payload.get("meta") {
            Some(Value::Object(meta)) => meta.clone(),
            _ => Map::new(),
        };

        let success = has_success_signal(&raw)
            || has_success_signal(&payload)
            || !classifications.is_empty()
            || heatmap_url.is_some();

        AnalysisRecord {
            success,
            classifications,
            heatmap_url,
            original_image_url,
            meta,
            raw_response: raw,
            error: None,
        }
    }
}

/// Decode a text body; anything unparseable becomes `{}`.
pub fn decode_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Response body is not JSON, treating as empty payload");
        Value::Object(Map::new())
    })
}

/// Explicit backend success markers: `success: true`, `ok: true`, or a
/// `status` equal to "ok" in any case.
fn has_success_signal(value: &Value) -> bool {
    let flag = |key: &str| matches!(value.get(key), Some(Value::Bool(true)));
    let status_ok = value
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.to_lowercase() == "ok");
    flag("success") || flag("ok") || status_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> ResponseNormalizer {
        ResponseNormalizer::new("http://localhost:8000")
    }

    #[test]
    fn canonical_backend_response() {
        let body = r#"{
            "success": true,
            "message": "ok",
            "original_image_url": "/uploads/abc.png",
            "heatmap_image_url": "/uploads/abc_heatmap.png",
            "classifications": [
                {"label": "Cardiomegaly", "confidence": 0.81, "description": "Enlarged heart"},
                {"label": "Edema", "confidence": 0.42}
            ],
            "meta": {"view": "PA"}
        }"#;
        let record = normalizer().normalize(body);
        assert!(record.success);
        assert_eq!(record.classifications.len(), 2);
        assert_eq!(record.classifications[0].label, "Cardiomegaly");
        assert_eq!(
            record.heatmap_url.as_deref(),
            Some("http://localhost:8000/uploads/abc_heatmap.png")
        );
        assert_eq!(
            record.original_image_url.as_deref(),
            Some("http://localhost:8000/uploads/abc.png")
        );
        assert_eq!(record.view(), Some("PA"));
        assert_eq!(record.raw_response["message"], "ok");
    }

    #[test]
    fn malformed_body_is_empty_unsuccessful_record() {
        let record = normalizer().normalize("<html>502 Bad Gateway</html>");
        assert!(!record.success);
        assert!(record.classifications.is_empty());
        assert_eq!(record.raw_response, json!({}));
        assert!(record.error.is_none());
    }

    #[test]
    fn status_ok_alone_is_success() {
        let record = normalizer().normalize_value(json!({"status": "OK"}));
        assert!(record.success);
        assert!(record.classifications.is_empty());
        assert!(record.heatmap_url.is_none());
    }

    #[test]
    fn classifications_override_explicit_false() {
        let record = normalizer().normalize_value(json!({
            "success": false,
            "classifications": [{"label": "Edema", "confidence": 0.5}]
        }));
        assert!(record.success);
    }

    #[test]
    fn heatmap_alone_is_success() {
        let record = normalizer().normalize_value(json!({"success": false, "cam_url": "c.png"}));
        assert!(record.success);
    }

    #[test]
    fn ok_flag_checked_inside_envelope() {
        let record = normalizer().normalize_value(json!({"data": {"ok": true}}));
        assert!(record.success);
    }

    #[test]
    fn truthy_non_bool_flags_do_not_count() {
        let record = normalizer().normalize_value(json!({"success": "true", "ok": 1}));
        assert!(!record.success);
    }

    #[test]
    fn explicit_failure_without_data() {
        let record = normalizer().normalize_value(json!({
            "success": false,
            "detail": {"message": "model not loaded"}
        }));
        assert!(!record.success);
    }

    #[test]
    fn wrapped_payload_is_unwrapped() {
        let record = normalizer().normalize_value(json!({
            "data": {"result": {"probs": {"Edema": 0.2, "Mass": 0.6}, "heatmap": "h.png"}}
        }));
        assert!(record.success);
        assert_eq!(record.classifications[0].label, "Mass");
        assert_eq!(record.heatmap_url.as_deref(), Some("http://localhost:8000/h.png"));
        assert!(record.raw_response.get("data").is_some());
    }
}
