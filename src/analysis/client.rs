use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::{AnalysisBackend, AnalysisError, AnalyzeOptions, HistoryEntry, ImageUpload, PathologyOptions};
use crate::config::{endpoints, BackendConfig};
use crate::normalize::{decode_body, unwrap_envelope};
use crate::report::{ReportRequest, ReportVariant};

/// HTTP client for the dashboard backends.
pub struct HttpBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AnalysisError::HttpClient(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Backend configured from `CHEXDASH_*` environment variables.
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::new(BackendConfig::from_env())
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn image_form(image: &ImageUpload, fields: Vec<(&'static str, String)>) -> Result<Form, AnalysisError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type())
            .map_err(|e| AnalysisError::HttpClient(e.to_string()))?;
        let form = fields
            .into_iter()
            .fold(Form::new().part("file", part), |form, (key, value)| form.text(key, value));
        Ok(form)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<String, AnalysisError> {
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::HttpClient(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            tracing::warn!(endpoint = %url, status = status.as_u16(), %message, "Backend call failed");
            return Err(AnalysisError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(endpoint = %url, bytes = body.len(), "Backend call succeeded");
        Ok(body)
    }

    fn map_send_error(&self, e: reqwest::Error) -> AnalysisError {
        if e.is_connect() {
            AnalysisError::Connection(self.config.base_url.clone())
        } else if e.is_timeout() {
            AnalysisError::HttpClient(format!(
                "Request timed out after {}s",
                self.config.request_timeout_secs
            ))
        } else {
            AnalysisError::HttpClient(e.to_string())
        }
    }
}

/// Short human-readable reason from an error body: `detail.message`,
/// a string `detail`, then `message`. Raw payloads are never returned.
pub fn error_message(body: &str) -> Option<String> {
    let raw = decode_body(body);
    let payload = unwrap_envelope(&raw);
    let found = [&raw, &payload].into_iter().find_map(|v| {
        let detail = v.get("detail");
        detail
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .or_else(|| detail.and_then(Value::as_str))
            .or_else(|| v.get("message").and_then(Value::as_str))
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    });
    found
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn analyze_chexpert(
        &self,
        image: &ImageUpload,
        options: &AnalyzeOptions,
    ) -> Result<String, AnalysisError> {
        let url = self.config.endpoint(endpoints::CHEXPERT_ANALYZE);
        let form = Self::image_form(image, options.form_fields())?;
        tracing::info!(endpoint = %url, file = %image.file_name, "Uploading image to chexpert classifier");
        self.send(self.client.post(&url).multipart(form), &url).await
    }

    async fn analyze_pathology(
        &self,
        image: &ImageUpload,
        options: &PathologyOptions,
    ) -> Result<String, AnalysisError> {
        let url = self.config.endpoint(endpoints::PATHOLOGY_ANALYZE);
        let form = Self::image_form(image, options.form_fields())?;
        tracing::info!(endpoint = %url, file = %image.file_name, "Uploading image to pathology classifier");
        self.send(self.client.post(&url).multipart(form), &url).await
    }

    async fn pathology_labels(&self) -> Result<String, AnalysisError> {
        let url = self.config.endpoint(endpoints::PATHOLOGY_LABELS);
        self.send(self.client.get(&url), &url).await
    }

    async fn generate_report(
        &self,
        variant: ReportVariant,
        request: &ReportRequest,
    ) -> Result<String, AnalysisError> {
        let url = self.config.endpoint(variant.endpoint());
        tracing::info!(endpoint = %url, image_path = %request.image_path, "Requesting report");
        self.send(self.client.post(&url).json(request), &url).await
    }

    async fn list_history(&self) -> Result<String, AnalysisError> {
        let url = self.config.endpoint(endpoints::HISTORY_LIST);
        self.send(self.client.get(&url), &url).await
    }

    async fn add_history(&self, entry: &HistoryEntry) -> Result<(), AnalysisError> {
        let url = self.config.endpoint(endpoints::HISTORY_ADD);
        self.send(self.client.post(&url).json(entry), &url).await?;
        Ok(())
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::extract::{Multipart, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::sync::Mutex as TokioMutex;

    use super::*;

    type Seen = Arc<TokioMutex<Vec<(String, String)>>>;

    async fn record_fields(State(seen): State<Seen>, mut multipart: Multipart) -> Json<Value> {
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let value = match file_name {
                Some(file_name) => file_name,
                None => field.text().await.unwrap_or_default(),
            };
            seen.lock().await.push((name, value));
        }
        Json(json!({
            "success": true,
            "classifications": [{"label": "Edema", "confidence": 0.7}],
            "heatmap_image_url": "/uploads/h.png"
        }))
    }

    async fn spawn_backend() -> (SocketAddr, Seen) {
        let seen: Seen = Arc::new(TokioMutex::new(Vec::new()));
        let app = Router::new()
            .route(endpoints::CHEXPERT_ANALYZE, post(record_fields))
            .route(
                endpoints::PATHOLOGY_ANALYZE,
                post(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"detail": {"message": "model not loaded"}})),
                    )
                }),
            )
            .route(
                endpoints::PATHOLOGY_LABELS,
                get(|| async { Json(json!({"labels": ["Edema", "Mass"]})) }),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, seen)
    }

    fn backend_for(addr: SocketAddr) -> HttpBackend {
        HttpBackend::new(BackendConfig::new(&format!("http://{addr}/"))).unwrap()
    }

    fn image() -> ImageUpload {
        ImageUpload::new("chest.png", vec![0x89, 0x50, 0x4e, 0x47]).unwrap()
    }

    #[tokio::test]
    async fn chexpert_upload_sends_file_and_options() {
        let (addr, seen) = spawn_backend().await;
        let backend = backend_for(addr);

        let body = backend
            .analyze_chexpert(&image(), &AnalyzeOptions::default())
            .await
            .unwrap();
        assert!(body.contains("Edema"));

        let fields = seen.lock().await.clone();
        assert!(fields.contains(&("file".to_string(), "chest.png".to_string())));
        assert!(fields.contains(&("generate_heatmap".to_string(), "true".to_string())));
        assert!(fields.contains(&("alpha".to_string(), "0.45".to_string())));
        assert!(fields.contains(&("return_top_k".to_string(), "10".to_string())));
    }

    #[tokio::test]
    async fn http_error_carries_detail_message() {
        let (addr, _) = spawn_backend().await;
        let backend = backend_for(addr);

        let err = backend
            .analyze_pathology(&image(), &PathologyOptions { top_k: 3, min_prob: 0.5 })
            .await
            .unwrap_err();
        match err {
            AnalysisError::Backend { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "model not loaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn labels_body_is_returned_raw() {
        let (addr, _) = spawn_backend().await;
        let body = backend_for(addr).pathology_labels().await.unwrap();
        assert_eq!(decode_body(&body), json!({"labels": ["Edema", "Mass"]}));
    }

    #[tokio::test]
    async fn unknown_route_is_backend_error() {
        let (addr, _) = spawn_backend().await;
        let err = backend_for(addr).list_history().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Backend { status: 404, .. }));
    }

    #[tokio::test]
    async fn connection_refused_maps_to_connection_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = backend_for(addr).pathology_labels().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Connection(_)));
    }

    #[test]
    fn error_message_prefers_detail_message() {
        assert_eq!(
            error_message(r#"{"detail": {"message": "bad image"}, "message": "x"}"#).as_deref(),
            Some("bad image")
        );
        assert_eq!(error_message(r#"{"detail": "Not Found"}"#).as_deref(), Some("Not Found"));
        assert_eq!(error_message(r#"{"message": "boom"}"#).as_deref(), Some("boom"));
        assert_eq!(
            error_message(r#"{"data": {"detail": "wrapped"}}"#).as_deref(),
            Some("wrapped")
        );
        assert_eq!(error_message("<html>oops</html>"), None);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new(BackendConfig::new("http://localhost:8000/")).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
    }
}
