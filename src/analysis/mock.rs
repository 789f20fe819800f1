//! Scripted backend for tests. Returns configured bodies or failures.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{AnalysisBackend, AnalysisError, AnalyzeOptions, HistoryEntry, ImageUpload, PathologyOptions};
use crate::report::{ReportRequest, ReportVariant};

const MOCK_BASE_URL: &str = "http://mock:8000";

/// `None` means the call fails with a connection error.
type Scripted = Option<String>;

pub struct MockBackend {
    chexpert: Scripted,
    pathology: Scripted,
    labels: Scripted,
    report: Scripted,
    history_list: Scripted,
    history_fails: bool,
    saved_history: Mutex<Vec<HistoryEntry>>,
    report_requests: Mutex<Vec<(ReportVariant, ReportRequest)>>,
    chexpert_options: Mutex<Option<AnalyzeOptions>>,
    pathology_options: Mutex<Option<PathologyOptions>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            chexpert: Some("{}".into()),
            pathology: Some("{}".into()),
            labels: None,
            report: None,
            history_list: None,
            history_fails: false,
            saved_history: Mutex::new(Vec::new()),
            report_requests: Mutex::new(Vec::new()),
            chexpert_options: Mutex::new(None),
            pathology_options: Mutex::new(None),
        }
    }

    pub fn with_chexpert(mut self, body: Value) -> Self {
        self.chexpert = Some(body.to_string());
        self
    }

    pub fn with_chexpert_failure(mut self) -> Self {
        self.chexpert = None;
        self
    }

    pub fn with_pathology(mut self, body: Value) -> Self {
        self.pathology = Some(body.to_string());
        self
    }

    pub fn with_pathology_failure(mut self) -> Self {
        self.pathology = None;
        self
    }

    pub fn with_labels_body(mut self, body: &str) -> Self {
        self.labels = Some(body.to_string());
        self
    }

    pub fn with_report(mut self, body: Value) -> Self {
        self.report = Some(body.to_string());
        self
    }

    pub fn with_history_list(mut self, body: Value) -> Self {
        self.history_list = Some(body.to_string());
        self
    }

    pub fn with_history_failure(mut self) -> Self {
        self.history_fails = true;
        self
    }

    pub fn saved_history(&self) -> Vec<HistoryEntry> {
        self.saved_history.lock().unwrap().clone()
    }

    pub fn report_requests(&self) -> Vec<(ReportVariant, ReportRequest)> {
        self.report_requests.lock().unwrap().clone()
    }

    pub fn last_chexpert_options(&self) -> Option<AnalyzeOptions> {
        self.chexpert_options.lock().unwrap().clone()
    }

    pub fn last_pathology_options(&self) -> Option<PathologyOptions> {
        self.pathology_options.lock().unwrap().clone()
    }

    fn reply(scripted: &Scripted) -> Result<String, AnalysisError> {
        scripted
            .clone()
            .ok_or_else(|| AnalysisError::Connection(MOCK_BASE_URL.to_string()))
    }
}

#[async_trait]
impl AnalysisBackend for MockBackend {
    async fn analyze_chexpert(
        &self,
        _image: &ImageUpload,
        options: &AnalyzeOptions,
    ) -> Result<String, AnalysisError> {
        *self.chexpert_options.lock().unwrap() = Some(options.clone());
        Self::reply(&self.chexpert)
    }

    async fn analyze_pathology(
        &self,
        _image: &ImageUpload,
        options: &PathologyOptions,
    ) -> Result<String, AnalysisError> {
        *self.pathology_options.lock().unwrap() = Some(options.clone());
        Self::reply(&self.pathology)
    }

    async fn pathology_labels(&self) -> Result<String, AnalysisError> {
        Self::reply(&self.labels)
    }

    async fn generate_report(
        &self,
        variant: ReportVariant,
        request: &ReportRequest,
    ) -> Result<String, AnalysisError> {
        self.report_requests
            .lock()
            .unwrap()
            .push((variant, request.clone()));
        Self::reply(&self.report)
    }

    async fn list_history(&self) -> Result<String, AnalysisError> {
        Self::reply(&self.history_list)
    }

    async fn add_history(&self, entry: &HistoryEntry) -> Result<(), AnalysisError> {
        if self.history_fails {
            return Err(AnalysisError::Backend {
                status: 503,
                message: "history store unavailable".into(),
            });
        }
        self.saved_history.lock().unwrap().push(entry.clone());
        Ok(())
    }

    fn base_url(&self) -> &str {
        MOCK_BASE_URL
    }
}
