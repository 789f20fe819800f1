//! Classifier calls, aggregation, history and label lookup.
//!
//! Every network round trip goes through [`AnalysisBackend`], so the
//! aggregation rules can be exercised against a scripted backend.

pub mod aggregator;
pub mod client;
pub mod history;
pub mod labels;
pub mod options;

#[cfg(test)]
pub(crate) mod mock;

pub use aggregator::*;
pub use client::*;
pub use history::*;
pub use labels::*;
pub use options::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::report::{ReportRequest, ReportVariant};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Backend is not reachable at {0}")]
    Connection(String),

    #[error("Backend returned error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Both models failed or no response (chexpert: {chexpert}; pathology: {pathology})")]
    AllClassifiersFailed { chexpert: String, pathology: String },

    #[error("Cannot build report without an image path")]
    MissingImagePath,

    #[error("Report generation failed: {0}")]
    ReportFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The upstream HTTP surface, one method per endpoint.
///
/// Methods return the raw response body on a 2xx status; decoding and shape
/// tolerance live in the normalizers, not here.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// `POST /api/v1/image/analyze`
    async fn analyze_chexpert(
        &self,
        image: &ImageUpload,
        options: &AnalyzeOptions,
    ) -> Result<String, AnalysisError>;

    /// `POST /api/v1/pathology/analyze`
    async fn analyze_pathology(
        &self,
        image: &ImageUpload,
        options: &PathologyOptions,
    ) -> Result<String, AnalysisError>;

    /// `GET /api/v1/pathology/labels`
    async fn pathology_labels(&self) -> Result<String, AnalysisError>;

    /// `POST /api/v1/report/generate` and its versioned siblings.
    async fn generate_report(
        &self,
        variant: ReportVariant,
        request: &ReportRequest,
    ) -> Result<String, AnalysisError>;

    /// `GET /api/v1/history/list`
    async fn list_history(&self) -> Result<String, AnalysisError>;

    /// `POST /api/v1/history/add`
    async fn add_history(&self, entry: &HistoryEntry) -> Result<(), AnalysisError>;

    /// Base URL used to absolutize relative paths in responses.
    fn base_url(&self) -> &str;
}
