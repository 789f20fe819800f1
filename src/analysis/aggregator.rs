//! Runs both classifiers for one image and merges their records.
//!
//! The two calls are joined with all-settle semantics on the current task:
//! a failure on one side never cancels the other. Only when both calls fail
//! is there nothing to show, and that is the one fatal outcome.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::history::{persist_history, HistoryEntry};
use super::{AnalysisBackend, AnalysisError, AnalyzeOptions, ImageUpload};
use crate::normalize::{AnalysisRecord, ClassificationEntry, ResponseNormalizer, UNKNOWN_LABEL};

/// Entries shown next to the heatmap.
pub const TOP_N: usize = 3;

/// Combined result of both classifiers for one uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    /// True when at least one classifier produced usable data.
    pub success: bool,
    /// Top entry of the chexpert classifier only; the pathology model is
    /// never consulted here.
    pub disease: String,
    pub confidence: f64,
    /// First three chexpert entries in backend order.
    pub top3: Vec<ClassificationEntry>,
    pub heatmap_url: Option<String>,
    pub original_image_url: Option<String>,
    pub chexpert: AnalysisRecord,
    pub pathology: AnalysisRecord,
    /// RFC 3339 construction time.
    #[serde(default)]
    pub analyzed_at: String,

    // Legacy fields; only present on results persisted by older dashboards.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pathologies: Vec<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl AggregatedResult {
    /// Merge two constituent records. Neither record is modified.
    pub fn from_records(chexpert: AnalysisRecord, pathology: AnalysisRecord) -> Self {
        let (disease, confidence) = chexpert
            .top()
            .map(|top| (top.label.clone(), top.confidence))
            .unwrap_or_else(|| (UNKNOWN_LABEL.to_string(), 0.0));

        Self {
            success: chexpert.success || pathology.success,
            disease,
            confidence,
            top3: chexpert.classifications.iter().take(TOP_N).cloned().collect(),
            heatmap_url: chexpert.heatmap_url.clone(),
            original_image_url: chexpert.original_image_url.clone(),
            chexpert,
            pathology,
            analyzed_at: chrono::Utc::now().to_rfc3339(),
            pathologies: Vec::new(),
            meta: Map::new(),
            view: None,
        }
    }
}

/// Drives the two classifier calls against one backend.
pub struct Aggregator<'a, B: AnalysisBackend + ?Sized> {
    backend: &'a B,
    normalizer: ResponseNormalizer,
    options: AnalyzeOptions,
}

impl<'a, B: AnalysisBackend + ?Sized> Aggregator<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            normalizer: ResponseNormalizer::new(backend.base_url()),
            backend,
            options: AnalyzeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalyzeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn normalizer(&self) -> &ResponseNormalizer {
        &self.normalizer
    }

    /// Analyze one image with both classifiers and persist a history entry.
    ///
    /// Fails only when both calls fail; the history write never affects the
    /// outcome.
    pub async fn aggregate(&self, image: &ImageUpload) -> Result<AggregatedResult, AnalysisError> {
        let pathology_options = self.options.pathology_options();
        let (chexpert, pathology) = tokio::join!(
            self.backend.analyze_chexpert(image, &self.options),
            self.backend.analyze_pathology(image, &pathology_options),
        );

        let (chexpert, pathology) = match (chexpert, pathology) {
            (Err(c), Err(p)) => {
                tracing::error!(chexpert = %c, pathology = %p, "Both classifiers failed");
                return Err(AnalysisError::AllClassifiersFailed {
                    chexpert: c.to_string(),
                    pathology: p.to_string(),
                });
            }
            (c, p) => (self.settle("chexpert", c), self.settle("pathology", p)),
        };

        let result = AggregatedResult::from_records(chexpert, pathology);
        tracing::info!(
            file = %image.file_name,
            success = result.success,
            disease = %result.disease,
            confidence = result.confidence,
            chexpert_ok = result.chexpert.success,
            pathology_ok = result.pathology.success,
            "Analysis aggregated"
        );

        persist_history(self.backend, &HistoryEntry::from_aggregated(&image.file_name, &result)).await;
        Ok(result)
    }

    fn settle(&self, model: &str, outcome: Result<String, AnalysisError>) -> AnalysisRecord {
        match outcome {
            Ok(body) => self.normalizer.normalize(&body),
            Err(e) => {
                tracing::warn!(model, error = %e, "Classifier call failed, continuing with the other");
                AnalysisRecord::failed(e.to_string())
            }
        }
    }
}
