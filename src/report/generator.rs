use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::payload::{build_report_payload, ReportPayload};
use crate::analysis::{AggregatedResult, AnalysisBackend, AnalysisError};
use crate::config::endpoints;
use crate::normalize::{decode_body, unwrap_envelope};

/// Which report backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportVariant {
    #[default]
    Standard,
    V2,
    Glm4vRag,
}

impl ReportVariant {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Standard => endpoints::REPORT_GENERATE,
            Self::V2 => endpoints::REPORT_GENERATE_V2,
            Self::Glm4vRag => endpoints::REPORT_GENERATE_GLM4V_RAG,
        }
    }
}

impl fmt::Display for ReportVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::V2 => write!(f, "v2"),
            Self::Glm4vRag => write!(f, "glm4v-rag"),
        }
    }
}

impl FromStr for ReportVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "llava" => Ok(Self::Standard),
            "v2" | "llava7b" => Ok(Self::V2),
            "glm4v-rag" | "glm4v_rag" | "rag" => Ok(Self::Glm4vRag),
            other => Err(format!("unknown report variant: {other}")),
        }
    }
}

/// JSON body sent to the report backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub image_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub pathology_labels: Vec<String>,
    pub rag_query: String,
    pub classifier_probs: Map<String, Value>,
}

impl ReportRequest {
    /// Fails when the payload has no image path; nothing is sent in that case.
    pub fn from_payload(payload: ReportPayload, prompt: Option<String>) -> Result<Self, AnalysisError> {
        let image_path = payload
            .image_path
            .filter(|p| !p.is_empty())
            .ok_or(AnalysisError::MissingImagePath)?;
        Ok(Self {
            image_path,
            prompt: prompt.filter(|p| !p.trim().is_empty()),
            pathology_labels: payload.pathology_labels,
            rag_query: payload.rag_query,
            classifier_probs: payload.classifier_probs,
        })
    }
}

/// Free-text report as returned by the backend. The text is not post-processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub variant: ReportVariant,
    pub report: String,
    pub processing_time: Option<f64>,
}

/// Interpret a report response. `success: false` or missing text is an error
/// carrying the backend's message, never its raw payload.
pub fn parse_report_response(variant: ReportVariant, body: &str) -> Result<GeneratedReport, AnalysisError> {
    let payload = unwrap_envelope(&decode_body(body));

    let reason = || {
        payload
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| payload.get("detail").and_then(Value::as_str))
            .filter(|m| !m.is_empty())
            .unwrap_or("backend returned no report")
            .to_string()
    };

    if matches!(payload.get("success"), Some(Value::Bool(false))) {
        return Err(AnalysisError::ReportFailed(reason()));
    }

    let report = ["report", "report_text"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str).filter(|t| !t.trim().is_empty()))
        .ok_or_else(|| AnalysisError::ReportFailed(reason()))?;

    Ok(GeneratedReport {
        variant,
        report: report.to_string(),
        processing_time: payload.get("processing_time").and_then(Value::as_f64),
    })
}

/// Build the report query from an analysis and ask the backend for a report.
pub async fn generate_report<B: AnalysisBackend + ?Sized>(
    backend: &B,
    result: &AggregatedResult,
    variant: ReportVariant,
    prompt: Option<String>,
) -> Result<GeneratedReport, AnalysisError> {
    let payload = build_report_payload(result);
    let request = ReportRequest::from_payload(payload, prompt)?;
    tracing::info!(
        %variant,
        labels = ?request.pathology_labels,
        rag_query = %request.rag_query,
        "Generating report"
    );

    let body = backend.generate_report(variant, &request).await?;
    let report = parse_report_response(variant, &body)?;
    tracing::info!(%variant, chars = report.report.len(), processing_time = ?report.processing_time, "Report generated");
    Ok(report)
}
