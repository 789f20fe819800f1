use std::path::Path;

use super::AnalysisError;

/// Extensions the classifiers accept.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".dcm", ".jpg", ".jpeg", ".png"];

/// 50 MiB upload ceiling.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Top-K the dashboard asks for when the user does not choose one.
pub const DEFAULT_TOP_K: u32 = 10;

/// An image held in memory, ready for multipart upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Wrap in-memory bytes after validating name and size.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AnalysisError> {
        let file_name = file_name.into();
        validate_file_type(&file_name)?;
        validate_file_size(bytes.len() as u64)?;
        Ok(Self { file_name, bytes })
    }

    /// Read and validate an image from disk. Size is checked before reading.
    pub async fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AnalysisError::InvalidImage(format!("no file name in {}", path.display())))?
            .to_string();
        validate_file_type(&file_name)?;

        let size = tokio::fs::metadata(path).await?.len();
        validate_file_size(size)?;

        let bytes = tokio::fs::read(path).await?;
        Ok(Self { file_name, bytes })
    }

    /// MIME type sent with the multipart part.
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .to_string()
    }
}

pub fn validate_file_type(file_name: &str) -> Result<(), AnalysisError> {
    let lower = file_name.to_lowercase();
    if ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Ok(())
    } else {
        Err(AnalysisError::InvalidImage(format!(
            "{file_name}: only .dcm/.jpg/.jpeg/.png are supported"
        )))
    }
}

pub fn validate_file_size(size_bytes: u64) -> Result<(), AnalysisError> {
    if size_bytes <= MAX_UPLOAD_BYTES {
        Ok(())
    } else {
        Err(AnalysisError::InvalidImage(format!(
            "{size_bytes} bytes exceeds the 50MB limit"
        )))
    }
}

/// Form fields for the chexpert-style classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOptions {
    pub generate_heatmap: bool,
    pub threshold: f64,
    /// Heatmap overlay opacity.
    pub alpha: f64,
    pub return_top_k: Option<u32>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            generate_heatmap: true,
            threshold: 0.5,
            alpha: 0.45,
            return_top_k: Some(DEFAULT_TOP_K),
        }
    }
}

impl AnalyzeOptions {
    /// Text form fields, `return_top_k` only when set.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("generate_heatmap", self.generate_heatmap.to_string()),
            ("threshold", self.threshold.to_string()),
            ("alpha", self.alpha.to_string()),
        ];
        if let Some(k) = self.return_top_k {
            fields.push(("return_top_k", k.to_string()));
        }
        fields
    }

    /// The pathology call reuses top-k and treats the threshold as `min_prob`.
    pub fn pathology_options(&self) -> PathologyOptions {
        PathologyOptions {
            top_k: self.return_top_k.unwrap_or(DEFAULT_TOP_K),
            min_prob: self.threshold,
        }
    }
}

/// Form fields for the pathology classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PathologyOptions {
    pub top_k: u32,
    pub min_prob: f64,
}

impl PathologyOptions {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("top_k", self.top_k.to_string()),
            ("min_prob", self.min_prob.to_string()),
        ]
    }
}
