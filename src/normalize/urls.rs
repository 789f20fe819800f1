//! Heatmap / original-image URL resolution and absolute <-> relative conversion.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use serde_json::Value;

use super::fields::pick_text;

pub const HEATMAP_ALIASES: &[&str] = &[
    "heatmap_image_url",
    "heatmapUrl",
    "heatmap",
    "cam_url",
    "gradcam",
    "cam",
    "gradcam_url",
    "heatmap_path",
    "cam_path",
    "gradcam_path",
];

pub const ORIGINAL_IMAGE_ALIASES: &[&str] = &[
    "original_image_url",
    "originalImageUrl",
    "original",
    "image_url",
    "img_url",
    "image_path",
    "img_path",
];

static ABSOLUTE_HTTP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("static regex"));

/// True when `path` already carries an `http(s)://` scheme.
pub fn is_absolute(path: &str) -> bool {
    ABSOLUTE_HTTP.is_match(path)
}

/// Converts backend paths against one configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    base_url: String,
}

impl UrlResolver {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Empty -> `None`; absolute -> unchanged; otherwise prefixed with the
    /// base URL and exactly one separating slash.
    pub fn to_absolute(&self, path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        if is_absolute(path) {
            return Some(path.to_string());
        }
        Some(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
    }

    /// First truthy heatmap alias on the payload, made absolute.
    pub fn resolve_heatmap(&self, payload: &Value) -> Option<String> {
        self.resolve(payload, HEATMAP_ALIASES)
    }

    /// First truthy original-image alias on the payload, made absolute.
    pub fn resolve_original(&self, payload: &Value) -> Option<String> {
        self.resolve(payload, ORIGINAL_IMAGE_ALIASES)
    }

    fn resolve(&self, payload: &Value, aliases: &[&str]) -> Option<String> {
        let obj = payload.as_object()?;
        let raw = pick_text(obj, aliases)?;
        self.to_absolute(&raw)
    }
}

/// Inverse of [`UrlResolver::to_absolute`]: keep the URL path, minus at most
/// one leading slash. Inputs without an `http(s)` scheme come back unchanged,
/// as do absolute strings that fail to parse.
pub fn to_relative(url: &str) -> String {
    if !is_absolute(url) {
        return url.to_string();
    }
    match Url::parse(url) {
        Ok(parsed) => {
            let path = parsed.path();
            path.strip_prefix('/').unwrap_or(path).to_string()
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "Cannot parse absolute URL, keeping as-is");
            url.to_string()
        }
    }
}
