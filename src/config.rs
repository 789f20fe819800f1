use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "chexdash";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backend used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const BASE_URL_ENV: &str = "CHEXDASH_API_BASE_URL";
pub const CONNECT_TIMEOUT_ENV: &str = "CHEXDASH_CONNECT_TIMEOUT_SECS";
pub const REQUEST_TIMEOUT_ENV: &str = "CHEXDASH_REQUEST_TIMEOUT_SECS";

/// Backend endpoint paths, relative to the configured base URL.
pub mod endpoints {
    pub const CHEXPERT_ANALYZE: &str = "/api/v1/image/analyze";
    pub const PATHOLOGY_ANALYZE: &str = "/api/v1/pathology/analyze";
    pub const PATHOLOGY_LABELS: &str = "/api/v1/pathology/labels";
    pub const REPORT_GENERATE: &str = "/api/v1/report/generate";
    pub const REPORT_GENERATE_V2: &str = "/api/v1/report/generate-v2";
    pub const REPORT_GENERATE_GLM4V_RAG: &str = "/api/v1/report/generate-glm4v-rag";
    pub const HISTORY_LIST: &str = "/api/v1/history/list";
    pub const HISTORY_ADD: &str = "/api/v1/history/add";
}

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "chexdash=info"
}

/// Where the backends live and how long we wait for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub connect_timeout_secs: u64,
    /// Report generation runs remote inference and can be slow.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: trim_base_url(base_url),
            ..Self::default()
        }
    }

    /// Build from `CHEXDASH_*` environment variables, falling back to defaults.
    ///
    /// Unparseable timeouts are ignored with a warning rather than rejected.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.base_url = trim_base_url(&url);
        }
        if let Some(secs) = parse_secs(&lookup, CONNECT_TIMEOUT_ENV) {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = parse_secs(&lookup, REQUEST_TIMEOUT_ENV) {
            config.request_timeout_secs = secs;
        }
        config
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = trim_base_url(base_url);
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Join an endpoint path onto the base URL. Absolute URLs are used as-is.
    pub fn endpoint(&self, path: &str) -> String {
        crate::normalize::urls::UrlResolver::new(&self.base_url)
            .to_absolute(path)
            .unwrap_or_else(|| self.base_url.clone())
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid timeout override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 120);
    }

    #[test]
    fn env_overrides_apply() {
        let config = BackendConfig::from_lookup(lookup_from(&[
            (BASE_URL_ENV, "http://10.0.0.5:9000/"),
            (CONNECT_TIMEOUT_ENV, "3"),
            (REQUEST_TIMEOUT_ENV, "600"),
        ]));
        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.request_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn invalid_timeout_keeps_default() {
        let config = BackendConfig::from_lookup(lookup_from(&[(CONNECT_TIMEOUT_ENV, "soon")]));
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn blank_base_url_is_ignored() {
        let config = BackendConfig::from_lookup(lookup_from(&[(BASE_URL_ENV, "  ")]));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn endpoint_joins_with_single_slash() {
        let config = BackendConfig::new("http://host:8000///");
        assert_eq!(
            config.endpoint(endpoints::CHEXPERT_ANALYZE),
            "http://host:8000/api/v1/image/analyze"
        );
    }

    #[test]
    fn app_name_is_chexdash() {
        assert_eq!(APP_NAME, "chexdash");
    }
}
