use std::path::{Path, PathBuf};

use crate::core::error::SeoError;

// ---------------------------------------------------------------------------
// AppConfig: file-based config loader (config.yaml) with env-var fallback
// ---------------------------------------------------------------------------

/// Resolve a secret that may be written as `env:VAR_NAME`.
///
/// Returns `None` for blank values and for `env:` references whose variable is
/// unset, so callers can treat "not configured" uniformly.
pub fn resolve_secret(value: Option<&str>) -> Option<String> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.strip_prefix("env:") {
        Some(var) => std::env::var(var.trim())
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        None => Some(raw.to_string()),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `app:` section: analysis thresholds and directory layout.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct AppSection {
    /// Queries ranking at or above this position are already on page one.
    pub min_position: Option<f64>,
    pub min_impressions: Option<u64>,
    /// Cosine similarity needed for two keywords to share a local cluster.
    pub clustering_threshold: Option<f64>,
    pub output_directory: Option<String>,
    pub input_directory: Option<String>,
    pub sitemap_directory: Option<String>,
    pub knowledge_base_directory: Option<String>,
    pub max_headings_per_article: Option<usize>,
    pub top_clusters: Option<usize>,
    pub duplicate_threshold: Option<f64>,
    pub project_name: Option<String>,
    pub sitemap_url: Option<String>,
}

impl AppSection {
    pub fn resolve_min_position(&self) -> f64 {
        self.min_position
            .or_else(|| env_parse("SEO_MIN_POSITION"))
            .unwrap_or(10.0)
    }

    pub fn resolve_min_impressions(&self) -> u64 {
        self.min_impressions
            .or_else(|| env_parse("SEO_MIN_IMPRESSIONS"))
            .unwrap_or(10)
    }

    pub fn resolve_clustering_threshold(&self) -> f64 {
        self.clustering_threshold.unwrap_or(0.7).clamp(0.0, 1.0)
    }

    pub fn resolve_output_dir(&self) -> PathBuf {
        PathBuf::from(non_blank(&self.output_directory).unwrap_or_else(|| "output".into()))
    }

    pub fn resolve_input_dir(&self) -> PathBuf {
        PathBuf::from(non_blank(&self.input_directory).unwrap_or_else(|| "input".into()))
    }

    pub fn resolve_sitemap_dir(&self) -> PathBuf {
        PathBuf::from(non_blank(&self.sitemap_directory).unwrap_or_else(|| "sitemaps".into()))
    }

    pub fn resolve_knowledge_base_dir(&self) -> PathBuf {
        PathBuf::from(
            non_blank(&self.knowledge_base_directory).unwrap_or_else(|| "knowledge_base".into()),
        )
    }

    pub fn resolve_max_headings(&self) -> usize {
        self.max_headings_per_article.unwrap_or(8)
    }

    pub fn resolve_top_clusters(&self) -> usize {
        self.top_clusters.unwrap_or(50)
    }

    pub fn resolve_duplicate_threshold(&self) -> f64 {
        self.duplicate_threshold.unwrap_or(0.95)
    }

    /// Project name: YAML field → `SEO_PROJECT` env var → `None` (prompted later).
    pub fn resolve_project_name(&self) -> Option<String> {
        non_blank(&self.project_name).or_else(|| {
            std::env::var("SEO_PROJECT")
                .ok()
                .filter(|v| v.trim().len() >= 3)
        })
    }
}

/// `ai:` section: the provider used by the content optimization workflow.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct AiSection {
    /// One of `openai`, `azure`, `anthropic`, `openai_compatible`, `groq`, `gemini`.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    /// Seconds; doubled on every retry.
    pub retry_base_delay: Option<f64>,
    /// Requests per second. `0` disables throttling.
    pub qps: Option<f64>,
    pub response_json: Option<bool>,
    /// API key. Never logged. `env:NAME` reads the key from the environment.
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_api_version: Option<String>,
}

impl AiSection {
    pub fn resolve_provider(&self) -> String {
        non_blank(&self.provider)
            .or_else(|| std::env::var("SEO_AI_PROVIDER").ok())
            .unwrap_or_else(|| "openai_compatible".to_string())
    }

    /// Model name: YAML field → `SEO_AI_MODEL` env var → `gpt-4o-mini`.
    pub fn resolve_model(&self) -> String {
        non_blank(&self.model)
            .or_else(|| {
                std::env::var("SEO_AI_MODEL")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
            .unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    /// API key: YAML field (with `env:` indirection) → `OPENAI_API_KEY` → `None`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if self.api_key.is_some() {
            return resolve_secret(self.api_key.as_deref());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Base URL: YAML field → `OPENAI_BASE_URL` env var → `None` (provider default).
    pub fn resolve_base_url(&self) -> Option<String> {
        non_blank(&self.base_url).or_else(|| {
            std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
    }

    pub fn resolve_temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.0)
    }

    pub fn resolve_timeout_secs(&self) -> u64 {
        self.timeout_seconds.unwrap_or(60)
    }

    pub fn resolve_max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(3).max(1)
    }

    pub fn resolve_retry_base_delay(&self) -> f64 {
        self.retry_base_delay.unwrap_or(1.5).max(0.0)
    }

    pub fn resolve_qps(&self) -> f64 {
        self.qps.unwrap_or(1.0)
    }

    pub fn resolve_response_json(&self) -> bool {
        self.response_json.unwrap_or(true)
    }
}

/// One entry of the `ai_models:` table used by content generation and synonyms.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ModelEntry {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_api_version: Option<String>,
}

/// `ai_models:` holds named models plus the name of the default one.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ModelsSection {
    pub default: Option<String>,
    #[serde(flatten)]
    pub models: std::collections::BTreeMap<String, ModelEntry>,
}

/// `scraping:` section: politeness and retry knobs.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScrapingSection {
    pub user_agent: Option<String>,
    pub request_timeout_seconds: Option<u64>,
    pub delay_ms: Option<u64>,
    pub batch_size: Option<usize>,
    pub sitemap_max_retries: Option<u32>,
    pub sitemap_timeout_seconds: Option<u64>,
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

impl ScrapingSection {
    pub fn resolve_user_agent(&self) -> String {
        non_blank(&self.user_agent).unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn resolve_request_timeout_secs(&self) -> u64 {
        self.request_timeout_seconds
            .or_else(|| env_parse("HTTP_TIMEOUT_SECS"))
            .unwrap_or(10)
    }

    pub fn resolve_delay_ms(&self) -> u64 {
        self.delay_ms.unwrap_or(500)
    }

    /// `None` means "ask the user".
    pub fn resolve_batch_size(&self) -> Option<usize> {
        self.batch_size.filter(|n| *n > 0)
    }

    pub fn resolve_sitemap_max_retries(&self) -> u32 {
        self.sitemap_max_retries.unwrap_or(10).max(1)
    }

    pub fn resolve_sitemap_timeout_secs(&self) -> u64 {
        self.sitemap_timeout_seconds.unwrap_or(30)
    }
}

/// Top-level config loaded from `config.yaml`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub ai_models: ModelsSection,
    #[serde(default)]
    pub scraping: ScrapingSection,
}

impl AppConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self, SeoError> {
        // An empty file is a valid "all defaults" config.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|e| SeoError::Config(e.to_string()))
    }
}

/// Pick the config path.
///
/// Search order (first found wins):
/// 1. the explicit `--config` path
/// 2. `SEO_SCOUT_CONFIG` env var path
/// 3. `./config.yaml`
/// 4. `<user config dir>/seo-scout/config.yaml`
pub fn config_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut v = Vec::new();
    if let Some(p) = explicit {
        v.push(p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var("SEO_SCOUT_CONFIG") {
        v.push(PathBuf::from(env_path));
    }
    v.push(PathBuf::from("config.yaml"));
    if let Some(dir) = dirs::config_dir() {
        v.push(dir.join("seo-scout").join("config.yaml"));
    }
    v
}

/// Load and parse a config file.
///
/// Missing file → [`SeoError::ConfigNotFound`]; parse error → [`SeoError::Config`].
pub fn load_config(path: &Path) -> Result<AppConfig, SeoError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SeoError::ConfigNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(SeoError::Io(e)),
    };
    let cfg = AppConfig::from_yaml_str(&contents)?;
    tracing::info!("📄 Configuration loaded from {}", path.display());
    Ok(cfg)
}

/// Load the first existing candidate from [`config_candidates`].
pub fn load_first_config(explicit: Option<&Path>) -> Result<(PathBuf, AppConfig), SeoError> {
    let candidates = config_candidates(explicit);
    // An explicit path must exist; do not silently fall back to another file.
    if let Some(p) = explicit {
        return load_config(p).map(|cfg| (p.to_path_buf(), cfg));
    }
    for path in &candidates {
        if path.exists() {
            return load_config(path).map(|cfg| (path.clone(), cfg));
        }
    }
    Err(SeoError::ConfigNotFound(
        candidates
            .into_iter()
            .next()
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_sections_missing() {
        let cfg = AppConfig::from_yaml_str("app:\n  min_position: 12\n").unwrap();
        assert_eq!(cfg.app.resolve_min_position(), 12.0);
        assert_eq!(cfg.app.resolve_max_headings(), 8);
        assert_eq!(cfg.app.resolve_output_dir(), PathBuf::from("output"));
        assert_eq!(cfg.ai.resolve_max_retries(), 3);
        assert!((cfg.ai.resolve_retry_base_delay() - 1.5).abs() < f64::EPSILON);
        assert_eq!(cfg.scraping.resolve_delay_ms(), 500);
        assert!(cfg.scraping.resolve_batch_size().is_none());
    }

    #[test]
    fn test_models_table_with_default() {
        let yaml = r#"
ai_models:
  default: fast
  fast:
    provider: groq
    model: llama3-8b-8192
    api_key: abc
  smart:
    provider: anthropic
    model: claude-3-haiku-20240307
"#;
        let cfg = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.ai_models.default.as_deref(), Some("fast"));
        assert_eq!(cfg.ai_models.models.len(), 2);
        assert_eq!(
            cfg.ai_models.models["smart"].provider.as_deref(),
            Some("anthropic")
        );
    }

    #[test]
    fn test_resolve_secret_env_indirection() {
        std::env::set_var("SEO_SCOUT_TEST_KEY_1", "sk-test");
        assert_eq!(
            resolve_secret(Some("env:SEO_SCOUT_TEST_KEY_1")),
            Some("sk-test".to_string())
        );
        assert_eq!(resolve_secret(Some("env:SEO_SCOUT_TEST_KEY_UNSET_XYZ")), None);
        assert_eq!(resolve_secret(Some("  ")), None);
        assert_eq!(resolve_secret(Some("plain")), Some("plain".to_string()));
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Path::new("/definitely/not/here/config.yaml")).unwrap_err();
        assert!(matches!(err, SeoError::ConfigNotFound(_)));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = AppConfig::from_yaml_str("app: [unclosed").unwrap_err();
        assert!(matches!(err, SeoError::Config(_)));
    }
}
