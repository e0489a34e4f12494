//! Per-project memory of generated content.
//!
//! Lives under `{base}/{sanitized project name}/` as four JSON files:
//!
//! * `metadata.json`: counters and timestamps
//! * `content_history.json`: every suggested / generated article
//! * `performance_metrics.json`: improvement suggestions keyed by md5(url)
//! * `keyword_clusters.json`: clusters saved for later runs
//!
//! The files are loaded once when the project is opened. Unreadable files fall
//! back to defaults with a warning. Writes are pretty-printed, keep non-ASCII
//! text as-is and go through temp-file + rename so readers never see a partial
//! file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Local, SecondsFormat};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use similar::TextDiff;
use tracing::{info, warn};

use crate::core::error::SeoResult;

static UNSAFE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-.]").expect("static name regex"));

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KbMetadata {
    pub project_name: String,
    pub created_at: String,
    pub last_updated: String,
    #[serde(default)]
    pub total_analyses: u64,
    #[serde(default)]
    pub total_content_generated: u64,
    #[serde(default)]
    pub total_improvements_suggested: u64,
}

impl KbMetadata {
    fn new(project_name: &str) -> Self {
        let now = now_iso();
        Self {
            project_name: project_name.to_string(),
            created_at: now.clone(),
            last_updated: now,
            total_analyses: 0,
            total_content_generated: 0,
            total_improvements_suggested: 0,
        }
    }
}

/// One suggested or generated article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentEntry {
    pub content_hash: String,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub predicted_impressions: i64,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub cluster_info: Value,
    /// `suggested`, `in_progress` or `published`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub actual_performance: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImprovementEntry {
    pub url: String,
    pub keywords: Vec<String>,
    pub suggestions: Value,
    pub current_metrics: Value,
    pub suggested_at: String,
    /// `pending`, `implemented` or `verified`.
    pub status: String,
    #[serde(default)]
    pub improvement_results: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UrlHistory {
    pub url: String,
    #[serde(default)]
    pub history: Vec<ImprovementEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CtrTrainingData {
    pub predictions: Vec<i64>,
    pub actuals: Vec<i64>,
    pub features: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KbStatistics {
    /// Serialized through the flattened metadata.
    #[serde(skip)]
    pub project_name: String,
    pub total_content_suggestions: usize,
    pub published_content: usize,
    pub total_keyword_clusters: usize,
    pub unique_keywords: usize,
    pub total_predicted_impressions: i64,
    pub total_improvements_tracked: usize,
    #[serde(flatten)]
    pub metadata: KbMetadata,
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence helpers
// ─────────────────────────────────────────────────────────────────────────────

fn now_iso() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Directory-safe project name: anything outside `[\w.-]` becomes `_`, lowercased.
pub fn sanitize_name(name: &str) -> String {
    UNSAFE_NAME_RE.replace_all(name, "_").to_lowercase()
}

fn load_json<T: DeserializeOwned>(path: &Path, default: T) -> T {
    if !path.exists() {
        return default;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!("knowledge_base: failed to read {}: {}", path.display(), e);
            return default;
        }
    };
    match serde_json::from_str::<T>(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                "knowledge_base: failed to parse {}: {}, using defaults",
                path.display(),
                e
            );
            default
        }
    }
}

/// Write `data` atomically via `{path}.tmp` + rename.
fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) {
    let json = match serde_json::to_string_pretty(data) {
        Ok(s) => s,
        Err(e) => {
            warn!("knowledge_base: serialization failed: {}", e);
            return;
        }
    };
    let tmp = path.with_extension("json.tmp");
    if let Err(e) = std::fs::write(&tmp, &json) {
        warn!(
            "knowledge_base: failed to write temp file {}: {}",
            tmp.display(),
            e
        );
        return;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        warn!(
            "knowledge_base: failed to rename {} → {}: {}",
            tmp.display(),
            path.display(),
            e
        );
    }
}

fn md5_hex(s: &str) -> String {
    format!("{:x}", md5::compute(s.as_bytes()))
}

/// `md5("{title}_{sorted keywords joined by '-'}")`.
pub fn content_hash(title: &str, keywords: &[String]) -> String {
    let mut sorted: Vec<&str> = keywords.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    md5_hex(&format!("{}_{}", title, sorted.join("-")))
}

/// Keyword list rendered as a compact ASCII JSON array (`["a", "b"]`, non-ASCII
/// escaped as `\uXXXX`), the form cluster hashes are computed over.
fn ascii_json_list(items: &[String]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('"');
        for ch in item.chars() {
            match ch {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
                c => {
                    let mut buf = [0u16; 2];
                    for unit in c.encode_utf16(&mut buf) {
                        out.push_str(&format!("\\u{:04x}", unit));
                    }
                }
            }
        }
        out.push('"');
    }
    out.push(']');
    out
}

fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    TextDiff::from_chars(a.as_str(), b.as_str()).ratio() as f64
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

pub struct KnowledgeBase {
    project_name: String,
    project_dir: PathBuf,
    metadata: KbMetadata,
    content_history: Vec<ContentEntry>,
    performance: BTreeMap<String, UrlHistory>,
    clusters: Vec<Value>,
}

impl KnowledgeBase {
    /// Open (or create) the knowledge base of `project_name` under `base_dir`.
    pub fn open(project_name: &str, base_dir: &Path) -> SeoResult<Self> {
        let project_dir = base_dir.join(sanitize_name(project_name));
        std::fs::create_dir_all(&project_dir)?;

        let metadata = load_json(
            &project_dir.join("metadata.json"),
            KbMetadata::new(project_name),
        );
        let content_history = load_json(&project_dir.join("content_history.json"), Vec::new());
        let performance = load_json(&project_dir.join("performance_metrics.json"), BTreeMap::new());
        let clusters = load_json(&project_dir.join("keyword_clusters.json"), Vec::new());

        info!("📚 Knowledge base initialized for project: {}", project_name);
        Ok(Self {
            project_name: project_name.to_string(),
            project_dir,
            metadata,
            content_history,
            performance,
            clusters,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn metadata(&self) -> &KbMetadata {
        &self.metadata
    }

    pub fn content_history(&self) -> &[ContentEntry] {
        &self.content_history
    }

    fn touch_metadata(&mut self) {
        self.metadata.last_updated = now_iso();
        save_json(&self.project_dir.join("metadata.json"), &self.metadata);
    }

    /// `true` when the same title+keywords hash exists, or a stored title is at
    /// least `threshold` similar (case-insensitive).
    pub fn is_duplicate_content(&self, title: &str, keywords: &[String], threshold: f64) -> bool {
        let hash = content_hash(title, keywords);
        for item in &self.content_history {
            if item.content_hash == hash {
                info!("Exact duplicate found: {}", title);
                return true;
            }
            let similarity = title_similarity(title, &item.title);
            if similarity >= threshold {
                info!(
                    "Similar content found: {} (~{:.0}% similar to: {})",
                    title,
                    similarity * 100.0,
                    item.title
                );
                return true;
            }
        }
        false
    }

    /// Record a suggested article. Returns its content hash.
    pub fn add_generated_content(
        &mut self,
        title: &str,
        keywords: &[String],
        content_type: &str,
        predicted_impressions: i64,
        cluster_info: Option<Value>,
    ) -> String {
        let hash = content_hash(title, keywords);
        self.content_history.push(ContentEntry {
            content_hash: hash.clone(),
            title: title.to_string(),
            keywords: keywords.to_vec(),
            content_type: content_type.to_string(),
            predicted_impressions,
            generated_at: now_iso(),
            cluster_info: cluster_info.unwrap_or_else(|| json!({})),
            status: "suggested".to_string(),
            actual_performance: None,
            updated_at: None,
        });
        save_json(
            &self.project_dir.join("content_history.json"),
            &self.content_history,
        );

        self.metadata.total_content_generated += 1;
        self.touch_metadata();
        info!("Added content to history: {}", title);
        hash
    }

    pub fn add_improvement_suggestion(
        &mut self,
        url: &str,
        keywords: &[String],
        suggestions: Value,
        current_metrics: Value,
    ) {
        let entry = ImprovementEntry {
            url: url.to_string(),
            keywords: keywords.to_vec(),
            suggestions,
            current_metrics,
            suggested_at: now_iso(),
            status: "pending".to_string(),
            improvement_results: None,
        };
        self.performance
            .entry(md5_hex(url))
            .or_insert_with(|| UrlHistory {
                url: url.to_string(),
                history: Vec::new(),
            })
            .history
            .push(entry);
        save_json(
            &self.project_dir.join("performance_metrics.json"),
            &self.performance,
        );

        self.metadata.total_improvements_suggested += 1;
        self.touch_metadata();
        info!("Added improvement suggestion for: {}", url);
    }

    /// Store a cluster, stamping `created_at` and `cluster_hash` (md5 of its keyword list).
    pub fn save_keyword_cluster(&mut self, cluster: Value) {
        let mut cluster = match cluster {
            Value::Object(map) => map,
            other => {
                warn!("knowledge_base: cluster is not an object: {}", other);
                return;
            }
        };
        let keywords: Vec<String> = cluster
            .get("keywords")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        cluster.insert("created_at".into(), Value::String(now_iso()));
        cluster.insert(
            "cluster_hash".into(),
            Value::String(md5_hex(&ascii_json_list(&keywords))),
        );
        let topic = cluster
            .get("main_topic")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        self.clusters.push(Value::Object(cluster));
        save_json(&self.project_dir.join("keyword_clusters.json"), &self.clusters);
        info!("Saved keyword cluster: {}", topic);
    }

    /// Count one finished analysis run.
    pub fn record_analysis(&mut self) {
        self.metadata.total_analyses += 1;
        self.touch_metadata();
    }

    /// All keywords from content history and saved clusters.
    pub fn existing_keywords(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = BTreeSet::new();
        for item in &self.content_history {
            out.extend(item.keywords.iter().cloned());
        }
        for cluster in &self.clusters {
            if let Some(arr) = cluster.get("keywords").and_then(Value::as_array) {
                out.extend(arr.iter().filter_map(|v| v.as_str().map(str::to_string)));
            }
        }
        out
    }

    /// Most recent entries first.
    pub fn content_suggestions_history(&self, limit: usize) -> Vec<ContentEntry> {
        // Reverse first so equal timestamps still list the later insert first.
        let mut items: Vec<ContentEntry> = self.content_history.iter().rev().cloned().collect();
        items.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        items.truncate(limit);
        items
    }

    /// Returns `false` when no entry has `hash`.
    pub fn update_content_status(
        &mut self,
        hash: &str,
        status: &str,
        actual_performance: Option<Value>,
    ) -> bool {
        let Some(item) = self
            .content_history
            .iter_mut()
            .find(|i| i.content_hash == hash)
        else {
            warn!("Content not found: {}", hash);
            return false;
        };
        item.status = status.to_string();
        item.updated_at = Some(now_iso());
        if actual_performance.is_some() {
            item.actual_performance = actual_performance;
        }
        save_json(
            &self.project_dir.join("content_history.json"),
            &self.content_history,
        );
        info!("Updated content status: {} -> {}", hash, status);
        true
    }

    /// Predicted vs actual impressions for entries with measured performance.
    pub fn ctr_prediction_data(&self) -> CtrTrainingData {
        let mut data = CtrTrainingData::default();
        for item in &self.content_history {
            let Some(actual) = item.actual_performance.as_ref().filter(|v| !v.is_null()) else {
                continue;
            };
            data.predictions.push(item.predicted_impressions);
            data.actuals
                .push(actual.get("impressions").and_then(Value::as_i64).unwrap_or(0));
            data.features.push(json!({
                "content_type": item.content_type,
                "keyword_count": item.keywords.len(),
                "title_length": item.title.chars().count(),
            }));
        }
        data
    }

    pub fn statistics(&self) -> KbStatistics {
        KbStatistics {
            project_name: self.project_name.clone(),
            total_content_suggestions: self.content_history.len(),
            published_content: self
                .content_history
                .iter()
                .filter(|i| i.status == "published")
                .count(),
            total_keyword_clusters: self.clusters.len(),
            unique_keywords: self.existing_keywords().len(),
            total_predicted_impressions: self
                .content_history
                .iter()
                .map(|i| i.predicted_impressions)
                .sum(),
            total_improvements_tracked: self.performance.len(),
            metadata: self.metadata.clone(),
        }
    }

    /// Dump everything into one JSON report (default `report_{timestamp}.json`
    /// inside the project directory).
    pub fn export_report(&self, path: Option<&Path>) -> PathBuf {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.project_dir.join(format!(
                "report_{}.json",
                Local::now().format("%Y%m%d_%H%M%S")
            )),
        };
        let report = json!({
            "metadata": self.metadata,
            "statistics": self.statistics(),
            "content_history": self.content_history,
            "keyword_clusters": self.clusters,
            "performance_tracking": self.performance,
            "generated_at": now_iso(),
        });
        save_json(&path, &report);
        info!("Exported knowledge base report: {}", path.display());
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kws(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("My Site.com/blog"), "my_site.com_blog");
        assert_eq!(sanitize_name("فروشگاه-من"), "فروشگاه-من");
    }

    #[test]
    fn test_content_hash_ignores_keyword_order() {
        assert_eq!(
            content_hash("t", &kws(&["b", "a"])),
            content_hash("t", &kws(&["a", "b"]))
        );
        assert_eq!(content_hash("t", &kws(&["a", "b"])), md5_hex("t_a-b"));
    }

    #[test]
    fn test_ascii_json_list() {
        assert_eq!(ascii_json_list(&kws(&["a", "b"])), r#"["a", "b"]"#);
        assert_eq!(ascii_json_list(&kws(&["سل"])), r#"["\u0633\u0644"]"#);
        assert_eq!(ascii_json_list(&[]), "[]");
    }

    #[test]
    fn test_duplicate_detection_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = KnowledgeBase::open("Demo Project", dir.path()).unwrap();
        assert!(!kb.is_duplicate_content("راهنمای خرید کفش", &kws(&["کفش"]), 0.95));

        let hash = kb.add_generated_content("راهنمای خرید کفش", &kws(&["کفش"]), "راهنما", 120, None);
        assert!(kb.is_duplicate_content("راهنمای خرید کفش", &kws(&["کفش"]), 0.95));
        // Same title, other keywords: caught by similarity.
        assert!(kb.is_duplicate_content("راهنمای خرید کفش", &kws(&["x"]), 0.95));
        assert!(!kb.is_duplicate_content("آموزش برنامه نویسی", &kws(&["x"]), 0.95));

        assert!(kb.update_content_status(&hash, "published", Some(json!({"impressions": 90}))));
        assert!(!kb.update_content_status("missing", "published", None));

        let reopened = KnowledgeBase::open("Demo Project", dir.path()).unwrap();
        assert_eq!(reopened.metadata().total_content_generated, 1);
        assert_eq!(reopened.content_history()[0].status, "published");
        let training = reopened.ctr_prediction_data();
        assert_eq!(training.predictions, vec![120]);
        assert_eq!(training.actuals, vec![90]);
        assert!(dir.path().join("demo_project").join("metadata.json").exists());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("p1");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("content_history.json"), "{not json").unwrap();
        let kb = KnowledgeBase::open("p1", dir.path()).unwrap();
        assert!(kb.content_history().is_empty());
    }

    #[test]
    fn test_improvements_clusters_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let mut kb = KnowledgeBase::open("p2", dir.path()).unwrap();
        kb.add_improvement_suggestion("https://x.ir/a", &kws(&["k"]), json!({}), json!({}));
        kb.add_improvement_suggestion("https://x.ir/a", &kws(&["k2"]), json!({}), json!({}));
        kb.save_keyword_cluster(json!({"main_topic": "t", "keywords": ["k", "z"]}));
        kb.add_generated_content("one", &kws(&["a"]), "guide", 10, None);
        kb.add_generated_content("two", &kws(&["b"]), "guide", 5, None);
        kb.record_analysis();

        let stats = kb.statistics();
        assert_eq!(stats.total_improvements_tracked, 1);
        assert_eq!(stats.total_keyword_clusters, 1);
        assert_eq!(stats.unique_keywords, 4);
        assert_eq!(stats.total_predicted_impressions, 15);
        assert_eq!(stats.metadata.total_improvements_suggested, 2);
        assert_eq!(stats.metadata.total_analyses, 1);

        let recent = kb.content_suggestions_history(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "two");

        let report = kb.export_report(None);
        assert!(report.exists());
        let saved: Value =
            serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
        assert_eq!(saved["statistics"]["project_name"], "p2");
        assert!(saved["keyword_clusters"][0]["cluster_hash"].is_string());
    }
}
