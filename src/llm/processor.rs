//! AI-assisted keyword clustering and improvement suggestions.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::core::error::{SeoError, SeoResult};
use crate::core::types::AiCluster;
use crate::llm::prompts;
use crate::llm::provider::{ChatRequest, LlmClient};

pub const DEFAULT_MAIN_TOPIC: &str = "موضوع کلی";
pub const DEFAULT_CONTENT_TYPE: &str = "راهنما";
pub const DEFAULT_SEARCH_INTENT: &str = "اطلاعاتی";
pub const DEFAULT_WORD_COUNT: u32 = 1500;
pub const DEFAULT_TARGET_AUDIENCE: &str = "مخاطبان ایرانی";
pub const DEFAULT_CONTENT_FOCUS: &str = "تمرکز بر نیازهای کاربران فارسی‌زبان";

/// Fill the fields an AI (or local) cluster left empty.
pub fn apply_cluster_defaults(cluster: &mut AiCluster) {
    fn fill(field: &mut String, default: &str) {
        if field.trim().is_empty() {
            *field = default.to_string();
        }
    }
    fill(&mut cluster.main_topic, DEFAULT_MAIN_TOPIC);
    fill(&mut cluster.content_type, DEFAULT_CONTENT_TYPE);
    fill(&mut cluster.search_intent, DEFAULT_SEARCH_INTENT);
    fill(&mut cluster.target_audience, DEFAULT_TARGET_AUDIENCE);
    fill(&mut cluster.content_focus, DEFAULT_CONTENT_FOCUS);
    if cluster.recommended_word_count == 0 {
        cluster.recommended_word_count = DEFAULT_WORD_COUNT;
    }
    if cluster.suggested_title.trim().is_empty() {
        cluster.suggested_title = cluster.article_title.clone();
    }
}

/// Body of a ```` ```json ```` fenced block, or the trimmed text itself.
pub fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.find("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}

/// Parse a model reply as a JSON object.
pub fn parse_json_reply(text: &str) -> SeoResult<Value> {
    let body = strip_json_fence(text);
    serde_json::from_str::<Value>(body).map_err(|e| {
        SeoError::AiResponseNotJson(format!(
            "{} (response starts with: {})",
            e,
            body.chars().take(500).collect::<String>()
        ))
    })
}

fn str_field(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn str_list(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(|x| x.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|x| x.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn word_count_field(v: &Value) -> u32 {
    match v.get("recommended_word_count") {
        Some(Value::Number(n)) => n.as_f64().map(|f| f.max(0.0) as u32).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Read `{"clusters": [...]}` into clusters, dropping those without keywords.
pub fn clusters_from_reply(value: &Value) -> Vec<AiCluster> {
    let Some(raw) = value.get("clusters").and_then(|c| c.as_array()) else {
        return Vec::new();
    };
    let mut clusters = Vec::with_capacity(raw.len());
    for item in raw {
        let mut cluster = AiCluster {
            main_topic: str_field(item, "main_topic"),
            keywords: str_list(item, "keywords"),
            article_title: str_field(item, "article_title"),
            suggested_title: String::new(),
            meta_description: str_field(item, "meta_description"),
            h2_headings: str_list(item, "h2_headings"),
            content_type: str_field(item, "content_type"),
            search_intent: str_field(item, "search_intent"),
            recommended_word_count: word_count_field(item),
            target_audience: str_field(item, "target_audience"),
            content_focus: str_field(item, "content_focus"),
        };
        apply_cluster_defaults(&mut cluster);
        if cluster.keywords.is_empty() {
            warn!("Skipping cluster with no keywords: {}", cluster.main_topic);
            continue;
        }
        clusters.push(cluster);
    }
    clusters
}

/// Suggestions used when the model's reply is not JSON.
pub fn fallback_improvements(keywords: &[String]) -> Value {
    let recommended: Vec<&String> = keywords.iter().take(5).collect();
    json!({
        "primary_improvements": ["Optimize content for target keywords"],
        "content_gaps": ["Analysis unavailable"],
        "recommended_keywords": recommended,
        "technical_suggestions": ["Review content structure"],
        "priority_level": "medium",
    })
}

pub struct AiProcessor {
    client: Arc<dyn LlmClient>,
}

impl AiProcessor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.client
    }

    /// Group keywords into article-sized clusters.
    ///
    /// Transport and parse failures are logged; the caller falls back to
    /// local clustering on an empty result.
    pub async fn cluster_keywords(&self, keywords: &[String]) -> Vec<AiCluster> {
        info!("🧠 Clustering {} keywords using AI...", keywords.len());
        if keywords.is_empty() {
            return Vec::new();
        }
        let req = ChatRequest::new(prompts::cluster_prompt(keywords))
            .system(prompts::CLUSTER_SYSTEM)
            .json();

        let reply = match self.client.complete(&req).await {
            Ok(r) => r,
            Err(e) => {
                error!("Error clustering keywords: {}", e);
                return Vec::new();
            }
        };
        match parse_json_reply(&reply) {
            Ok(value) => {
                let clusters = clusters_from_reply(&value);
                info!("Created {} valid keyword clusters", clusters.len());
                clusters
            }
            Err(e) => {
                error!("Failed to parse clustering response: {}", e);
                Vec::new()
            }
        }
    }

    /// Improvement suggestions for one existing URL.
    ///
    /// A non-JSON reply yields [`fallback_improvements`]; transport errors
    /// propagate.
    pub async fn generate_content_improvements(
        &self,
        url: &str,
        keywords: &[String],
        position: f64,
        impressions: u64,
    ) -> SeoResult<Value> {
        info!("Generating improvement suggestions for {}", url);
        let req = ChatRequest::new(prompts::improvement_prompt(url, keywords, position, impressions))
            .system(prompts::IMPROVEMENT_SYSTEM)
            .json();
        let reply = self.client.complete(&req).await?;
        match parse_json_reply(&reply) {
            Ok(value) if value.is_object() => Ok(value),
            Ok(_) | Err(_) => {
                error!("Failed to parse improvement response as JSON for {}", url);
                Ok(fallback_improvements(keywords))
            }
        }
    }

    /// True when the provider answers a tiny JSON-mode prompt.
    pub async fn test_connection(&self) -> bool {
        info!("Testing AI connection ({})...", self.client.model_name());
        let req = ChatRequest::new(prompts::CONNECTION_TEST_PROMPT).json();
        match self.client.complete(&req).await {
            Ok(reply) if !reply.trim().is_empty() => {
                info!("✅ Connection test successful");
                true
            }
            Ok(_) => {
                error!("Connection test failed: empty response");
                false
            }
            Err(e) => {
                error!("Connection test failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedClient {
        reply: SeoResult<String>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl CannedClient {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(SeoError::Ai("boom".into())),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, req: &ChatRequest) -> SeoResult<String> {
            self.seen.lock().unwrap().push(req.clone());
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(SeoError::Ai(e.to_string())),
            }
        }
        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_json_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_json_fence("  {\"b\":2} "), "{\"b\":2}");
    }

    #[test]
    fn test_clusters_from_reply_applies_defaults_and_drops_empty() {
        let v = json!({"clusters": [
            {"keywords": ["a", "b"], "article_title": "T", "recommended_word_count": "900"},
            {"main_topic": "empty", "keywords": []}
        ]});
        let clusters = clusters_from_reply(&v);
        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.main_topic, DEFAULT_MAIN_TOPIC);
        assert_eq!(c.suggested_title, "T");
        assert_eq!(c.recommended_word_count, 900);
        assert_eq!(c.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_cluster_keywords_failure_is_empty() {
        let p = AiProcessor::new(CannedClient::failing());
        assert!(p.cluster_keywords(&["x".to_string()]).await.is_empty());

        let p = AiProcessor::new(CannedClient::ok("not json at all"));
        assert!(p.cluster_keywords(&["x".to_string()]).await.is_empty());
    }

    #[tokio::test]
    async fn test_cluster_keywords_parses_fenced_reply() {
        let client = CannedClient::ok(
            "```json\n{\"clusters\":[{\"main_topic\":\"قیمت\",\"keywords\":[\"قیمت گوشی\"],\"h2_headings\":[\"a\",\"b\"]}]}\n```",
        );
        let p = AiProcessor::new(client.clone());
        let clusters = p.cluster_keywords(&["قیمت گوشی".to_string()]).await;
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].main_topic, "قیمت");
        let seen = client.seen.lock().unwrap();
        assert!(seen[0].json);
        assert_eq!(seen[0].system.as_deref(), Some(prompts::CLUSTER_SYSTEM));
    }

    #[tokio::test]
    async fn test_improvements_fallback_on_bad_json() {
        let kws: Vec<String> = (1..=7).map(|i| format!("k{}", i)).collect();
        let p = AiProcessor::new(CannedClient::ok("sorry, I cannot"));
        let v = p
            .generate_content_improvements("https://x.ir/a", &kws, 12.0, 100)
            .await
            .unwrap();
        assert_eq!(v["priority_level"], "medium");
        assert_eq!(v["recommended_keywords"].as_array().unwrap().len(), 5);

        let p = AiProcessor::new(CannedClient::failing());
        assert!(p
            .generate_content_improvements("https://x.ir/a", &kws, 12.0, 100)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_connection_check() {
        assert!(AiProcessor::new(CannedClient::ok("{\"status\":\"OK\"}")).test_connection().await);
        assert!(!AiProcessor::new(CannedClient::ok("  ")).test_connection().await);
        assert!(!AiProcessor::new(CannedClient::failing()).test_connection().await);
    }
}
