//! Chat-completion calls to the supported AI providers over plain HTTP.
//!
//! One [`HttpLlmClient`] speaks one provider's wire format. Requests are
//! throttled to the configured QPS and retried with exponential backoff
//! (`retry_base_delay · 2^attempt`).

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::core::config::{resolve_secret, AiSection, ModelEntry};
use crate::core::error::{SeoError, SeoResult};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Azure,
    Anthropic,
    OpenAiCompatible,
    Groq,
    Gemini,
}

impl Provider {
    pub fn parse(name: &str) -> SeoResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "azure" | "azure_openai" => Ok(Provider::Azure),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai_compatible" | "compatible" => Ok(Provider::OpenAiCompatible),
            "groq" => Ok(Provider::Groq),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(SeoError::UnsupportedProvider(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Azure => "azure",
            Provider::Anthropic => "anthropic",
            Provider::OpenAiCompatible => "openai_compatible",
            Provider::Groq => "groq",
            Provider::Gemini => "gemini",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi | Provider::OpenAiCompatible | Provider::Azure => {
                "https://api.openai.com/v1"
            }
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3-haiku-20240307",
            Provider::Gemini => "gemini-pro",
            Provider::Groq => "llama3-8b-8192",
            _ => "gpt-4o-mini",
        }
    }

    /// Providers that accept `response_format: {"type": "json_object"}`.
    fn supports_json_mode(&self) -> bool {
        matches!(self, Provider::OpenAi | Provider::OpenAiCompatible)
    }
}

/// Everything needed to talk to one model.
#[derive(Clone)]
pub struct LlmSettings {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_api_version: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay: f64,
    pub qps: f64,
    pub response_json: bool,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key_set", &self.api_key.is_some())
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl LlmSettings {
    /// Settings of the `ai:` section (content optimization workflow).
    pub fn from_ai_section(ai: &AiSection) -> SeoResult<Self> {
        Ok(Self {
            provider: Provider::parse(&ai.resolve_provider())?,
            model: ai.resolve_model(),
            api_key: ai.resolve_api_key(),
            base_url: ai.resolve_base_url(),
            azure_endpoint: ai.azure_endpoint.clone(),
            azure_api_version: ai.azure_api_version.clone(),
            temperature: ai.resolve_temperature(),
            timeout_secs: ai.resolve_timeout_secs(),
            max_retries: ai.resolve_max_retries(),
            retry_base_delay: ai.resolve_retry_base_delay(),
            qps: ai.resolve_qps(),
            response_json: ai.resolve_response_json(),
        })
    }

    /// Settings of a named `ai_models:` entry; tuning knobs come from `ai:`.
    pub fn from_model_entry(entry: &ModelEntry, ai: &AiSection) -> SeoResult<Self> {
        let provider = Provider::parse(entry.provider.as_deref().unwrap_or(""))?;
        let model = entry
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string());
        Ok(Self {
            provider,
            model,
            api_key: resolve_secret(entry.api_key.as_deref()),
            base_url: entry.base_url.clone().filter(|u| !u.trim().is_empty()),
            azure_endpoint: entry.azure_endpoint.clone(),
            azure_api_version: entry.azure_api_version.clone(),
            temperature: ai.resolve_temperature(),
            timeout_secs: ai.resolve_timeout_secs(),
            max_retries: ai.resolve_max_retries(),
            retry_base_delay: ai.resolve_retry_base_delay(),
            qps: ai.resolve_qps(),
            response_json: ai.resolve_response_json(),
        })
    }

    fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

/// One prompt to send.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Overrides the configured temperature.
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask for a JSON object where the provider supports it.
    pub json: bool,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the request (with retries) and return the reply text.
    async fn complete(&self, req: &ChatRequest) -> SeoResult<String>;

    fn model_name(&self) -> &str;
}

pub struct HttpLlmClient {
    http: reqwest::Client,
    settings: LlmSettings,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl HttpLlmClient {
    pub fn new(settings: LlmSettings) -> SeoResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;
        info!(
            "🤖 AI client ready: {} / {}",
            settings.provider.as_str(),
            settings.model
        );
        Ok(Self {
            http,
            settings,
            last_request: tokio::sync::Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// Keep at least `1/qps` seconds between requests.
    async fn throttle(&self) {
        if self.settings.qps <= 0.0 {
            return;
        }
        let min_interval = Duration::from_secs_f64(1.0 / self.settings.qps);
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn key(&self) -> &str {
        self.settings.api_key.as_deref().unwrap_or("").trim()
    }

    fn openai_body(&self, req: &ChatRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": req.prompt}));

        let mut body = json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": req.temperature.unwrap_or(self.settings.temperature),
        });
        if let Some(n) = req.max_tokens {
            body["max_tokens"] = json!(n);
        }
        if req.json && self.settings.response_json && self.settings.provider.supports_json_mode() {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    fn request_for(&self, req: &ChatRequest) -> SeoResult<reqwest::RequestBuilder> {
        let s = &self.settings;
        let builder = match s.provider {
            Provider::OpenAi | Provider::OpenAiCompatible | Provider::Groq => {
                let url = format!("{}/chat/completions", s.base_url());
                let b = self.http.post(url).json(&self.openai_body(req));
                // Key-less local endpoints work without the header.
                if self.key().is_empty() {
                    b
                } else {
                    b.bearer_auth(self.key())
                }
            }
            Provider::Azure => {
                let endpoint = s
                    .azure_endpoint
                    .clone()
                    .or_else(|| s.base_url.clone())
                    .ok_or_else(|| SeoError::Config("azure_endpoint is not configured".into()))?;
                let mut url = url::Url::parse(&format!(
                    "{}/openai/deployments/{}/chat/completions",
                    endpoint.trim_end_matches('/'),
                    s.model
                ))
                .map_err(|e| SeoError::InvalidUrl(e.to_string()))?;
                url.query_pairs_mut().append_pair(
                    "api-version",
                    s.azure_api_version.as_deref().unwrap_or("2024-02-01"),
                );
                self.http
                    .post(url)
                    .header("api-key", self.key())
                    .json(&self.openai_body(req))
            }
            Provider::Anthropic => {
                let mut body = json!({
                    "model": s.model,
                    "max_tokens": req.max_tokens.unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS),
                    "temperature": req.temperature.unwrap_or(s.temperature),
                    "messages": [{"role": "user", "content": req.prompt}],
                });
                if let Some(system) = &req.system {
                    body["system"] = json!(system);
                }
                self.http
                    .post(format!("{}/messages", s.base_url()))
                    .header("x-api-key", self.key())
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            }
            Provider::Gemini => {
                let mut url = url::Url::parse(&format!(
                    "{}/models/{}:generateContent",
                    s.base_url(),
                    s.model
                ))
                .map_err(|e| SeoError::InvalidUrl(e.to_string()))?;
                url.query_pairs_mut().append_pair("key", self.key());

                let mut generation = json!({
                    "temperature": req.temperature.unwrap_or(s.temperature),
                });
                if let Some(n) = req.max_tokens {
                    generation["maxOutputTokens"] = json!(n);
                }
                if req.json && s.response_json {
                    generation["responseMimeType"] = json!("application/json");
                }
                let mut body = json!({
                    "contents": [{"role": "user", "parts": [{"text": req.prompt}]}],
                    "generationConfig": generation,
                });
                if let Some(system) = &req.system {
                    body["systemInstruction"] = json!({"parts": [{"text": system}]});
                }
                self.http.post(url).json(&body)
            }
        };
        Ok(builder)
    }

    /// Pull the reply text out of a provider response body.
    fn extract_text(&self, value: &Value) -> Option<String> {
        let text = match self.settings.provider {
            Provider::Anthropic => value
                .get("content")
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
                .and_then(|c| c.get("text"))
                .and_then(|t| t.as_str()),
            Provider::Gemini => value
                .get("candidates")
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
                .and_then(|c| c.get("content"))
                .and_then(|c| c.get("parts"))
                .and_then(|p| p.as_array())
                .and_then(|arr| arr.first())
                .and_then(|p| p.get("text"))
                .and_then(|t| t.as_str()),
            _ => value
                .get("choices")
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_str()),
        };
        text.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

    async fn send_once(&self, req: &ChatRequest) -> SeoResult<String> {
        let response = self.request_for(req)?.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SeoError::Ai(format!(
                "{} request failed: status={} body={}",
                self.settings.provider.as_str(),
                status,
                text.chars().take(300).collect::<String>()
            )));
        }
        let value: Value = response.json().await?;
        self.extract_text(&value)
            .ok_or_else(|| SeoError::Ai("empty response from model".into()))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, req: &ChatRequest) -> SeoResult<String> {
        let max_retries = self.settings.max_retries.max(1);
        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_secs_f64(self.settings.retry_base_delay))
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(3600))
            .with_max_elapsed_time(None)
            .build();

        let this = self;
        let attempts = &attempts;
        retry(policy, move || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            this.throttle().await;
            debug!("AI request attempt {}/{}", n, max_retries);
            match this.send_once(req).await {
                Ok(text) => Ok(text),
                Err(e) if n >= max_retries => {
                    warn!("All {} AI attempts failed: {}", max_retries, e);
                    Err(backoff::Error::permanent(e))
                }
                Err(e) => {
                    warn!("AI call attempt {} failed: {}", n, e);
                    Err(backoff::Error::transient(e))
                }
            }
        })
        .await
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: Provider) -> LlmSettings {
        LlmSettings {
            provider,
            model: "m".into(),
            api_key: Some("k".into()),
            base_url: None,
            azure_endpoint: None,
            azure_api_version: None,
            temperature: 0.0,
            timeout_secs: 5,
            max_retries: 1,
            retry_base_delay: 0.0,
            qps: 0.0,
            response_json: true,
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("OpenAI").unwrap(), Provider::OpenAi);
        assert_eq!(Provider::parse("claude").unwrap(), Provider::Anthropic);
        assert!(matches!(
            Provider::parse("cohere"),
            Err(SeoError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_json_mode_only_for_openai_style() {
        let req = ChatRequest::new("hi").system("sys").json();
        let openai = HttpLlmClient::new(settings(Provider::OpenAi)).unwrap();
        let body = openai.openai_body(&req);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");

        let groq = HttpLlmClient::new(settings(Provider::Groq)).unwrap();
        assert!(groq.openai_body(&req).get("response_format").is_none());
    }

    #[test]
    fn test_extract_text_per_provider() {
        let anthropic = HttpLlmClient::new(settings(Provider::Anthropic)).unwrap();
        let v = json!({"content": [{"type": "text", "text": " hi "}]});
        assert_eq!(anthropic.extract_text(&v).as_deref(), Some("hi"));

        let gemini = HttpLlmClient::new(settings(Provider::Gemini)).unwrap();
        let v = json!({"candidates": [{"content": {"parts": [{"text": "ok"}]}}]});
        assert_eq!(gemini.extract_text(&v).as_deref(), Some("ok"));

        let openai = HttpLlmClient::new(settings(Provider::OpenAi)).unwrap();
        let v = json!({"choices": [{"message": {"content": ""}}]});
        assert!(openai.extract_text(&v).is_none());
    }

    #[test]
    fn test_model_entry_defaults() {
        let entry = ModelEntry {
            provider: Some("groq".into()),
            api_key: Some("env:SEO_SCOUT_TEST_UNSET_GROQ_KEY".into()),
            ..Default::default()
        };
        let s = LlmSettings::from_model_entry(&entry, &AiSection::default()).unwrap();
        assert_eq!(s.model, "llama3-8b-8192");
        assert!(s.api_key.is_none());
        assert_eq!(s.base_url(), "https://api.groq.com/openai/v1");
    }
}
