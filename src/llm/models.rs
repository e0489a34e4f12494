//! Named AI models from the `ai_models:` config table.
//!
//! The manager checks each model once, remembers why a check failed, and
//! offers the connected ones for interactive selection.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{Prompter, RULE};
use crate::core::config::{resolve_secret, AiSection, AppConfig, ModelEntry};
use crate::llm::provider::{ChatRequest, HttpLlmClient, LlmClient, LlmSettings, Provider};

/// Outcome of the last connection check of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStatus {
    pub connected: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AiModel {
    pub name: String,
    pub entry: ModelEntry,
    pub is_default: bool,
    pub status: Option<ModelStatus>,
}

impl AiModel {
    pub fn provider(&self) -> &str {
        self.entry.provider.as_deref().unwrap_or("")
    }

    pub fn is_connected(&self) -> bool {
        self.status.as_ref().map(|s| s.connected).unwrap_or(false)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.error.as_deref())
    }

    /// Settings for this model, or the reason it cannot be used.
    pub fn settings(&self, ai: &AiSection) -> std::result::Result<LlmSettings, String> {
        let provider_name = self.provider();
        let provider = Provider::parse(provider_name)
            .map_err(|_| format!("Unknown provider: {}", provider_name))?;
        if resolve_secret(self.entry.api_key.as_deref()).is_none() {
            return Err("API key not configured".to_string());
        }
        if provider == Provider::OpenAiCompatible
            && self
                .entry
                .base_url
                .as_deref()
                .map(|u| u.trim().is_empty())
                .unwrap_or(true)
        {
            return Err("Base URL not configured".to_string());
        }
        let mut settings = LlmSettings::from_model_entry(&self.entry, ai).map_err(|e| e.to_string())?;
        // Probes fail fast; real calls keep the configured retry budget.
        settings.max_retries = 1;
        settings.qps = 0.0;
        Ok(settings)
    }
}

pub struct ModelManager {
    ai: AiSection,
    models: BTreeMap<String, AiModel>,
    default: Option<String>,
}

impl ModelManager {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let default = cfg
            .ai_models
            .default
            .clone()
            .filter(|d| cfg.ai_models.models.contains_key(d));
        let models: BTreeMap<String, AiModel> = cfg
            .ai_models
            .models
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    AiModel {
                        name: name.clone(),
                        entry: entry.clone(),
                        is_default: default.as_deref() == Some(name.as_str()),
                        status: None,
                    },
                )
            })
            .collect();
        info!("✅ Loaded {} AI model(s)", models.len());
        if let Some(d) = &default {
            info!("   Default model: {}", d);
        }
        Self {
            ai: cfg.ai.clone(),
            models,
            default,
        }
    }

    pub fn models(&self) -> impl Iterator<Item = &AiModel> {
        self.models.values()
    }

    pub fn get(&self, name: &str) -> Option<&AiModel> {
        self.models.get(name)
    }

    pub fn default_model(&self) -> Option<&AiModel> {
        self.default.as_deref().and_then(|d| self.models.get(d))
    }

    pub fn connected_models(&self) -> Vec<&AiModel> {
        self.models.values().filter(|m| m.is_connected()).collect()
    }

    async fn probe(&self, model: &AiModel) -> ModelStatus {
        let settings = match model.settings(&self.ai) {
            Ok(s) => s,
            Err(msg) => {
                return ModelStatus {
                    connected: false,
                    error: Some(msg),
                }
            }
        };
        let client = match HttpLlmClient::new(settings) {
            Ok(c) => c,
            Err(e) => {
                return ModelStatus {
                    connected: false,
                    error: Some(e.to_string()),
                }
            }
        };
        match client.complete(&ChatRequest::new("test").max_tokens(5)).await {
            Ok(_) => ModelStatus {
                connected: true,
                error: None,
            },
            Err(e) => ModelStatus {
                connected: false,
                error: Some(e.to_string().chars().take(200).collect()),
            },
        }
    }

    /// Check every model and print one status line each.
    pub async fn test_all_connections(&mut self) -> BTreeMap<String, bool> {
        println!("\n🔌 Testing AI model connections...");
        println!("{}", "-".repeat(70));

        let names: Vec<String> = self.models.keys().cloned().collect();
        let mut results = BTreeMap::new();
        for name in names {
            let Some(model) = self.models.get(&name) else {
                continue;
            };
            print!("   Testing {} ({})... ", name, model.provider());
            let status = self.probe(model).await;
            if status.connected {
                println!("✅ Connected");
                if model.is_default {
                    println!("      (Default model)");
                }
            } else {
                let msg = status.error.as_deref().unwrap_or("unknown error");
                println!("❌ Failed: {}", msg);
                warn!("Model {} unavailable: {}", name, msg);
            }
            results.insert(name.clone(), status.connected);
            if let Some(m) = self.models.get_mut(&name) {
                m.status = Some(status);
            }
        }

        println!("{}", "-".repeat(70));
        let connected = results.values().filter(|c| **c).count();
        println!(
            "\n✅ {}/{} model(s) connected successfully\n",
            connected,
            self.models.len()
        );
        results
    }

    /// A ready client for a named model, with the configured retry budget.
    pub fn client_for(&self, name: &str) -> Result<Arc<dyn LlmClient>> {
        let model = self
            .models
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown model: {}", name))?;
        model.settings(&self.ai).map_err(|e| anyhow::anyhow!("{}: {}", name, e))?;
        let settings = LlmSettings::from_model_entry(&model.entry, &self.ai)?;
        Ok(Arc::new(HttpLlmClient::new(settings)?))
    }

    /// Ask which connected model to use. `0` picks the default.
    pub fn select_model_interactive(
        &self,
        prompter: &dyn Prompter,
        purpose: &str,
    ) -> Result<Option<String>> {
        let connected = self.connected_models();
        if connected.is_empty() {
            println!("\n❌ No connected models available!");
            return Ok(None);
        }

        println!("\n{}", RULE);
        if purpose.is_empty() {
            println!("🤖 Select AI Model");
        } else {
            println!("🤖 Select AI Model for: {}", purpose);
        }
        println!("{}\n", RULE);
        for (idx, m) in connected.iter().enumerate() {
            let marker = if m.is_default { " ⭐ (default)" } else { "" };
            println!("  [{}] {} ({}){}", idx + 1, m.name, m.provider(), marker);
        }
        let default_connected = self.default_model().filter(|m| m.is_connected());
        if let Some(d) = default_connected {
            println!("\n  [0] Use default model ({})", d.name);
        }
        println!("\n{}", "-".repeat(70));

        let fallback = if default_connected.is_some() { "0" } else { "1" };
        loop {
            let choice = prompter.input("Your selection", Some(fallback))?;
            match choice.trim().parse::<usize>() {
                Ok(0) if default_connected.is_some() => {
                    let name = default_connected.map(|d| d.name.clone());
                    if let Some(n) = &name {
                        println!("✅ Using default model: {}", n);
                    }
                    return Ok(name);
                }
                Ok(n) if (1..=connected.len()).contains(&n) => {
                    let picked = connected[n - 1].name.clone();
                    println!("✅ Selected: {}", picked);
                    return Ok(Some(picked));
                }
                Ok(_) => println!("❌ Invalid selection. Please enter 1-{}", connected.len()),
                Err(_) => println!("❌ Invalid input. Please enter a number."),
            }
        }
    }

    /// Whether the connected default should serve every row without asking.
    pub fn use_default_for_all(&self, prompter: &dyn Prompter) -> Result<bool> {
        let Some(d) = self.default_model().filter(|m| m.is_connected()) else {
            return Ok(false);
        };
        println!("\n{}", RULE);
        println!("🤖 AI Model Selection");
        println!("{}", RULE);
        println!("\nDefault model: {} ({})", d.name, d.provider());
        let yes = prompter.confirm("Use the default model for all operations?", true)?;
        if yes {
            println!("✅ Will use {} for all operations", d.name);
        } else {
            println!("✅ You'll be asked to select model for each operation");
        }
        Ok(yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ScriptedPrompter;

    fn manager(yaml: &str) -> ModelManager {
        ModelManager::from_config(&AppConfig::from_yaml_str(yaml).unwrap())
    }

    #[test]
    fn test_precheck_messages() {
        let m = manager(
            r#"
ai_models:
  default: a
  a:
    provider: openai
    api_key: env:SEO_SCOUT_TEST_NEVER_SET_1
  b:
    provider: openai_compatible
    api_key: sk-1
  c:
    provider: cohere
    api_key: sk-1
"#,
        );
        let ai = AiSection::default();
        assert_eq!(
            m.get("a").unwrap().settings(&ai).unwrap_err(),
            "API key not configured"
        );
        assert_eq!(
            m.get("b").unwrap().settings(&ai).unwrap_err(),
            "Base URL not configured"
        );
        assert_eq!(
            m.get("c").unwrap().settings(&ai).unwrap_err(),
            "Unknown provider: cohere"
        );
        assert_eq!(m.default_model().unwrap().name, "a");
    }

    #[test]
    fn test_unknown_default_is_ignored() {
        let m = manager("ai_models:\n  default: missing\n  x:\n    provider: groq\n");
        assert!(m.default_model().is_none());
    }

    #[test]
    fn test_selection_uses_connected_models_only() {
        let mut m = manager(
            "ai_models:\n  default: b\n  a:\n    provider: groq\n  b:\n    provider: openai\n  c:\n    provider: gemini\n",
        );
        for (name, ok) in [("a", true), ("b", true), ("c", false)] {
            m.models.get_mut(name).unwrap().status = Some(ModelStatus {
                connected: ok,
                error: None,
            });
        }
        assert_eq!(m.connected_models().len(), 2);

        let p = ScriptedPrompter::new(["7", "x", "1"]);
        assert_eq!(m.select_model_interactive(&p, "test").unwrap().as_deref(), Some("a"));

        let p = ScriptedPrompter::new(Vec::<String>::new());
        assert_eq!(m.select_model_interactive(&p, "").unwrap().as_deref(), Some("b"));

        let p = ScriptedPrompter::new(["n"]);
        assert!(!m.use_default_for_all(&p).unwrap());
    }
}
