//! Interactive workflows behind each `--mode`.

pub mod content;
pub mod generate;
pub mod models;
pub mod scraping;
pub mod synonyms;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{info, warn};

use crate::cli::{print_banner, Prompter, RULE};
use crate::core::AppState;
use crate::llm::models::ModelManager;
use crate::llm::{HttpLlmClient, LlmClient, LlmSettings};

pub const MIN_PROJECT_NAME_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Search Console analysis: improvements and new content ideas.
    Content,
    /// SEO tag collection from a sitemap, resumable.
    Scraping,
    /// Spelling and synonym variants for a keyword list.
    Synonyms,
    /// Full articles from a new-content plan.
    Generate,
    /// Test every configured AI model.
    Models,
}

impl Mode {
    const ALL: [Mode; 5] = [
        Mode::Content,
        Mode::Scraping,
        Mode::Synonyms,
        Mode::Generate,
        Mode::Models,
    ];

    fn menu_entry(&self) -> (&'static str, &'static str) {
        match self {
            Mode::Content => (
                "Content Optimization",
                "Analyze Search Console data for content improvements",
            ),
            Mode::Scraping => (
                "SEO Data Collection",
                "Scrape page titles and meta tags from sitemap",
            ),
            Mode::Synonyms => ("Synonym Finder", "Spelling variants and synonyms for keywords"),
            Mode::Generate => ("Content Generation", "Write articles from a new-content plan"),
            Mode::Models => ("Model Check", "Test connections of all configured AI models"),
        }
    }
}

/// Show the mode menu until a valid choice is made. An empty answer picks
/// content optimization.
pub fn select_mode_interactive(prompter: &dyn Prompter) -> Result<Mode> {
    print_banner();
    println!("Please select operational mode:\n");
    for (idx, mode) in Mode::ALL.iter().enumerate() {
        let (title, detail) = mode.menu_entry();
        println!("  [{}] {}", idx + 1, title);
        println!("      {}\n", detail);
    }
    println!("{}", "-".repeat(70));

    loop {
        let choice = prompter.input(
            &format!("Your selection (1-{})", Mode::ALL.len()),
            Some("1"),
        )?;
        match choice.trim().parse::<usize>() {
            Ok(n) if (1..=Mode::ALL.len()).contains(&n) => return Ok(Mode::ALL[n - 1]),
            _ => println!("❌ Invalid choice. Please enter 1-{}.", Mode::ALL.len()),
        }
    }
}

/// Ask for a knowledge-base project name of at least three characters.
pub fn ask_project_name(prompter: &dyn Prompter) -> Result<String> {
    println!("\n{}", RULE);
    println!("📋 PROJECT IDENTIFICATION");
    println!("{}", RULE);
    println!("\nEnter a name for this project (e.g., website domain or brand name)");
    println!("This will be used to track content history and avoid duplicates.");
    println!("{}", "-".repeat(70));

    let mut empty_answers = 0;
    loop {
        let name = prompter.input("Project name", None)?;
        let name = name.trim();
        if name.is_empty() {
            empty_answers += 1;
            if empty_answers >= 3 {
                anyhow::bail!("no project name given");
            }
            println!("❌ Project name cannot be empty. Please try again.");
            continue;
        }
        if name.chars().count() < MIN_PROJECT_NAME_CHARS {
            println!(
                "❌ Project name must be at least {} characters.",
                MIN_PROJECT_NAME_CHARS
            );
            continue;
        }
        println!("\n✅ Project name: {}", name);
        if prompter.confirm("   Is this correct?", true)? {
            return Ok(name.to_string());
        }
        println!("\n   Let's try again...");
    }
}

/// The configured project, or one asked for now (and remembered).
pub fn project_name(state: &mut AppState) -> Result<String> {
    if let Some(name) = &state.project_name {
        return Ok(name.clone());
    }
    let name = ask_project_name(state.prompter())?;
    state.project_name = Some(name.clone());
    Ok(name)
}

/// The configured sitemap URL when set.
pub fn configured_sitemap_url(state: &AppState) -> Option<String> {
    state
        .config
        .app
        .sitemap_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// Client from the `ai:` section.
pub fn default_client(state: &AppState) -> Result<Arc<dyn LlmClient>> {
    let settings =
        LlmSettings::from_ai_section(&state.config.ai).context("invalid `ai` configuration")?;
    info!("🤖 Using {} ({})", settings.model, settings.provider.as_str());
    Ok(Arc::new(HttpLlmClient::new(settings)?))
}

/// Pick a client for `purpose`: one of the tested `ai_models`, or the `ai:`
/// section when none are configured. `None` when no model is usable.
pub async fn choose_client(
    state: &AppState,
    manager: &mut ModelManager,
    purpose: &str,
) -> Result<Option<Arc<dyn LlmClient>>> {
    if manager.models().next().is_none() {
        warn!("No ai_models configured, using the `ai` section");
        return default_client(state).map(Some);
    }
    if manager.connected_models().is_empty() {
        manager.test_all_connections().await;
    }
    match manager.select_model_interactive(state.prompter(), purpose)? {
        Some(name) => Ok(Some(manager.client_for(&name)?)),
        None => Ok(None),
    }
}

pub async fn run(mode: Mode, state: &mut AppState) -> Result<()> {
    info!("Running mode {:?} (test mode: {})", mode, state.test_mode);
    match mode {
        Mode::Content => content::run(state).await,
        Mode::Scraping => scraping::run(state).await,
        Mode::Synonyms => synonyms::run(state).await,
        Mode::Generate => generate::run(state).await,
        Mode::Models => models::run(state).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ScriptedPrompter;

    #[test]
    fn test_select_mode() {
        let p = ScriptedPrompter::new(["9", "x", "4"]);
        assert_eq!(select_mode_interactive(&p).unwrap(), Mode::Generate);
        let p = ScriptedPrompter::default();
        assert_eq!(select_mode_interactive(&p).unwrap(), Mode::Content);
    }

    #[test]
    fn test_ask_project_name() {
        let p = ScriptedPrompter::new(["ab", "shop.ir", "n", "blog-project", "y"]);
        assert_eq!(ask_project_name(&p).unwrap(), "blog-project");
        let p = ScriptedPrompter::default();
        assert!(ask_project_name(&p).is_err());
    }
}
