//! Connection check of every configured AI model.

use anyhow::Result;

use crate::cli::{print_banner, print_section};
use crate::core::AppState;
use crate::llm::models::ModelManager;

pub async fn run(state: &mut AppState) -> Result<()> {
    print_banner();
    println!("🔌 MODE: AI Model Check");
    let mut manager = ModelManager::from_config(&state.config);
    if manager.models().next().is_none() {
        println!("\n⚠️  No models configured under ai_models in config.yaml");
        return Ok(());
    }

    let results = manager.test_all_connections().await;

    print_section("Model Status", None);
    println!("  {:<20} {:<20} {:<10} {}", "Name", "Provider", "Status", "Details");
    println!("  {}", "-".repeat(66));
    for model in manager.models() {
        let status = if model.is_connected() { "✅ OK" } else { "❌ FAIL" };
        let mut name = model.name.clone();
        if model.is_default {
            name.push_str(" ⭐");
        }
        println!(
            "  {:<20} {:<20} {:<10} {}",
            name,
            model.provider(),
            status,
            model.error_message().unwrap_or("")
        );
    }
    let connected = results.values().filter(|ok| **ok).count();
    println!("\n📊 {}/{} model(s) connected", connected, results.len());
    Ok(())
}
