//! Synonym finder: keyword workbook in, `synonyms_{stem}.xlsx` out.

use anyhow::{Context, Result};
use tracing::error;

use crate::cli::{print_banner, print_section};
use crate::core::AppState;
use crate::features::FileSelector;
use crate::llm::models::ModelManager;
use crate::llm::synonyms::SynonymFinder;
use crate::workflows::choose_client;

pub async fn run(state: &mut AppState) -> Result<()> {
    print_banner();
    println!("🔤 MODE: Synonym Finder");
    let prompter = state.prompter();

    print_section("Select Keyword Files", Some("1/3"));
    let selector = FileSelector::new(state.input_dir())?;
    let files = selector.select_files(prompter)?;
    if files.is_empty() {
        println!("\n❌ No files selected. Exiting...");
        return Ok(());
    }

    print_section("AI Model", Some("2/3"));
    let mut manager = ModelManager::from_config(&state.config);
    let Some(client) = choose_client(state, &mut manager, "Synonym Finder").await? else {
        println!("\n❌ No usable AI model. Check the ai_models section of config.yaml.");
        return Ok(());
    };
    let finder = SynonymFinder::new(client);

    print_section("Finding Synonyms", Some("3/3"));
    let output_dir = state.output_dir();
    let mut written = Vec::new();
    for file in &files {
        match finder
            .process_excel_file(file, &output_dir)
            .await
            .with_context(|| format!("synonym run failed for {}", file.display()))
        {
            Ok(path) => {
                println!("   ✅ Created: {}", path.display());
                written.push(path);
            }
            Err(e) => {
                error!("{:#}", e);
                println!("   ❌ {}", e);
            }
        }
    }

    print_section("🎉 SYNONYMS COMPLETED!", None);
    println!("📊 {} of {} file(s) processed", written.len(), files.len());
    println!("📁 Output directory: {}", output_dir.display());
    Ok(())
}
