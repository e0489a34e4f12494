//! Article generation: new-content plan in, article workbook plus Word and
//! HTML documents out.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, warn};

use crate::cli::{print_banner, print_section, Prompter};
use crate::core::types::GeneratedArticle;
use crate::core::AppState;
use crate::export::documents::DocumentExporter;
use crate::export::excel;
use crate::features::{FileSelector, KnowledgeBase};
use crate::llm::content::{ask_word_allocation, read_article_plans, ArticlePlan, ContentGenerator};
use crate::llm::models::ModelManager;
use crate::llm::LlmClient;
use crate::nlp::InternalLinker;
use crate::scraping::SitemapManager;
use crate::workflows::{choose_client, configured_sitemap_url, project_name};

pub const TEST_MODE_ARTICLES: usize = 10;
/// Words of body text per inserted link.
pub const WORDS_PER_LINK: (usize, usize) = (300, 400);

pub async fn run(state: &mut AppState) -> Result<()> {
    print_banner();
    println!("✍️  MODE: Content Generation");
    let project = project_name(state)?;
    let mut kb = state
        .open_knowledge_base(&project)
        .context("failed to open knowledge base")?;
    let cfg = state.config.clone();
    let prompter = state.prompter();

    print_section("Select Content Plans", Some("1/4"));
    let selector = FileSelector::new(state.input_dir())?;
    let files = selector.select_files(prompter)?;
    if files.is_empty() {
        println!("\n❌ No files selected. Exiting...");
        return Ok(());
    }

    print_section("Internal Linking", Some("2/4"));
    let linker = if prompter.confirm("🔗 Add internal links from the site's sitemap?", false)? {
        let sitemaps = SitemapManager::new(cfg.app.resolve_sitemap_dir(), &cfg.scraping)?;
        let urls = sitemaps
            .download_and_parse(prompter, configured_sitemap_url(state).as_deref(), false)
            .await?;
        if urls.is_empty() {
            warn!("No sitemap URLs, internal linking disabled");
            None
        } else {
            Some(InternalLinker::new(&urls))
        }
    } else {
        None
    };

    print_section("AI Model", Some("3/4"));
    let mut manager = ModelManager::from_config(&cfg);
    manager.test_all_connections().await;
    let shared = if manager.use_default_for_all(prompter)? {
        manager
            .default_model()
            .map(|m| m.name.clone())
            .map(|name| manager.client_for(&name))
            .transpose()?
    } else {
        None
    };
    let extra = prompter.input("Extra instructions for the writer (optional)", Some(""))?;

    print_section("Generating Articles", Some("4/4"));
    let output_dir = state.output_dir();
    let exporter = DocumentExporter::new(output_dir.join("documents"))?;
    for file in &files {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "content".to_string());
        let mut plans = read_article_plans(file)
            .with_context(|| format!("failed to read plans from {}", file.display()))?;
        if state.test_mode {
            plans.truncate(TEST_MODE_ARTICLES);
            println!("🧪 TEST MODE: Limited to {} articles", plans.len());
        }
        println!("\n📄 {}: {} article plan(s)", stem, plans.len());

        let mut articles = Vec::with_capacity(plans.len());
        for (idx, plan) in plans.iter().enumerate() {
            println!("\n[{}/{}] {}", idx + 1, plans.len(), plan.topic);
            if !should_generate(prompter, &kb, plan, cfg.app.resolve_duplicate_threshold())? {
                continue;
            }
            let client = match &shared {
                Some(c) => Arc::clone(c),
                None => match choose_client(state, &mut manager, &plan.topic).await? {
                    Some(c) => c,
                    None => {
                        println!("❌ No usable AI model, stopping.");
                        break;
                    }
                },
            };
            let allocation = ask_word_allocation(prompter, &plan.headings)?;
            match write_article(client, &project, plan, &allocation, &extra, linker.as_ref()).await {
                Ok(article) => {
                    record_article(&mut kb, &article);
                    articles.push(article);
                }
                Err(e) => {
                    error!("Article generation failed for {}: {:#}", plan.topic, e);
                    println!("   ❌ Failed: {}", e);
                }
            }
        }

        if articles.is_empty() {
            println!("⚠️  No articles generated for {}", stem);
            continue;
        }
        let path = output_dir.join(format!("generated_{}.xlsx", stem));
        excel::write_generated_articles(&articles, &path)?;
        println!("✅ Created: {}", path.display());
        let summary = exporter.export_batch(&articles, &stem);
        info!(
            "Exported {} Word and {} HTML file(s) for {}",
            summary.word_files.len(),
            summary.html_files.len(),
            stem
        );
    }

    print_section("🎉 GENERATION COMPLETED!", None);
    println!("📁 Output directory: {}", output_dir.display());
    Ok(())
}

/// Skip topics the knowledge base already holds unless the user insists.
fn should_generate(
    prompter: &dyn Prompter,
    kb: &KnowledgeBase,
    plan: &ArticlePlan,
    threshold: f64,
) -> Result<bool> {
    if !kb.is_duplicate_content(&plan.topic, &plan.headings, threshold) {
        return Ok(true);
    }
    println!("⚠️  A similar article is already in the knowledge base.");
    prompter.confirm("   Generate anyway?", false)
}

/// Generate one article and run the optional linking pass over it.
pub async fn write_article(
    client: Arc<dyn LlmClient>,
    project: &str,
    plan: &ArticlePlan,
    allocation: &[u32],
    extra: &str,
    linker: Option<&InternalLinker>,
) -> Result<GeneratedArticle> {
    let generator = ContentGenerator::new(client, project);
    let mut article = generator.generate_article(plan, allocation, extra).await?;
    if let Some(linker) = linker {
        let (html, links) = linker.add_internal_links(&article.html, None, WORDS_PER_LINK);
        article.html = html;
        article.internal_links = links;
        println!("  🔗 Added {} internal link(s)", links);
    }
    Ok(article)
}

fn record_article(kb: &mut KnowledgeBase, article: &GeneratedArticle) {
    let hash = kb.add_generated_content(
        &article.topic,
        &article.headings,
        "article",
        0,
        Some(json!({
            "seo_title": article.seo_title,
            "word_count": article.word_count,
            "internal_links": article.internal_links,
            "model": article.model,
        })),
    );
    kb.update_content_status(&hash, "generated", None);
}
