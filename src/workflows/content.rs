//! Content optimization: Search Console export in, improvement and
//! new-content workbooks out.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, warn};

use crate::cli::{print_banner, print_section, progress_bar, RULE};
use crate::core::types::{ContentCluster, ImprovementItem, QueryRow};
use crate::core::AppState;
use crate::export::excel::ExcelWriter;
use crate::export::search_console::load_search_console_data;
use crate::features::{FileSelector, KnowledgeBase};
use crate::llm::processor::fallback_improvements;
use crate::llm::AiProcessor;
use crate::nlp::clustering::{
    cluster_locally, clusters_from_groups, drop_known_clusters, extract_top_clusters,
    merge_clusters_with_metadata, validate_clusters,
};
use crate::nlp::Analyzer;
use crate::scraping::SitemapManager;
use crate::workflows::{configured_sitemap_url, default_client, project_name};

pub const TEST_MODE_QUERIES: usize = 10;

/// Files written for one input workbook.
#[derive(Debug, Default)]
pub struct FileReport {
    pub improvements: usize,
    pub new_content: usize,
}

pub async fn run(state: &mut AppState) -> Result<()> {
    print_banner();
    println!("📊 MODE: Content Optimization & Analysis");
    let project = project_name(state)?;
    let mut kb = state
        .open_knowledge_base(&project)
        .context("failed to open knowledge base")?;

    let cfg = state.config.clone();
    let prompter = state.prompter();

    print_section("Select Input Files", Some("1/7"));
    let selector = FileSelector::new(state.input_dir())?;
    let files = selector.select_files(prompter)?;
    if files.is_empty() {
        println!("\n❌ No files selected. Exiting...");
        return Ok(());
    }

    print_section("Sitemap Configuration", Some("2/7"));
    let sitemaps = SitemapManager::new(cfg.app.resolve_sitemap_dir(), &cfg.scraping)?;
    let sitemap_url = configured_sitemap_url(state);
    let sitemap_urls = sitemaps
        .download_and_parse(prompter, sitemap_url.as_deref(), false)
        .await?;
    if sitemap_urls.is_empty() {
        println!("\n⚠️  No URLs extracted from sitemap. Continuing without URL matching...");
    }

    let processor = AiProcessor::new(default_client(state)?);
    let writer = ExcelWriter::new(state.output_dir(), cfg.app.resolve_max_headings())?;

    for (idx, file) in files.iter().enumerate() {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        print_section(
            &format!("Processing File: {}", name),
            Some(&format!("{}/{}", idx + 1, files.len())),
        );
        process_file(state, &processor, &writer, &mut kb, file, &sitemap_urls)
            .await
            .with_context(|| format!("failed to process {}", name))?;
        println!("\n{}", RULE);
        println!("✅ COMPLETED: {}", name);
        println!("{}", RULE);
    }

    print_section("🎉 ALL FILES PROCESSED SUCCESSFULLY!", None);
    println!("📁 Output directory: {}", writer.output_dir().display());
    println!("📊 Processed {} file(s)", files.len());
    let stats = kb.statistics();
    println!(
        "🧠 Knowledge base: {} suggestions, {} analyses",
        stats.total_content_suggestions, stats.metadata.total_analyses
    );

    if prompter.confirm("Move processed files to the 'processed' folder?", false)? {
        selector.move_processed_files(&files, "processed")?;
    }
    Ok(())
}

/// Steps 3-7 for one Search Console workbook.
pub async fn process_file(
    state: &AppState,
    processor: &AiProcessor,
    writer: &ExcelWriter,
    kb: &mut KnowledgeBase,
    file: &Path,
    sitemap_urls: &[String],
) -> Result<FileReport> {
    let cfg = &state.config;
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());

    println!("\n[3/7] Loading Search Console data...");
    let mut rows = load_search_console_data(file)?;
    if state.test_mode {
        rows.truncate(TEST_MODE_QUERIES);
        println!("🧪 TEST MODE: Limited to {} queries", rows.len());
    }
    println!("✅ Loaded {} queries", rows.len());

    println!("\n[4/7] Identifying content opportunities...");
    let analyzer = Analyzer::new(cfg.app.resolve_min_position());
    let opportunities = analyzer.identify_opportunities(&rows);
    let scored = analyzer.calculate_opportunity_score(opportunities);
    let filtered =
        analyzer.filter_high_potential_queries(scored, cfg.app.resolve_min_impressions());
    println!("✅ Found {} high-potential opportunities", filtered.len());

    println!("\n[5/7] Matching queries to existing URLs...");
    let (matched, unmatched) = analyzer.match_queries_to_urls(filtered.clone(), sitemap_urls);
    println!("   📌 Matched to existing pages: {}", matched.len());
    println!("   ✨ New content opportunities: {}", unmatched.len());

    println!("\n[6/7] Generating AI-powered suggestions...");
    let groups = analyzer.group_by_url(&matched);
    let mut improvements = Vec::with_capacity(groups.len());
    if !groups.is_empty() {
        println!("\n   🔄 Processing {} existing URLs...", groups.len());
        let pb = progress_bar(groups.len() as u64, "   Analyzing pages");
        for group in &groups {
            let suggestions = match processor
                .generate_content_improvements(
                    &group.url,
                    &group.keywords,
                    group.avg_position,
                    group.total_impressions,
                )
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    error!("Improvement request failed for {}: {}", group.url, e);
                    fallback_improvements(&group.keywords)
                }
            };
            kb.add_improvement_suggestion(
                &group.url,
                &group.keywords,
                suggestions.clone(),
                json!({
                    "position": group.avg_position,
                    "impressions": group.total_impressions,
                }),
            );
            improvements.push(ImprovementItem {
                url: group.url.clone(),
                main_keyword: group.keywords.first().cloned().unwrap_or_default(),
                position: group.avg_position,
                impressions: group.total_impressions,
                ai_suggestions: suggestions,
            });
            pb.inc(1);
        }
        pb.finish_and_clear();
        println!("   ✅ Generated {} improvement suggestions", improvements.len());
    }

    let mut clusters: Vec<ContentCluster> = Vec::new();
    if !unmatched.is_empty() {
        println!("\n   🔄 Clustering {} keywords for new content...", unmatched.len());
        let unmatched_rows: Vec<QueryRow> = unmatched.iter().map(|q| q.row.clone()).collect();
        let keywords: Vec<String> = unmatched_rows.iter().map(|r| r.query.clone()).collect();

        let mut ai_clusters = processor.cluster_keywords(&keywords).await;
        if ai_clusters.is_empty() {
            warn!("AI clustering returned nothing, falling back to local clustering");
            ai_clusters = clusters_from_groups(cluster_locally(
                &keywords,
                cfg.app.resolve_clustering_threshold(),
            ));
        }

        let merged = merge_clusters_with_metadata(ai_clusters, &unmatched_rows);
        let valid = validate_clusters(merged);
        let fresh = drop_known_clusters(valid, kb, cfg.app.resolve_duplicate_threshold());
        clusters = extract_top_clusters(fresh, cfg.app.resolve_top_clusters());
        record_clusters(kb, &clusters)?;
        println!("   ✅ Created {} new content suggestions", clusters.len());
    }

    println!("\n[7/7] Generating Excel reports...");
    if !improvements.is_empty() {
        let path = writer
            .write_existing_content_improvements(&improvements, &format!("improvements_{}.xlsx", stem))?;
        println!("   ✅ Created: {}", display_name(&path));
    }
    if !clusters.is_empty() {
        let path =
            writer.write_new_content_suggestions(&clusters, &format!("new_content_{}.xlsx", stem))?;
        println!("   ✅ Created: {}", display_name(&path));
    }

    let mut summary = analyzer.summary_stats(&rows, &filtered, matched.len(), unmatched.len());
    summary.improvement_suggestions = improvements.len();
    summary.new_content_clusters = clusters.len();
    let path = writer.write_full_analysis_report(&summary, &format!("analysis_{}.xlsx", stem))?;
    println!("   ✅ Created: {}", display_name(&path));

    kb.record_analysis();
    info!(
        "Finished {}: {} improvements, {} new clusters",
        stem,
        improvements.len(),
        clusters.len()
    );
    Ok(FileReport {
        improvements: improvements.len(),
        new_content: clusters.len(),
    })
}

fn record_clusters(kb: &mut KnowledgeBase, clusters: &[ContentCluster]) -> Result<()> {
    for c in clusters {
        let info = serde_json::to_value(&c.cluster)?;
        kb.add_generated_content(
            c.title(),
            &c.cluster.keywords,
            &c.cluster.content_type,
            c.avg_impressions as i64,
            Some(info.clone()),
        );
        kb.save_keyword_cluster(info);
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
