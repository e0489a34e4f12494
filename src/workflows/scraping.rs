//! SEO data collection: sitemap URLs in, `seo_data_{domain}.xlsx` out.

use anyhow::Result;

use crate::cli::{print_banner, print_section};
use crate::core::AppState;
use crate::scraping::{PageScraper, SitemapManager};
use crate::workflows::configured_sitemap_url;

pub async fn run(state: &mut AppState) -> Result<()> {
    print_banner();
    println!("🔍 MODE: SEO Data Collection (Page Scraping)");
    if state.test_mode {
        println!("🧪 TEST MODE ENABLED: Will scrape only 10 pages\n");
    }
    let cfg = state.config.clone();
    let prompter = state.prompter();

    print_section("Sitemap Configuration", Some("1/2"));
    let sitemaps = SitemapManager::new(cfg.app.resolve_sitemap_dir(), &cfg.scraping)?;
    let sitemap_url = match configured_sitemap_url(state) {
        Some(u) => u,
        None => sitemaps.ask_sitemap_url(prompter)?,
    };
    let urls = sitemaps
        .download_and_parse(prompter, Some(&sitemap_url), false)
        .await?;
    if urls.is_empty() {
        println!("\n❌ No URLs found in sitemap. Exiting...");
        return Ok(());
    }

    print_section("Scraping SEO Data", Some("2/2"));
    let scraper = PageScraper::new(state.output_dir(), &cfg.scraping)?;
    let outcome = scraper
        .scrape_urls_batch(
            prompter,
            &urls,
            &sitemap_url,
            cfg.scraping.resolve_batch_size(),
            state.test_mode,
        )
        .await?;

    print_section("🎉 SCRAPING COMPLETED!", None);
    println!("📁 Output file: {}", outcome.output_file.display());
    if outcome.remaining > 0 {
        println!(
            "⏸️  {} URLs left. Run again to resume from where you left off.",
            outcome.remaining
        );
    }
    Ok(())
}
