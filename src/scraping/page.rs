//! Batch SEO-tag scraping with resume.
//!
//! Results for one site live in `seo_data_{domain}.xlsx`. URLs already in that
//! file are skipped, and the file is rewritten after every batch so an
//! interrupted run loses at most one batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{progress_bar, Prompter};
use crate::core::config::ScrapingSection;
use crate::core::types::{PageSeoData, ScrapeStatus};
use crate::export::excel;
use crate::scraping::metadata::{extract_seo_metadata, is_persian};
use crate::scraping::sitemap::sitemap_domain;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const TEST_MODE_LIMIT: usize = 10;

/// Counts over the pages scraped in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub success: usize,
    pub errors: usize,
    pub timeouts: usize,
    pub total: usize,
    /// Successful pages whose detected language is not Persian.
    pub non_persian: usize,
}

impl ScrapeStats {
    pub fn from_results(results: &[PageSeoData]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.status {
                ScrapeStatus::Success => {
                    stats.success += 1;
                    if !r.language.is_empty() && !is_persian(&r.language) {
                        stats.non_persian += 1;
                    }
                }
                ScrapeStatus::Error => stats.errors += 1,
                ScrapeStatus::Timeout => stats.timeouts += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub output_file: PathBuf,
    pub stats: ScrapeStats,
    /// URLs left for a later run (user stopped between batches).
    pub remaining: usize,
}

/// Existing rows first, then new ones; the first row per URL wins.
pub fn merge_results(existing: &[PageSeoData], new: &[PageSeoData]) -> Vec<PageSeoData> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(new)
        .filter(|r| seen.insert(r.url.clone()))
        .cloned()
        .collect()
}

pub struct PageScraper {
    http: reqwest::Client,
    output_dir: PathBuf,
    timeout_secs: u64,
    delay: Duration,
}

impl PageScraper {
    pub fn new(output_dir: impl Into<PathBuf>, scraping: &ScrapingSection) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;
        let timeout_secs = scraping.resolve_request_timeout_secs();
        let http = reqwest::Client::builder()
            .user_agent(scraping.resolve_user_agent())
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        info!("Page scraper output dir: {}", output_dir.display());
        Ok(Self {
            http,
            output_dir,
            timeout_secs,
            delay: Duration::from_millis(scraping.resolve_delay_ms()),
        })
    }

    pub fn output_path(&self, sitemap_url: &str) -> PathBuf {
        self.output_dir
            .join(format!("seo_data_{}.xlsx", sitemap_domain(sitemap_url)))
    }

    /// Fetch one page and extract its SEO tags. Never fails; problems are
    /// recorded in `status` and `error`.
    pub async fn scrape_page(&self, url: &str) -> PageSeoData {
        let response = match self.http.get(url).send().await.and_then(|r| r.error_for_status()) {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!("Timeout scraping {}", url);
                return PageSeoData::failed(
                    url,
                    ScrapeStatus::Timeout,
                    &format!("Request timeout after {}s", self.timeout_secs),
                );
            }
            Err(e) => {
                warn!("Error scraping {}: {}", url, e);
                return PageSeoData::failed(url, ScrapeStatus::Error, &e.to_string());
            }
        };
        match response.text().await {
            Ok(body) => {
                debug!("Successfully scraped: {}", url);
                extract_seo_metadata(url, &body)
            }
            Err(e) if e.is_timeout() => PageSeoData::failed(
                url,
                ScrapeStatus::Timeout,
                &format!("Request timeout after {}s", self.timeout_secs),
            ),
            Err(e) => PageSeoData::failed(url, ScrapeStatus::Error, &format!("Parsing error: {}", e)),
        }
    }

    fn load_existing(&self, path: &Path) -> Vec<PageSeoData> {
        if !path.exists() {
            return Vec::new();
        }
        match excel::read_seo_data(path) {
            Ok(rows) => {
                info!("Loaded {} existing records from {}", rows.len(), path.display());
                rows
            }
            Err(e) => {
                warn!("Could not load existing file: {}", e);
                Vec::new()
            }
        }
    }

    /// Ask for a batch size: default 50, at least 1, at most `total`.
    pub fn ask_batch_size(prompter: &dyn Prompter, total: usize) -> Result<usize> {
        println!("\n{}", "-".repeat(60));
        println!("How many pages would you like to scrape per batch?");
        println!("  Recommended: 50-100 for large sites");
        println!("  Total URLs: {}", total);
        println!("{}", "-".repeat(60));
        loop {
            let answer = prompter.input("Batch size", Some(&DEFAULT_BATCH_SIZE.to_string()))?;
            match answer.trim().parse::<usize>() {
                Ok(0) => println!("❌ Batch size must be at least 1"),
                Ok(n) if n > total => {
                    println!("ℹ️  Batch size larger than total URLs. Using {}", total);
                    return Ok(total.max(1));
                }
                Ok(n) => return Ok(n),
                Err(_) => println!("❌ Please enter a valid number"),
            }
        }
    }

    /// Scrape `urls` in batches, skipping URLs already in the site's output file.
    pub async fn scrape_urls_batch(
        &self,
        prompter: &dyn Prompter,
        urls: &[String],
        sitemap_url: &str,
        batch_size: Option<usize>,
        test_mode: bool,
    ) -> Result<BatchOutcome> {
        let output_file = self.output_path(sitemap_url);
        let existing = self.load_existing(&output_file);
        let scraped: HashSet<&str> = existing.iter().map(|r| r.url.as_str()).collect();
        if !existing.is_empty() {
            println!(
                "\n📊 Found existing data: {} URLs already scraped",
                scraped.len()
            );
        }

        let mut todo: Vec<&String> = urls.iter().filter(|u| !scraped.contains(u.as_str())).collect();
        if todo.is_empty() {
            println!("\n✅ All {} URLs already scraped!", urls.len());
            println!("   Output file: {}", output_file.display());
            return Ok(BatchOutcome {
                output_file,
                stats: ScrapeStats::default(),
                remaining: 0,
            });
        }
        println!("\n📋 URLs to scrape: {} (Total: {})", todo.len(), urls.len());

        if test_mode {
            todo.truncate(TEST_MODE_LIMIT);
            println!("🧪 TEST MODE: Limited to {} pages", todo.len());
        }

        let batch_size = match batch_size.filter(|n| *n > 0) {
            Some(n) => n.min(todo.len()),
            None => Self::ask_batch_size(prompter, todo.len())?,
        };

        let mut results: Vec<PageSeoData> = Vec::new();
        let mut done = 0usize;
        while done < todo.len() {
            let end = (done + batch_size).min(todo.len());
            println!(
                "\n🔄 Scraping batch: {} to {} of {}",
                done + 1,
                end,
                todo.len()
            );
            let pb = progress_bar((end - done) as u64, "Scraping pages");
            for url in &todo[done..end] {
                results.push(self.scrape_page(url).await);
                pb.inc(1);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
            pb.finish_and_clear();
            done = end;

            excel::write_seo_data(&merge_results(&existing, &results), &output_file)
                .with_context(|| format!("failed to write {}", output_file.display()))?;
            println!("✅ Batch complete. Scraped: {}/{}", done, todo.len());

            if done < todo.len()
                && !prompter.confirm(
                    &format!("⏸️  Scraped {}/{} pages. Continue?", done, todo.len()),
                    true,
                )?
            {
                println!(
                    "\n⏹️  Scraping paused. {} URLs remaining.",
                    todo.len() - done
                );
                println!("   Run again to resume from where you left off.");
                break;
            }
        }

        let stats = ScrapeStats::from_results(&results);
        print_statistics(&stats, &output_file);
        Ok(BatchOutcome {
            output_file,
            stats,
            remaining: todo.len() - done,
        })
    }
}

fn print_statistics(stats: &ScrapeStats, output_file: &Path) {
    if stats.total == 0 {
        return;
    }
    println!("\n{}", "=".repeat(60));
    println!("📊 SCRAPING STATISTICS");
    println!("{}", "=".repeat(60));
    println!("  ✅ Successful: {}", stats.success);
    println!("  ❌ Errors: {}", stats.errors);
    println!("  ⏱️  Timeouts: {}", stats.timeouts);
    println!("  📄 Total: {}", stats.total);
    if stats.non_persian > 0 {
        println!("  🌐 Not detected as Persian: {}", stats.non_persian);
    }
    println!("{}", "-".repeat(60));
    println!(
        "  💾 Output file: {}",
        output_file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    );
    println!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ScriptedPrompter;

    fn page(url: &str, status: ScrapeStatus, lang: &str) -> PageSeoData {
        PageSeoData {
            url: url.into(),
            status,
            language: lang.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_keeps_first_occurrence() {
        let existing = vec![page("a", ScrapeStatus::Success, "")];
        let new = vec![page("a", ScrapeStatus::Error, ""), page("b", ScrapeStatus::Success, "")];
        let merged = merge_results(&existing, &new);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].status, ScrapeStatus::Success);
        assert_eq!(merged[1].url, "b");
    }

    #[test]
    fn test_stats_count_statuses() {
        let stats = ScrapeStats::from_results(&[
            page("a", ScrapeStatus::Success, "pes"),
            page("b", ScrapeStatus::Success, "eng"),
            page("c", ScrapeStatus::Timeout, ""),
            page("d", ScrapeStatus::Error, ""),
        ]);
        assert_eq!(
            stats,
            ScrapeStats {
                success: 2,
                errors: 1,
                timeouts: 1,
                total: 4,
                non_persian: 1
            }
        );
    }

    #[test]
    fn test_ask_batch_size() {
        let p = ScriptedPrompter::new(["0", "abc", "500"]);
        assert_eq!(PageScraper::ask_batch_size(&p, 120).unwrap(), 120);
        let p = ScriptedPrompter::new(Vec::<String>::new());
        assert_eq!(PageScraper::ask_batch_size(&p, 120).unwrap(), 50);
    }

    #[test]
    fn test_output_path_uses_domain() {
        let dir = tempfile::tempdir().unwrap();
        let s = PageScraper::new(dir.path(), &ScrapingSection::default()).unwrap();
        assert_eq!(
            s.output_path("https://www.shop.ir/sitemap_index.xml"),
            dir.path().join("seo_data_shop.ir.xlsx")
        );
    }
}
