//! Sitemap download, caching and parsing.
//!
//! Downloads are cached under the sitemap directory as
//! `{domain}_{md5(url)[..12]}.xml`. A sitemap index lets the user pick which
//! sub-sitemaps to load.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{error, info, warn};

use crate::cli::{progress_bar, Prompter};
use crate::core::config::ScrapingSection;

/// Sub-sitemaps of an index get fewer attempts than the main sitemap.
const SUB_SITEMAP_RETRIES: u32 = 3;
const MAX_URL_PROMPTS: usize = 3;

/// `example.com` for `https://www.example.com/sitemap.xml`.
pub fn sitemap_domain(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(u) => {
            let host = u.host_str().unwrap_or("unknown");
            let netloc = match u.port() {
                Some(p) => format!("{}:{}", host, p),
                None => host.to_string(),
            };
            netloc.replace("www.", "")
        }
        Err(_) => "unknown".to_string(),
    }
}

/// `<url><loc>` entries and `<sitemap><loc>` entries, in document order.
///
/// Namespace prefixes are ignored. Malformed XML yields two empty lists.
pub fn parse_sitemap(content: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut subs = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    let mut push_loc = |stack: &[Vec<u8>], text: String| {
        let n = stack.len();
        if n < 2 || stack[n - 1] != b"loc" {
            return;
        }
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        match stack[n - 2].as_slice() {
            b"url" => urls.push(text),
            b"sitemap" => subs.push(text),
            _ => {}
        }
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(e.local_name().as_ref().to_vec()),
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => match t.unescape() {
                Ok(text) => push_loc(&stack, text.into_owned()),
                Err(e) => {
                    error!("XML parsing error: {}", e);
                    return (Vec::new(), Vec::new());
                }
            },
            Ok(Event::CData(c)) => {
                push_loc(&stack, String::from_utf8_lossy(&c.into_inner()).into_owned())
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                error!("XML parsing error: {}", e);
                return (Vec::new(), Vec::new());
            }
        }
        buf.clear();
    }
    (urls, subs)
}

/// What the user typed at the sub-sitemap prompt.
#[derive(Debug, PartialEq, Eq)]
enum IndexChoice {
    All,
    None,
    Indices(Vec<usize>),
    Invalid(String),
}

fn parse_index_choice(input: &str, count: usize) -> IndexChoice {
    let choice = input.trim().to_lowercase();
    match choice.as_str() {
        "all" => return IndexChoice::All,
        "none" => return IndexChoice::None,
        _ => {}
    }
    match choice
        .split(',')
        .map(|x| x.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(idx) if !idx.is_empty() && idx.iter().all(|i| (1..=count).contains(i)) => {
            IndexChoice::Indices(idx)
        }
        Ok(_) => IndexChoice::Invalid(format!(
            "❌ Invalid selection. Numbers must be between 1 and {}",
            count
        )),
        Err(_) => IndexChoice::Invalid(
            "❌ Invalid format. Use comma-separated numbers or 'all'/'none'".to_string(),
        ),
    }
}

/// Short display name of a sub-sitemap: `post-sitemap2.xml` → `post-2`.
fn sub_sitemap_name(url: &str) -> String {
    let last = url.rsplit('/').next().unwrap_or("");
    let name = last.replace(".xml", "").replace("sitemap", "");
    if name.is_empty() {
        "main".to_string()
    } else {
        name
    }
}

pub struct SitemapManager {
    dir: PathBuf,
    http: reqwest::Client,
    max_retries: u32,
    /// One backoff step; waits are `min(2^attempt, 30)` of these.
    retry_unit: Duration,
}

impl SitemapManager {
    pub fn new(dir: impl Into<PathBuf>, scraping: &ScrapingSection) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let http = reqwest::Client::builder()
            .user_agent(scraping.resolve_user_agent())
            .timeout(Duration::from_secs(scraping.resolve_sitemap_timeout_secs()))
            .build()
            .context("failed to build HTTP client")?;
        info!("Sitemap directory: {}", dir.display());
        Ok(Self {
            dir,
            http,
            max_retries: scraping.resolve_sitemap_max_retries(),
            retry_unit: Duration::from_secs(1),
        })
    }

    /// Scale the backoff waits (tests use zero).
    pub fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = unit;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_path(&self, url: &str) -> PathBuf {
        let digest = format!("{:x}", md5::compute(url.as_bytes()));
        self.dir
            .join(format!("{}_{}.xml", sitemap_domain(url), &digest[..12]))
    }

    /// GET with exponential backoff. `None` once every attempt failed.
    pub async fn download_with_retry(&self, url: &str, max_retries: u32) -> Option<Vec<u8>> {
        println!("\n📥 Downloading sitemap: {}", url);
        let max_retries = max_retries.max(1);
        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_unit * 2)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(self.retry_unit * 30)
            .with_max_elapsed_time(None)
            .build();

        let this = self;
        let attempts = &attempts;
        let result = retry(policy, move || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = async {
                let resp = this.http.get(url).send().await?.error_for_status()?;
                resp.bytes().await
            }
            .await;
            match outcome {
                Ok(bytes) => {
                    println!("   Attempt {}/{}... ✅ Success!", n, max_retries);
                    info!("Downloaded sitemap from {} (attempt {})", url, n);
                    Ok(bytes.to_vec())
                }
                Err(e) => {
                    let msg = e.to_string();
                    println!(
                        "   Attempt {}/{}... ❌ Failed: {}",
                        n,
                        max_retries,
                        msg.chars().take(50).collect::<String>()
                    );
                    warn!("Download attempt {} failed: {}", n, msg);
                    if n >= max_retries {
                        Err(backoff::Error::permanent(e))
                    } else {
                        Err(backoff::Error::transient(e))
                    }
                }
            }
        })
        .await;

        match result {
            Ok(bytes) => Some(bytes),
            Err(_) => {
                println!("\n❌ All {} download attempts failed!", max_retries);
                None
            }
        }
    }

    /// Ask for a sitemap URL until it starts with `http://` or `https://`.
    pub fn ask_sitemap_url(&self, prompter: &dyn Prompter) -> Result<String> {
        println!("\n{}", "=".repeat(60));
        println!("🗺️  SITEMAP CONFIGURATION");
        println!("{}", "=".repeat(60));

        let mut empty_answers = 0;
        loop {
            let url = prompter.input(
                "Enter your sitemap URL (e.g., https://example.com/sitemap.xml)",
                None,
            )?;
            let url = url.trim();
            if url.is_empty() {
                empty_answers += 1;
                if empty_answers >= MAX_URL_PROMPTS {
                    bail!("no sitemap URL provided");
                }
                println!("❌ URL cannot be empty. Please try again.");
                continue;
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                println!("❌ URL must start with http:// or https://");
                continue;
            }
            return Ok(url.to_string());
        }
    }

    /// Let the user choose sub-sitemaps of an index.
    pub fn select_sitemaps(&self, prompter: &dyn Prompter, subs: &[String]) -> Result<Vec<String>> {
        println!("\n{}", "=".repeat(60));
        println!("📋 FOUND {} SUB-SITEMAPS", subs.len());
        println!("{}", "=".repeat(60));
        for (idx, url) in subs.iter().enumerate() {
            println!("  [{}] {} - {}", idx + 1, sub_sitemap_name(url), url);
        }
        println!("\nSelection options:");
        println!("  - Enter numbers separated by commas (e.g., 1,3,5)");
        println!("  - Enter 'all' to download all sitemaps");
        println!("  - Enter 'none' to skip");

        loop {
            let answer = prompter.input("Your selection", Some("all"))?;
            match parse_index_choice(&answer, subs.len()) {
                IndexChoice::All => {
                    println!("✅ Selected all {} sitemaps", subs.len());
                    return Ok(subs.to_vec());
                }
                IndexChoice::None => {
                    println!("⏭️  Skipped sitemap selection");
                    return Ok(Vec::new());
                }
                IndexChoice::Indices(idx) => {
                    let picked: Vec<String> = idx.iter().map(|i| subs[i - 1].clone()).collect();
                    println!("✅ Selected {} sitemap(s)", picked.len());
                    return Ok(picked);
                }
                IndexChoice::Invalid(msg) => println!("{}", msg),
            }
        }
    }

    async fn load_index(&self, prompter: &dyn Prompter, subs: Vec<String>) -> Result<Vec<String>> {
        println!(
            "\n🔗 This is a sitemap index containing {} sub-sitemaps",
            subs.len()
        );
        let selected = self.select_sitemaps(prompter, &subs)?;
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        println!("\n📥 Downloading {} sitemap(s)...", selected.len());
        let pb = progress_bar(selected.len() as u64, "Processing sitemaps");
        let mut all = Vec::new();
        for sub in &selected {
            pb.inc(1);
            let cache = self.cache_path(sub);
            let content = if cache.exists() {
                Some(std::fs::read(&cache)?)
            } else {
                let downloaded = self.download_with_retry(sub, SUB_SITEMAP_RETRIES).await;
                if let Some(bytes) = &downloaded {
                    std::fs::write(&cache, bytes)?;
                }
                downloaded
            };
            if let Some(content) = content {
                all.extend(parse_sitemap(&content).0);
            }
        }
        pb.finish_and_clear();

        println!("\n✅ Total URLs extracted: {}", all.len());
        info!(
            "Extracted {} URLs from {} sitemaps",
            all.len(),
            selected.len()
        );
        Ok(all)
    }

    /// Page URLs of a sitemap (asking for its URL when `url` is `None`).
    ///
    /// Returns an empty list when the download failed and the user gave up.
    pub async fn download_and_parse(
        &self,
        prompter: &dyn Prompter,
        url: Option<&str>,
        force_download: bool,
    ) -> Result<Vec<String>> {
        let url = match url {
            Some(u) => u.to_string(),
            None => self.ask_sitemap_url(prompter)?,
        };
        let cache = self.cache_path(&url);

        if cache.exists() && !force_download {
            println!(
                "\n✅ Using cached sitemap: {}",
                cache.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            );
            if !prompter.confirm("   Download again?", false)? {
                let content = std::fs::read(&cache)
                    .with_context(|| format!("failed to read {}", cache.display()))?;
                let (urls, subs) = parse_sitemap(&content);
                if !subs.is_empty() {
                    return self.load_index(prompter, subs).await;
                }
                println!("   📊 Loaded {} URLs from cache", urls.len());
                return Ok(urls);
            }
        }

        let content = loop {
            if let Some(c) = self.download_with_retry(&url, self.max_retries).await {
                break c;
            }
            println!("\n⚠️  Failed to download sitemap.");
            if !prompter.confirm("Do you want to try again?", false)? {
                println!("❌ Aborting due to sitemap download failure.");
                return Ok(Vec::new());
            }
        };

        std::fs::write(&cache, &content)
            .with_context(|| format!("failed to write {}", cache.display()))?;
        println!(
            "💾 Cached sitemap: {}",
            cache.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        );

        let (urls, subs) = parse_sitemap(&content);
        if !subs.is_empty() {
            return self.load_index(prompter, subs).await;
        }
        println!("✅ Extracted {} URLs from sitemap", urls.len());
        info!("Parsed {} URLs from sitemap", urls.len());
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urlset_and_index() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/a</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc> https://example.com/b?x=1&amp;y=2 </loc></url>
</urlset>"#;
        let (urls, subs) = parse_sitemap(xml);
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b?x=1&y=2"]);
        assert!(subs.is_empty());

        let index = br#"<sm:sitemapindex xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sm:sitemap><sm:loc>https://example.com/post-sitemap.xml</sm:loc></sm:sitemap>
  <sm:sitemap><sm:loc><![CDATA[https://example.com/page-sitemap.xml]]></sm:loc></sm:sitemap>
</sm:sitemapindex>"#;
        let (urls, subs) = parse_sitemap(index);
        assert!(urls.is_empty());
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[1], "https://example.com/page-sitemap.xml");
    }

    #[test]
    fn test_malformed_xml_is_empty() {
        let (urls, subs) = parse_sitemap(b"<urlset><url><loc>https://x.com/a</url></urlset>");
        assert!(urls.is_empty() && subs.is_empty());
    }

    #[test]
    fn test_cache_path_shape() {
        let dir = tempfile::tempdir().unwrap();
        let m = SitemapManager::new(dir.path(), &ScrapingSection::default()).unwrap();
        let p = m.cache_path("https://www.example.com/sitemap.xml");
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("example.com_"));
        assert!(name.ends_with(".xml"));
        assert_eq!(name.len(), "example.com_".len() + 12 + ".xml".len());
    }

    #[test]
    fn test_index_choice_and_names() {
        assert_eq!(parse_index_choice("ALL", 3), IndexChoice::All);
        assert_eq!(parse_index_choice("none", 3), IndexChoice::None);
        assert_eq!(parse_index_choice("1,3", 3), IndexChoice::Indices(vec![1, 3]));
        assert!(matches!(parse_index_choice("0", 3), IndexChoice::Invalid(_)));
        assert_eq!(sub_sitemap_name("https://x.com/post-sitemap2.xml"), "post-2");
        assert_eq!(sub_sitemap_name("https://x.com/sitemap.xml"), "main");
    }
}
