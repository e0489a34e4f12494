/// Sitemap loading and resumable page scraping against a local mock site.
use std::time::Duration;

use seo_scout::cli::ScriptedPrompter;
use seo_scout::core::config::ScrapingSection;
use seo_scout::export::excel::read_seo_data;
use seo_scout::scraping::{PageScraper, SitemapManager};
use seo_scout::ScrapeStatus;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

fn scraping_section() -> ScrapingSection {
    ScrapingSection {
        delay_ms: Some(0),
        request_timeout_seconds: Some(5),
        sitemap_max_retries: Some(2),
        ..Default::default()
    }
}

fn xml(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "application/xml")
}

#[tokio::test]
async fn test_sitemap_index_download_and_cache() {
    init_logger();
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{base}/post-sitemap.xml</loc></sitemap>
  <sitemap><loc>{base}/page-sitemap.xml</loc></sitemap>
</sitemapindex>"#
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post-sitemap.xml"))
        .respond_with(xml(format!(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/blog/خرید-گوشی</loc></url>
  <url><loc>{base}/blog/قیمت-لپ-تاپ</loc></url>
</urlset>"#
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manager = SitemapManager::new(dir.path(), &scraping_section())
        .unwrap()
        .with_retry_unit(Duration::ZERO);
    let index_url = format!("{}/sitemap_index.xml", base);

    println!("\n🧪 Sitemap index: {}", index_url);
    let prompter = ScriptedPrompter::new(["all"]);
    let urls = manager
        .download_and_parse(&prompter, Some(&index_url), true)
        .await
        .unwrap();
    println!("📊 URLs: {:?}", urls);
    assert_eq!(urls.len(), 2, "❌ FAIL: the 404 sub-sitemap should be skipped");
    assert!(urls[0].ends_with("/blog/خرید-گوشی"));
    assert!(manager.cache_path(&index_url).exists());
    assert!(manager.cache_path(&format!("{}/post-sitemap.xml", base)).exists());

    // Cached index and post sitemap are reused without another download.
    let urls = manager
        .download_and_parse(&ScriptedPrompter::default(), Some(&index_url), false)
        .await
        .unwrap();
    assert_eq!(urls.len(), 2);

    // "none" skips every sub-sitemap.
    let urls = manager
        .download_and_parse(&ScriptedPrompter::new(["n", "none"]), Some(&index_url), false)
        .await
        .unwrap();
    assert!(urls.is_empty());
}

#[tokio::test]
async fn test_failed_sitemap_download_gives_up() {
    init_logger();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.xml"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manager = SitemapManager::new(dir.path(), &scraping_section())
        .unwrap()
        .with_retry_unit(Duration::ZERO);
    let url = format!("{}/broken.xml", server.uri());
    let urls = manager
        .download_and_parse(&ScriptedPrompter::default(), Some(&url), true)
        .await
        .unwrap();
    println!("⚠️  URLs after failure: {}", urls.len());
    assert!(urls.is_empty());
    assert!(!manager.cache_path(&url).exists());
}

fn page(title: &str, description: &str, h1: &str) -> ResponseTemplate {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="fa" dir="rtl">
<head>
  <title>{title}</title>
  <meta name="description" content="{description}">
  <meta property="og:title" content="{title}">
</head>
<body>
  <h1>{h1}</h1>
  <p>این یک متن آزمایشی به زبان فارسی است که برای بررسی استخراج اطلاعات سئو از صفحه نوشته شده است و باید به عنوان زبان فارسی شناخته شود.</p>
</body>
</html>"#
    );
    ResponseTemplate::new(200).set_body_raw(html.into_bytes(), "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_batch_scraping_pauses_and_resumes() {
    init_logger();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(page("خرید گوشی سامسونگ", "بهترین قیمت گوشی", "گوشی سامسونگ"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(page("قیمت لپ تاپ", "لپ تاپ ارزان", "لپ تاپ"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let sitemap_url = format!("{}/sitemap.xml", base);
    let urls: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|p| format!("{}/{}", base, p))
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let scraper = PageScraper::new(dir.path(), &scraping_section()).unwrap();

    // Continue after the first batch, stop after the second.
    let prompter = ScriptedPrompter::new(["y", "n"]);
    let first = scraper
        .scrape_urls_batch(&prompter, &urls, &sitemap_url, Some(1), false)
        .await
        .unwrap();
    println!("📊 First run: {:?}, remaining {}", first.stats, first.remaining);
    assert_eq!(first.stats.total, 2);
    assert_eq!(first.stats.success, 2);
    assert_eq!(first.remaining, 1);
    assert_eq!(prompter.remaining(), 0);

    let rows = read_seo_data(&first.output_file).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].url, urls[0]);
    assert_eq!(rows[0].title, "خرید گوشی سامسونگ");
    assert_eq!(rows[0].meta_description, "بهترین قیمت گوشی");
    assert_eq!(rows[0].h1, "گوشی سامسونگ");
    assert_eq!(rows[0].status, ScrapeStatus::Success);

    // Resume: only /c is fetched.
    let second = scraper
        .scrape_urls_batch(&ScriptedPrompter::default(), &urls, &sitemap_url, Some(1), false)
        .await
        .unwrap();
    assert_eq!(second.output_file, first.output_file);
    assert_eq!(second.stats.total, 1);
    assert_eq!(second.stats.errors, 1);
    assert_eq!(second.remaining, 0);

    let rows = read_seo_data(&second.output_file).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].status, ScrapeStatus::Error);
    assert!(!rows[2].error.is_empty(), "❌ FAIL: error message not recorded");

    // Nothing left to do.
    let third = scraper
        .scrape_urls_batch(&ScriptedPrompter::default(), &urls, &sitemap_url, None, false)
        .await
        .unwrap();
    assert_eq!(third.stats.total, 0);
    assert_eq!(third.remaining, 0);
}
