use scraper::{Html, Selector};
use whatlang::{detect, Lang};

use crate::core::types::{PageSeoData, ScrapeStatus};

/// Visible text shorter than this is not trusted for language detection.
const MIN_DETECTION_CHARS: usize = 40;

fn first_text(document: &Html, css: &str) -> String {
    if let Ok(selector) = Selector::parse(css) {
        if let Some(element) = document.select(&selector).next() {
            return element.text().collect::<String>().trim().to_string();
        }
    }
    String::new()
}

fn first_attr(document: &Html, css: &str, attr: &str) -> String {
    if let Ok(selector) = Selector::parse(css) {
        if let Some(element) = document.select(&selector).next() {
            if let Some(value) = element.value().attr(attr) {
                return value.trim().to_string();
            }
        }
    }
    String::new()
}

/// Text of `<body>` outside scripts and styles, whitespace-collapsed.
fn visible_text(document: &Html) -> String {
    let Ok(body) = Selector::parse("body") else {
        return String::new();
    };
    let mut out = String::new();
    for root in document.select(&body) {
        for node in root.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element())
                .map(|e| matches!(e.name(), "script" | "style" | "noscript"))
                .unwrap_or(false);
            if !hidden {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Page language: content-based detection first (ISO 639-3 code), then the
/// `<html lang>` attribute, else empty.
pub fn detect_language(document: &Html) -> String {
    let text = visible_text(document);
    if text.chars().count() >= MIN_DETECTION_CHARS {
        if let Some(info) = detect(&text) {
            if info.is_reliable() || info.confidence() > 0.5 {
                return info.lang().code().to_string();
            }
        }
    }
    first_attr(document, "html", "lang").to_lowercase()
}

/// Whether a detected language code means Persian.
pub fn is_persian(lang: &str) -> bool {
    let lang = lang.trim().to_lowercase();
    lang == Lang::Pes.code() || lang == "fa" || lang.starts_with("fa-") || lang.starts_with("fa_")
}

/// Extract the SEO tags of a page. All values are trimmed; missing tags are
/// empty strings. The canonical URL is kept as written.
pub fn extract_seo_metadata(url: &str, html: &str) -> PageSeoData {
    let document = Html::parse_document(html);
    PageSeoData {
        url: url.to_string(),
        status: ScrapeStatus::Success,
        title: first_text(&document, "title"),
        meta_description: first_attr(&document, "meta[name=\"description\"]", "content"),
        h1: first_text(&document, "h1"),
        canonical_url: first_attr(&document, "link[rel=\"canonical\"]", "href"),
        og_title: first_attr(&document, "meta[property=\"og:title\"]", "content"),
        og_description: first_attr(&document, "meta[property=\"og:description\"]", "content"),
        twitter_title: first_attr(&document, "meta[name=\"twitter:title\"]", "content"),
        twitter_description: first_attr(&document, "meta[name=\"twitter:description\"]", "content"),
        language: detect_language(&document),
        error: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html lang="fa-IR"><head>
  <title>  خرید گوشی موبایل  </title>
  <meta name="description" content=" بهترین قیمت گوشی ">
  <link rel="canonical" href="/mobile/">
  <meta property="og:title" content="OG">
  <meta property="og:description" content="OG desc">
  <meta name="twitter:title" content="TW">
  <meta name="twitter:description" content="TW desc">
</head><body>
  <script>var persian = "no";</script>
  <h1> گوشی </h1><h1>second</h1>
  <p>در این صفحه می‌توانید جدیدترین گوشی‌های موبایل را با بهترین قیمت و گارانتی معتبر خریداری کنید و از ارسال رایگان بهره‌مند شوید.</p>
</body></html>"#;

    #[test]
    fn test_extracts_all_tags() {
        let data = extract_seo_metadata("https://shop.ir/mobile", PAGE);
        assert_eq!(data.title, "خرید گوشی موبایل");
        assert_eq!(data.meta_description, "بهترین قیمت گوشی");
        assert_eq!(data.h1, "گوشی");
        assert_eq!(data.canonical_url, "/mobile/");
        assert_eq!(data.og_title, "OG");
        assert_eq!(data.og_description, "OG desc");
        assert_eq!(data.twitter_title, "TW");
        assert_eq!(data.twitter_description, "TW desc");
        assert!(is_persian(&data.language), "got {}", data.language);
    }

    #[test]
    fn test_missing_tags_are_empty() {
        let data = extract_seo_metadata("https://x.com", "<html><body><p>hi</p></body></html>");
        assert_eq!(data.status, ScrapeStatus::Success);
        assert!(data.title.is_empty());
        assert!(data.canonical_url.is_empty());
        assert!(data.language.is_empty());
    }

    #[test]
    fn test_is_persian_codes() {
        assert!(is_persian("pes"));
        assert!(is_persian("fa-IR"));
        assert!(!is_persian("eng"));
        assert!(!is_persian(""));
    }
}
