//! Inserts links to other site pages into generated article HTML.
//!
//! Sitemap URLs are classified (category / product / blog / other) from their
//! path and described by a title and keywords recovered from the slug. Each
//! paragraph-like block may receive one link; headings never do.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Serialize;
use similar::TextDiff;
use tracing::{info, warn};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static tag regex"));
static EXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(html|htm|php)$").expect("static extension regex"));
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<h[1-6][^>]*>.*?</h[1-6]>|<p[^>]*>.*?</p>|<ul[^>]*>.*?</ul>|<ol[^>]*>.*?</ol>|<div[^>]*>.*?</div>",
    )
    .expect("static section regex")
});

const CATEGORY_PATTERNS: &[&str] = &[
    "/category/",
    "/cat/",
    "/categories/",
    "/دسته/",
    "/دسته-بندی/",
    "/product-category/",
    "/shop/",
];
const PRODUCT_PATTERNS: &[&str] = &["/product/", "/محصول/", "/p/"];
const BLOG_PATTERNS: &[&str] = &["/blog/", "/post/", "/article/", "/مقاله/", "/وبلاگ/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlType {
    Category,
    Product,
    Blog,
    Other,
}

impl UrlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlType::Category => "category",
            UrlType::Product => "product",
            UrlType::Blog => "blog",
            UrlType::Other => "other",
        }
    }

    /// Category before product before blog; anything else is `Other`.
    pub fn classify(url: &str) -> Self {
        let lower = url.to_lowercase();
        // Sitemaps usually carry percent-encoded Persian slugs.
        let decoded = percent_decode_str(&lower).decode_utf8_lossy().to_lowercase();
        let hit = |patterns: &[&str]| {
            patterns
                .iter()
                .any(|p| lower.contains(p) || decoded.contains(p))
        };
        if hit(CATEGORY_PATTERNS) {
            UrlType::Category
        } else if hit(PRODUCT_PATTERNS) {
            UrlType::Product
        } else if hit(BLOG_PATTERNS) {
            UrlType::Blog
        } else {
            UrlType::Other
        }
    }
}

/// A sitemap URL with the title and keywords recovered from its slug.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkTarget {
    pub url: String,
    pub url_type: UrlType,
    pub title: String,
    pub keywords: Vec<String>,
}

impl LinkTarget {
    pub fn new(url: &str) -> Self {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        let path = percent_decode_str(&path).decode_utf8_lossy().into_owned();

        let title = match path.split('/').filter(|s| !s.is_empty()).last() {
            Some(seg) => EXT_RE.replace(seg, "").replace(['-', '_'], " ").trim().to_string(),
            None => url.to_string(),
        };
        let keywords = path
            .split(['/', '-', '_'])
            .map(str::trim)
            .filter(|k| k.chars().count() > 2)
            .map(str::to_string)
            .collect();

        Self {
            url: url.to_string(),
            url_type: UrlType::classify(url),
            title,
            keywords,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleUrl {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkerStats {
    pub total_urls: usize,
    pub by_type: BTreeMap<UrlType, usize>,
    pub sample_urls: BTreeMap<UrlType, Vec<SampleUrl>>,
}

enum Section {
    Heading(String),
    Block(String),
}

pub struct InternalLinker {
    targets: Vec<LinkTarget>,
}

impl InternalLinker {
    pub fn new(sitemap_urls: &[String]) -> Self {
        let targets: Vec<LinkTarget> = sitemap_urls.iter().map(|u| LinkTarget::new(u)).collect();
        let linker = Self { targets };
        info!(
            "✅ Internal linker initialized with {} URLs",
            linker.targets.len()
        );
        for (t, count) in linker.statistics().by_type {
            info!("   - {}: {}", t.as_str(), count);
        }
        linker
    }

    pub fn targets(&self) -> &[LinkTarget] {
        &self.targets
    }

    /// Add up to `max_links` links (default: one per ~350 words).
    ///
    /// Returns the rewritten HTML and the number of links inserted.
    pub fn add_internal_links(
        &self,
        html: &str,
        max_links: Option<usize>,
        words_per_link: (usize, usize),
    ) -> (String, usize) {
        let word_count = strip_tags(html).split_whitespace().count();
        let max_links = max_links.unwrap_or_else(|| {
            let avg = (words_per_link.0 + words_per_link.1) as f64 / 2.0;
            if avg > 0.0 {
                (word_count as f64 / avg) as usize
            } else {
                0
            }
        });
        info!(
            "Adding up to {} internal links to {} words of content",
            max_links, word_count
        );

        let prioritized = self.prioritized();
        if prioritized.is_empty() {
            warn!("No URLs available for linking");
            return (html.to_string(), 0);
        }

        let mut links_added = 0usize;
        let mut distribution: BTreeMap<UrlType, usize> = BTreeMap::new();
        let mut used: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        for section in split_sections(html) {
            let block = match section {
                Section::Heading(h) => {
                    out.push(h);
                    continue;
                }
                Section::Block(b) => b,
            };
            if links_added >= max_links {
                out.push(block);
                continue;
            }
            let candidates: Vec<&LinkTarget> = prioritized
                .iter()
                .copied()
                .filter(|t| !used.contains(t.url.as_str()))
                .collect();
            let best = best_target(&block, &candidates, &distribution, max_links - links_added);
            match best.and_then(|t| add_link(&block, t).map(|html| (t, html))) {
                Some((target, linked)) => {
                    links_added += 1;
                    *distribution.entry(target.url_type).or_default() += 1;
                    used.insert(target.url.as_str());
                    info!(
                        "   ✓ Added {} link: {}",
                        target.url_type.as_str(),
                        target.title.chars().take(40).collect::<String>()
                    );
                    out.push(linked);
                }
                None => out.push(block),
            }
        }

        info!("✅ Added {} internal links", links_added);
        (out.join("\n"), links_added)
    }

    /// Counts by URL type with up to three samples each.
    pub fn statistics(&self) -> LinkerStats {
        let mut by_type: BTreeMap<UrlType, usize> = BTreeMap::new();
        let mut sample_urls: BTreeMap<UrlType, Vec<SampleUrl>> = BTreeMap::new();
        for t in &self.targets {
            *by_type.entry(t.url_type).or_default() += 1;
            let samples = sample_urls.entry(t.url_type).or_default();
            if samples.len() < 3 {
                samples.push(SampleUrl {
                    url: t.url.clone(),
                    title: t.title.clone(),
                });
            }
        }
        LinkerStats {
            total_urls: self.targets.len(),
            by_type,
            sample_urls,
        }
    }

    fn prioritized(&self) -> Vec<&LinkTarget> {
        let mut v: Vec<&LinkTarget> = self.targets.iter().collect();
        v.sort_by_key(|t| t.url_type);
        v
    }
}

fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

fn split_sections(html: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let push_text = |text: &str, sections: &mut Vec<Section>| {
        let t = text.trim();
        if !t.is_empty() {
            sections.push(Section::Block(format!("<p>{}</p>", t)));
        }
    };

    let mut last = 0;
    for m in SECTION_RE.find_iter(html) {
        push_text(&html[last..m.start()], &mut sections);
        let part = m.as_str().trim().to_string();
        let is_heading = part
            .get(..2)
            .map(|p| p.eq_ignore_ascii_case("<h"))
            .unwrap_or(false);
        sections.push(if is_heading {
            Section::Heading(part)
        } else {
            Section::Block(part)
        });
        last = m.end();
    }
    push_text(&html[last..], &mut sections);
    sections
}

fn match_score(text: &str, target: &LinkTarget) -> f64 {
    let mut score = 0.0;
    for word in target.title.to_lowercase().split_whitespace() {
        if word.chars().count() > 2 && text.contains(word) {
            score += 0.2;
        }
    }
    for kw in &target.keywords {
        let kw = kw.to_lowercase();
        if kw.chars().count() > 2 && text.contains(&kw) {
            score += 0.15;
        }
    }
    f64::min(score, 1.0)
}

fn best_target<'a>(
    block: &str,
    candidates: &[&'a LinkTarget],
    distribution: &BTreeMap<UrlType, usize>,
    remaining: usize,
) -> Option<&'a LinkTarget> {
    let text = strip_tags(block).to_lowercase();
    let mut scored: Vec<(f64, &LinkTarget)> = candidates
        .iter()
        .map(|t| {
            let mut score = match_score(&text, t);
            if t.url_type == UrlType::Category {
                score *= 1.5;
            }
            let type_count = distribution.get(&t.url_type).copied().unwrap_or(0);
            if type_count as f64 > remaining as f64 / 3.0 {
                score *= 0.5;
            }
            (score, *t)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored
        .first()
        .filter(|(score, _)| *score > 0.3)
        .map(|(_, t)| *t)
}

/// Case-insensitive search returning the matched slice of `haystack`.
fn find_ci<'h>(haystack: &'h str, needle: &str) -> Option<&'h str> {
    if needle.is_empty() {
        return None;
    }
    let re = Regex::new(&format!("(?i){}", regex::escape(needle))).ok()?;
    re.find(haystack).map(|m| m.as_str())
}

fn anchor_text(text: &str, target: &LinkTarget) -> Option<String> {
    if let Some(m) = find_ci(text, &target.title) {
        return Some(m.to_string());
    }
    for kw in &target.keywords {
        if kw.chars().count() > 2 {
            if let Some(m) = find_ci(text, kw) {
                return Some(m.to_string());
            }
        }
    }

    // Closest phrase of up to five words.
    let title = target.title.to_lowercase();
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut best: Option<String> = None;
    let mut best_ratio = 0.0f32;
    for i in 0..words.len() {
        for len in 1..=5.min(words.len() - i) {
            let phrase = words[i..i + len].join(" ");
            let lower = phrase.to_lowercase();
            let ratio = TextDiff::from_chars(lower.as_str(), title.as_str()).ratio();
            if ratio > best_ratio && ratio > 0.6 {
                best_ratio = ratio;
                best = Some(phrase);
            }
        }
    }
    best
}

/// Wrap the first whole-word occurrence of the anchor in `block` with a link.
fn add_link(block: &str, target: &LinkTarget) -> Option<String> {
    let text = strip_tags(block);
    let anchor = anchor_text(&text, target)?;
    let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&anchor))).ok()?;
    let m = re.find(block)?;
    let mut out = String::with_capacity(block.len() + target.url.len() + 16);
    out.push_str(&block[..m.start()]);
    out.push_str(&format!("<a href=\"{}\">{}</a>", target.url, m.as_str()));
    out.push_str(&block[m.end()..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classification_order() {
        assert_eq!(
            UrlType::classify("https://x.ir/product-category/shoes/"),
            UrlType::Category
        );
        assert_eq!(UrlType::classify("https://x.ir/product/nike-air"), UrlType::Product);
        assert_eq!(UrlType::classify("https://x.ir/blog/seo-tips"), UrlType::Blog);
        assert_eq!(UrlType::classify("https://x.ir/about-us"), UrlType::Other);
        assert_eq!(
            UrlType::classify("https://x.ir/%D9%85%D9%82%D8%A7%D9%84%D9%87/test"),
            UrlType::Blog
        );
    }

    #[test]
    fn test_title_and_keywords_from_slug() {
        let t = LinkTarget::new("https://x.ir/blog/running_shoes-guide.html");
        assert_eq!(t.title, "running shoes guide");
        assert_eq!(t.keywords, vec!["blog", "running", "shoes", "guide.html"]);
    }

    #[test]
    fn test_headings_never_linked() {
        let linker = InternalLinker::new(&urls(&["https://x.ir/blog/running-shoes"]));
        let html = "<h2>running shoes</h2>\n<p>Best running shoes for beginners.</p>";
        let (out, n) = linker.add_internal_links(html, Some(5), (300, 400));
        assert_eq!(n, 1);
        assert!(out.starts_with("<h2>running shoes</h2>"));
        assert!(out.contains(
            "<p>Best <a href=\"https://x.ir/blog/running-shoes\">running shoes</a> for beginners.</p>"
        ));
    }

    #[test]
    fn test_each_url_used_once_and_max_links() {
        let linker = InternalLinker::new(&urls(&["https://x.ir/blog/running-shoes"]));
        let html = "<p>running shoes one</p><p>running shoes two</p>";
        let (out, n) = linker.add_internal_links(html, Some(5), (300, 400));
        assert_eq!(n, 1);
        assert_eq!(out.matches("<a href").count(), 1);

        let (_, zero) = linker.add_internal_links(html, None, (300, 400));
        assert_eq!(zero, 0);
    }

    #[test]
    fn test_category_preferred() {
        let linker = InternalLinker::new(&urls(&[
            "https://x.ir/blog/shoes",
            "https://x.ir/category/shoes",
        ]));
        let (out, n) = linker.add_internal_links("<p>we sell shoes here</p>", Some(1), (300, 400));
        assert_eq!(n, 1);
        assert!(out.contains("https://x.ir/category/shoes"));
    }

    #[test]
    fn test_plain_text_wrapped_and_low_score_skipped() {
        let linker = InternalLinker::new(&urls(&["https://x.ir/blog/gardening"]));
        let (out, n) = linker.add_internal_links("nothing relevant", Some(3), (300, 400));
        assert_eq!(n, 0);
        assert_eq!(out, "<p>nothing relevant</p>");
    }

    #[test]
    fn test_statistics_samples() {
        let linker = InternalLinker::new(&urls(&[
            "https://x.ir/blog/a1",
            "https://x.ir/blog/a2",
            "https://x.ir/blog/a3",
            "https://x.ir/blog/a4",
            "https://x.ir/shop/",
        ]));
        let stats = linker.statistics();
        assert_eq!(stats.total_urls, 5);
        assert_eq!(stats.by_type[&UrlType::Blog], 4);
        assert_eq!(stats.sample_urls[&UrlType::Blog].len(), 3);
        assert_eq!(stats.by_type[&UrlType::Category], 1);
    }
}
