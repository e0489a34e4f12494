use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Search Console
// ─────────────────────────────────────────────────────────────────────────────

/// One query row of a Search Console performance export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueryRow {
    pub query: String,
    pub clicks: u64,
    pub impressions: u64,
    /// Fraction, not percent (`0.032` for 3.2%).
    pub ctr: f64,
    pub position: f64,
}

/// A query row annotated with its opportunity score components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredQuery {
    #[serde(flatten)]
    pub row: QueryRow,
    pub impressions_score: f64,
    pub position_score: f64,
    pub ctr_gap_score: f64,
    pub opportunity_score: f64,
}

impl ScoredQuery {
    /// Wrap a row with all scores at zero.
    pub fn unscored(row: QueryRow) -> Self {
        Self {
            row,
            impressions_score: 0.0,
            position_score: 0.0,
            ctr_gap_score: 0.0,
            opportunity_score: 0.0,
        }
    }
}

/// A scored query that was attributed to an existing sitemap URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedQuery {
    #[serde(flatten)]
    pub query: ScoredQuery,
    pub matched_url: String,
    pub match_score: f64,
}

/// Matched queries aggregated per URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlGroup {
    pub url: String,
    pub keywords: Vec<String>,
    pub avg_position: f64,
    pub total_impressions: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Clusters
// ─────────────────────────────────────────────────────────────────────────────

/// A keyword cluster as proposed by the AI (defaults already applied).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AiCluster {
    pub main_topic: String,
    pub keywords: Vec<String>,
    pub article_title: String,
    pub suggested_title: String,
    pub meta_description: String,
    pub h2_headings: Vec<String>,
    pub content_type: String,
    pub search_intent: String,
    pub recommended_word_count: u32,
    pub target_audience: String,
    pub content_focus: String,
}

/// A cluster enriched with Search Console metrics of its keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCluster {
    #[serde(flatten)]
    pub cluster: AiCluster,
    pub total_impressions: u64,
    pub avg_impressions: f64,
    pub total_clicks: u64,
    pub avg_position: f64,
    pub avg_ctr: f64,
    pub keyword_count: usize,
}

impl ContentCluster {
    /// Title used for output: the article title, else the suggested one.
    pub fn title(&self) -> &str {
        if self.cluster.article_title.trim().is_empty() {
            &self.cluster.suggested_title
        } else {
            &self.cluster.article_title
        }
    }
}

/// Improvement suggestions produced for one existing URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementItem {
    pub url: String,
    pub main_keyword: String,
    pub position: f64,
    pub impressions: u64,
    pub ai_suggestions: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Analysis report
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionBucket {
    pub range: String,
    pub count: usize,
    pub impressions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordStat {
    pub query: String,
    pub impressions: u64,
    pub clicks: u64,
    pub position: f64,
    pub ctr: f64,
}

/// Totals fed into the multi-sheet analysis workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SummaryStats {
    pub total_queries: usize,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub avg_position: f64,
    pub avg_ctr: f64,
    pub opportunities: usize,
    pub matched_queries: usize,
    pub unmatched_queries: usize,
    pub improvement_suggestions: usize,
    pub new_content_clusters: usize,
    pub opportunities_by_position: Vec<PositionBucket>,
    pub top_keywords: Vec<KeywordStat>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Page scraping
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    #[default]
    Success,
    Timeout,
    Error,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Success => "success",
            ScrapeStatus::Timeout => "timeout",
            ScrapeStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => ScrapeStatus::Success,
            "timeout" => ScrapeStatus::Timeout,
            _ => ScrapeStatus::Error,
        }
    }
}

/// SEO metadata extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PageSeoData {
    pub url: String,
    pub status: ScrapeStatus,
    pub title: String,
    pub meta_description: String,
    pub h1: String,
    pub canonical_url: String,
    pub og_title: String,
    pub og_description: String,
    pub twitter_title: String,
    pub twitter_description: String,
    /// ISO 639-3 code of the detected page language, empty when unknown.
    pub language: String,
    pub error: String,
}

impl PageSeoData {
    pub fn failed(url: &str, status: ScrapeStatus, error: &str) -> Self {
        Self {
            url: url.to_string(),
            status,
            error: error.chars().take(200).collect(),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Synonyms & generated articles
// ─────────────────────────────────────────────────────────────────────────────

/// Eight spelling / synonym categories for one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SynonymSet {
    pub persian_synonyms: Vec<String>,
    pub finglish_standard: Vec<String>,
    pub english_keyboard_typing: Vec<String>,
    pub colloquial_abbreviations: Vec<String>,
    pub common_misspellings: Vec<String>,
    pub english_equivalents: Vec<String>,
    pub abbreviations: Vec<String>,
    pub related_terms: Vec<String>,
}

impl SynonymSet {
    /// Category name / values pairs in output column order.
    pub fn categories(&self) -> [(&'static str, &Vec<String>); 8] {
        [
            ("persian_synonyms", &self.persian_synonyms),
            ("finglish_standard", &self.finglish_standard),
            ("english_keyboard_typing", &self.english_keyboard_typing),
            ("colloquial_abbreviations", &self.colloquial_abbreviations),
            ("common_misspellings", &self.common_misspellings),
            ("english_equivalents", &self.english_equivalents),
            ("abbreviations", &self.abbreviations),
            ("related_terms", &self.related_terms),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymRow {
    pub keyword: String,
    pub synonyms: SynonymSet,
}

/// A fully assembled article from the content generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeneratedArticle {
    pub topic: String,
    pub seo_title: String,
    pub meta_description: String,
    pub headings: Vec<String>,
    pub html: String,
    pub word_count: usize,
    pub internal_links: usize,
    pub model: String,
}
