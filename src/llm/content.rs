//! Article generation from a new-content plan workbook.
//!
//! Each plan row holds a topic and its H2 headings. Every heading gets its
//! own body, then an introduction and a conclusion are written around them.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::Regex;
use tracing::{info, warn};

use crate::cli::Prompter;
use crate::core::error::SeoResult;
use crate::core::types::GeneratedArticle;
use crate::export::read_first_sheet;
use crate::llm::prompts;
use crate::llm::provider::{ChatRequest, LlmClient};

/// Header fragment that marks a heading column in plan workbooks.
pub const HEADING_COLUMN_MARKER: &str = "هدینگ H2";
pub const CONCLUSION_HEADING: &str = "نتیجه‌گیری";

pub const MIN_TOTAL_WORDS: u32 = 100;
pub const MIN_HEADING_WORDS: u32 = 50;
/// Rough size of introduction plus conclusion.
const INTRO_CONCLUSION_WORDS: usize = 350;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static tag regex"));

/// One article to write: its topic and H2 headings in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticlePlan {
    pub topic: String,
    pub headings: Vec<String>,
}

/// Read plans: first column is the topic, heading columns are those whose
/// header contains [`HEADING_COLUMN_MARKER`]. Rows without a topic or any
/// heading are skipped.
pub fn read_article_plans(path: &Path) -> SeoResult<Vec<ArticlePlan>> {
    let table = read_first_sheet(path)?;
    info!("📊 Read {} rows from {}", table.rows.len(), path.display());
    let heading_cols: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.contains(HEADING_COLUMN_MARKER))
        .map(|(i, _)| i)
        .collect();

    let mut plans = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let topic = table.text(row, 0).trim().to_string();
        let headings: Vec<String> = heading_cols
            .iter()
            .map(|c| table.text(row, *c).trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if topic.is_empty() || headings.is_empty() {
            warn!("Row {}: no topic or headings, skipping", idx + 2);
            continue;
        }
        plans.push(ArticlePlan { topic, headings });
    }
    Ok(plans)
}

/// SEO title: the topic, cut to 57 characters plus `...` when longer than 60.
pub fn seo_title(topic: &str) -> String {
    if topic.chars().count() <= 60 {
        topic.to_string()
    } else {
        format!("{}...", topic.chars().take(57).collect::<String>())
    }
}

pub fn meta_description(topic: &str) -> String {
    format!("{} - راهنمای کامل", topic).chars().take(160).collect()
}

/// Intro, one `<h2>` section per heading, then the conclusion.
pub fn assemble_article(intro: &str, headings: &[String], bodies: &[String], conclusion: &str) -> String {
    let mut html = format!("{}\n\n", intro);
    for (heading, body) in headings.iter().zip(bodies) {
        html.push_str(&format!("<h2>{}</h2>\n{}\n\n", heading, body));
    }
    html.push_str(&format!("<h2>{}</h2>\n{}", CONCLUSION_HEADING, conclusion));
    html
}

/// Numbered plain-text previews (150 chars) of every section.
pub fn content_preview(headings: &[String], bodies: &[String]) -> String {
    let mut preview = String::new();
    for (i, (heading, body)) in headings.iter().zip(bodies).enumerate() {
        let text = TAG_RE.replace_all(body, "");
        let short = if text.chars().count() > 150 {
            format!("{}...", text.chars().take(150).collect::<String>())
        } else {
            text.to_string()
        };
        preview.push_str(&format!("{}. **{}**: {}\n", i + 1, heading, short));
    }
    preview
}

/// Largest allowance for the current heading that still leaves every later
/// heading its minimum.
fn max_for_heading(remaining: u32, headings_left: usize) -> u32 {
    remaining.saturating_sub(MIN_HEADING_WORDS * (headings_left as u32).saturating_sub(1))
}

/// Ask for the article length and split it across headings.
pub fn ask_word_allocation(prompter: &dyn Prompter, headings: &[String]) -> Result<Vec<u32>> {
    let floor = MIN_TOTAL_WORDS.max(MIN_HEADING_WORDS * headings.len() as u32);
    let total = loop {
        let answer = prompter.input(
            "Total word count for the entire article",
            Some(&floor.max(1500).to_string()),
        )?;
        match answer.trim().parse::<u32>() {
            Ok(n) if n >= floor => break n,
            Ok(_) => println!("❌ Minimum {} words required", floor),
            Err(_) => println!("❌ Please enter a valid number"),
        }
    };
    println!("✅ Total: {} words", total);

    let mut remaining = total;
    let mut allocation = Vec::with_capacity(headings.len());
    for (i, heading) in headings.iter().enumerate() {
        let left = headings.len() - i;
        let suggestion = remaining / left as u32;
        let max = max_for_heading(remaining, left);
        println!("\n[{}/{}] {}", i + 1, headings.len(), heading);
        println!("   Remaining: {} words", remaining);
        let words = loop {
            let answer = prompter.input(
                &format!("   Word count (suggested: {})", suggestion),
                Some(&suggestion.to_string()),
            )?;
            match answer.trim().parse::<u32>() {
                Ok(n) if n > max => println!("   ❌ Exceeds available words ({})", max),
                Ok(n) if n < MIN_HEADING_WORDS => {
                    println!("   ❌ Minimum {} words per heading", MIN_HEADING_WORDS)
                }
                Ok(n) => break n,
                Err(_) => println!("   ❌ Invalid number"),
            }
        };
        remaining -= words;
        allocation.push(words);
        println!("   ✅ Allocated: {} words", words);
    }
    Ok(allocation)
}

pub struct ContentGenerator {
    client: Arc<dyn LlmClient>,
    project_name: String,
}

impl ContentGenerator {
    pub fn new(client: Arc<dyn LlmClient>, project_name: impl Into<String>) -> Self {
        Self {
            client,
            project_name: project_name.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub async fn generate_heading_content(
        &self,
        topic: &str,
        heading: &str,
        headings: &[String],
        words: u32,
        extra_instructions: &str,
    ) -> SeoResult<String> {
        info!(
            "  🤖 Generating content for: {}... ({} words)",
            heading.chars().take(50).collect::<String>(),
            words
        );
        let req = ChatRequest::new(prompts::heading_prompt(
            &self.project_name,
            topic,
            heading,
            headings,
            words,
            extra_instructions,
        ))
        .system(prompts::WRITER_SYSTEM)
        .temperature(0.7)
        .max_tokens(4000);
        self.client.complete(&req).await
    }

    pub async fn generate_introduction(&self, topic: &str, headings: &[String], summary: &str) -> SeoResult<String> {
        info!("  📝 Generating introduction...");
        let req = ChatRequest::new(prompts::intro_prompt(&self.project_name, topic, headings, summary))
            .system(prompts::WRITER_SYSTEM)
            .temperature(0.7)
            .max_tokens(1000);
        self.client.complete(&req).await
    }

    pub async fn generate_conclusion(&self, topic: &str, headings: &[String], summary: &str) -> SeoResult<String> {
        info!("  📝 Generating conclusion...");
        let req = ChatRequest::new(prompts::conclusion_prompt(&self.project_name, topic, headings, summary))
            .system(prompts::WRITER_SYSTEM)
            .temperature(0.7)
            .max_tokens(800);
        self.client.complete(&req).await
    }

    /// Ask the model whether the sections read as one piece. Only logs.
    pub async fn check_harmony(&self, topic: &str, headings: &[String], bodies: &[String]) {
        let req = ChatRequest::new(prompts::harmony_prompt(topic, &content_preview(headings, bodies)))
            .system(prompts::HARMONY_SYSTEM)
            .temperature(0.3)
            .max_tokens(500);
        match self.client.complete(&req).await {
            Ok(verdict) if verdict.trim().eq_ignore_ascii_case("ok") => {
                info!("✅ Content harmony confirmed")
            }
            Ok(verdict) => warn!("⚠️ Harmony note: {}", verdict.trim()),
            Err(e) => warn!("Harmony check failed: {}", e),
        }
    }

    /// Write a whole article. `allocation` holds the words per heading.
    pub async fn generate_article(
        &self,
        plan: &ArticlePlan,
        allocation: &[u32],
        extra_instructions: &str,
    ) -> SeoResult<GeneratedArticle> {
        let mut bodies = Vec::with_capacity(plan.headings.len());
        for (i, (heading, words)) in plan.headings.iter().zip(allocation).enumerate() {
            let body = self
                .generate_heading_content(&plan.topic, heading, &plan.headings, *words, extra_instructions)
                .await?;
            println!(
                "  ✅ [{}/{}] {}...",
                i + 1,
                plan.headings.len(),
                heading.chars().take(40).collect::<String>()
            );
            bodies.push(body);
        }

        let summary = prompts::content_summary(&plan.headings);
        let intro = self.generate_introduction(&plan.topic, &plan.headings, &summary).await?;
        println!("  ✅ Introduction generated");
        let conclusion = self.generate_conclusion(&plan.topic, &plan.headings, &summary).await?;
        println!("  ✅ Conclusion generated");

        println!("\n  🔍 Checking content harmony...");
        self.check_harmony(&plan.topic, &plan.headings, &bodies).await;

        let allocated: u32 = allocation.iter().take(plan.headings.len()).sum();
        Ok(GeneratedArticle {
            topic: plan.topic.clone(),
            seo_title: seo_title(&plan.topic),
            meta_description: meta_description(&plan.topic),
            headings: plan.headings.clone(),
            html: assemble_article(&intro, &plan.headings, &bodies, &conclusion),
            word_count: allocated as usize + INTRO_CONCLUSION_WORDS,
            internal_links: 0,
            model: self.client.model_name().to_string(),
        })
    }
}
