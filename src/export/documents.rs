//! Word and HTML export of generated articles.
//!
//! HTML output is editor-ready: no doctype, `<html>`, `<head>` or `<body>`.
//! Word output converts the article block by block with `docx-rs`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use docx_rs::{Docx, Paragraph, Run, Style, StyleType};
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{error, info, warn};

use crate::cli::{progress_bar, RULE};
use crate::core::error::{SeoError, SeoResult};
use crate::core::types::GeneratedArticle;

static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>").expect("static doctype regex"));
static HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head[^>]*>.*?</head>").expect("static head regex"));
static WRAPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(html|body)[^>]*>").expect("static wrapper regex")
});
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static blank-line regex"));
static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static filename regex"));
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("static separator regex"));

/// Strip document-level tags and collapse runs of blank lines.
pub fn clean_html_for_editor(html: &str) -> String {
    let html = DOCTYPE_RE.replace_all(html, "");
    let html = HEAD_RE.replace_all(&html, "");
    let html = WRAPPER_RE.replace_all(&html, "");
    BLANK_LINES_RE.replace_all(&html, "\n\n").trim().to_string()
}

/// File-name fragment from a title: word characters, spaces and dashes only,
/// separators collapsed to `-`, at most 50 characters.
pub fn safe_file_stem(title: &str) -> String {
    let cleaned = UNSAFE_CHARS_RE.replace_all(title, "");
    SEPARATOR_RE
        .replace_all(&cleaned, "-")
        .chars()
        .take(50)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML → blocks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Level is already capped at 3.
    Heading(u8, String),
    Paragraph(Vec<Span>),
    ListItem { marker: String, text: String },
    Text(String),
}

fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}

fn element_text(el: ElementRef) -> String {
    collapse_ws(&el.text().collect::<String>()).trim().to_string()
}

fn collect_spans(el: ElementRef, bold: bool, italic: bool, out: &mut Vec<Span>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let text = collapse_ws(text);
            if !text.is_empty() {
                out.push(Span { text, bold, italic });
            }
        } else if let Some(inner) = ElementRef::wrap(child) {
            let name = inner.value().name();
            if name == "br" {
                out.push(Span { text: " ".into(), bold, italic });
                continue;
            }
            let bold = bold || matches!(name, "strong" | "b");
            let italic = italic || matches!(name, "em" | "i");
            collect_spans(inner, bold, italic, out);
        }
    }
}

/// Trim the outer edges of a span list and drop spans left empty.
fn trim_spans(mut spans: Vec<Span>) -> Vec<Span> {
    if let Some(first) = spans.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = spans.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
    spans.retain(|s| !s.text.is_empty());
    spans
}

fn push_blocks(el: ElementRef, out: &mut Vec<Block>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let text = collapse_ws(text).trim().to_string();
            if !text.is_empty() {
                out.push(Block::Text(text));
            }
            continue;
        }
        let Some(inner) = ElementRef::wrap(child) else {
            continue;
        };
        match inner.value().name() {
            name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                let level = name[1..].parse::<u8>().unwrap_or(1).min(3);
                let text = element_text(inner);
                if !text.is_empty() {
                    out.push(Block::Heading(level, text));
                }
            }
            "p" => {
                let mut spans = Vec::new();
                collect_spans(inner, false, false, &mut spans);
                let spans = trim_spans(spans);
                if !spans.is_empty() {
                    out.push(Block::Paragraph(spans));
                }
            }
            list @ ("ul" | "ol") => {
                let ordered = list == "ol";
                let items = inner
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|li| li.value().name() == "li");
                for (i, li) in items.enumerate() {
                    let marker = if ordered {
                        format!("{}.", i + 1)
                    } else {
                        "•".to_string()
                    };
                    out.push(Block::ListItem {
                        marker,
                        text: element_text(li),
                    });
                }
            }
            "div" | "section" | "article" | "main" | "body" | "html" => push_blocks(inner, out),
            "script" | "style" | "head" => {}
            _ => {
                let text = element_text(inner);
                if !text.is_empty() {
                    out.push(Block::Text(text));
                }
            }
        }
    }
}

/// Split article HTML into Word-sized blocks. Entities are decoded and
/// comments dropped by the parser.
pub fn html_to_blocks(html: &str) -> Vec<Block> {
    let fragment = Html::parse_fragment(html);
    let mut blocks = Vec::new();
    push_blocks(fragment.root_element(), &mut blocks);
    blocks
}

// ─────────────────────────────────────────────────────────────────────────────
// Exporter
// ─────────────────────────────────────────────────────────────────────────────

fn heading_style(id: &str, name: &str, size: usize) -> Style {
    Style::new(id, StyleType::Paragraph).name(name).size(size).bold()
}

fn heading(text: &str, level: u8) -> Paragraph {
    Paragraph::new()
        .style(&format!("Heading{}", level))
        .add_run(Run::new().add_text(text))
}

fn labeled(label: &str, value: &str) -> Paragraph {
    Paragraph::new()
        .add_run(Run::new().add_text(label).bold())
        .add_run(Run::new().add_text(value))
}

fn block_paragraph(block: &Block) -> Paragraph {
    match block {
        Block::Heading(level, text) => heading(text, *level),
        Block::Paragraph(spans) => spans.iter().fold(Paragraph::new(), |p, span| {
            let mut run = Run::new().add_text(&span.text);
            if span.bold {
                run = run.bold();
            }
            if span.italic {
                run = run.italic();
            }
            p.add_run(run)
        }),
        Block::ListItem { marker, text } => {
            Paragraph::new().add_run(Run::new().add_text(format!("{} {}", marker, text)))
        }
        Block::Text(text) => Paragraph::new().add_run(Run::new().add_text(text)),
    }
}

/// Files produced by [`DocumentExporter::export_batch`].
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub word_files: Vec<PathBuf>,
    pub html_files: Vec<PathBuf>,
    pub errors: Vec<String>,
}

pub struct DocumentExporter {
    output_dir: PathBuf,
}

impl DocumentExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> SeoResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        info!("✅ Document exporter ready: {}", output_dir.display());
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `{name}.html` with the cleaned article body only.
    pub fn export_html(&self, _title: &str, _meta: &str, html: &str, name: &str) -> SeoResult<PathBuf> {
        let path = self.output_dir.join(format!("{}.html", name));
        std::fs::write(&path, clean_html_for_editor(html))?;
        info!("✅ Created HTML file: {}", path.display());
        Ok(path)
    }

    /// Write `{name}.docx`: SEO information header, separator, then the article.
    pub fn export_word(&self, title: &str, meta: &str, html: &str, name: &str) -> SeoResult<PathBuf> {
        let mut docx = Docx::new()
            .add_style(heading_style("Heading1", "Heading 1", 32))
            .add_style(heading_style("Heading2", "Heading 2", 28))
            .add_style(heading_style("Heading3", "Heading 3", 24))
            .add_paragraph(heading("SEO Information", 1))
            .add_paragraph(labeled("Title: ", title))
            .add_paragraph(labeled("Meta Description: ", meta))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("_".repeat(60))))
            .add_paragraph(heading("Content", 1));
        for block in html_to_blocks(html) {
            docx = docx.add_paragraph(block_paragraph(&block));
        }

        let path = self.output_dir.join(format!("{}.docx", name));
        let file = std::fs::File::create(&path)?;
        docx.build()
            .pack(file)
            .map_err(|e| SeoError::Document(format!("{}: {}", path.display(), e)))?;
        info!("✅ Created Word document: {}", path.display());
        Ok(path)
    }

    /// Export every article with content to Word and HTML. Failures are
    /// collected per file.
    pub fn export_batch(&self, articles: &[GeneratedArticle], base: &str) -> ExportSummary {
        let mut summary = ExportSummary::default();
        println!("\n{}", RULE);
        println!("📄 Exporting Content to Word & HTML");
        println!("{}\n", RULE);

        let pb = progress_bar(articles.len() as u64, "Exporting files");
        for (idx, article) in articles.iter().enumerate() {
            pb.inc(1);
            if article.html.trim().is_empty() {
                warn!("Row {}: no content to export, skipping", idx + 1);
                continue;
            }
            let title = if article.seo_title.is_empty() {
                format!("Content {}", idx + 1)
            } else {
                article.seo_title.clone()
            };
            let name = format!("{}_{}_{}", base, idx + 1, safe_file_stem(&title));

            match self.export_word(&title, &article.meta_description, &article.html, &name) {
                Ok(p) => summary.word_files.push(p),
                Err(e) => {
                    error!("Word export failed for row {}: {}", idx + 1, e);
                    summary.errors.push(format!("Row {} Word: {}", idx + 1, e));
                }
            }
            match self.export_html(&title, &article.meta_description, &article.html, &name) {
                Ok(p) => summary.html_files.push(p),
                Err(e) => {
                    error!("HTML export failed for row {}: {}", idx + 1, e);
                    summary.errors.push(format!("Row {} HTML: {}", idx + 1, e));
                }
            }
        }
        pb.finish_and_clear();

        println!("\n{}", RULE);
        println!("✅ Export Complete!");
        println!("{}", RULE);
        println!("   📝 Word files: {}", summary.word_files.len());
        println!("   🌐 HTML files: {}", summary.html_files.len());
        if !summary.errors.is_empty() {
            println!("   ⚠️  Errors: {}", summary.errors.len());
        }
        println!("   📁 Output directory: {}", self.output_dir.display());
        println!("{}\n", RULE);
        summary
    }
}
