//! Formatted workbook output.
//!
//! Every table gets the same treatment: bold white Arial header on a colored
//! fill, thin borders, wrapped top-aligned Arial 10 data, a frozen header row
//! and an autofilter.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde_json::Value;
use tracing::info;

use crate::core::error::{SeoError, SeoResult};
use crate::core::types::{
    ContentCluster, GeneratedArticle, ImprovementItem, PageSeoData, ScrapeStatus, SummaryStats,
    SynonymRow,
};
use crate::export::read_first_sheet;

pub const IMPROVEMENTS_FILL: u32 = 0x4472C4;
pub const NEW_CONTENT_FILL: u32 = 0x70AD47;

/// Excel refuses longer strings in a cell.
const MAX_CELL_CHARS: usize = 32_000;

pub const SEO_DATA_COLUMNS: [&str; 12] = [
    "url",
    "status",
    "title",
    "meta_description",
    "h1",
    "canonical_url",
    "og_title",
    "og_description",
    "twitter_title",
    "twitter_description",
    "language",
    "error",
];

pub const SYNONYM_HEADERS: [&str; 9] = [
    "کلمه اصلی",
    "مترادف‌های فارسی",
    "فینگلیش",
    "کیبورد انگلیسی",
    "اختصارات عامیانه",
    "غلط‌های املایی",
    "معادل انگلیسی",
    "مخفف‌ها",
    "واژگان مرتبط",
];

pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    fn display_len(&self) -> usize {
        match self {
            Cell::Text(s) => s.chars().count(),
            Cell::Number(n) => n.to_string().len(),
        }
    }
}

fn clip(s: &str) -> String {
    if s.chars().count() > MAX_CELL_CHARS {
        s.chars().take(MAX_CELL_CHARS).collect()
    } else {
        s.to_string()
    }
}

fn header_format(fill: u32) -> Format {
    Format::new()
        .set_font_name("Arial")
        .set_font_size(11)
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(fill))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

fn data_format() -> Format {
    Format::new()
        .set_font_name("Arial")
        .set_font_size(10)
        .set_align(FormatAlign::Top)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

/// Write a header row plus data rows into `sheet` with the shared styling.
pub fn write_table<H: AsRef<str>>(
    sheet: &mut Worksheet,
    headers: &[H],
    rows: &[Vec<Cell>],
    header_fill: u32,
    widths: &[f64],
) -> SeoResult<()> {
    let header_fmt = header_format(header_fill);
    let data_fmt = data_format();

    for (c, h) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, h.as_ref(), &header_fmt)?;
    }
    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(s) => sheet.write_string_with_format(r, c as u16, clip(s), &data_fmt)?,
                Cell::Number(n) => sheet.write_number_with_format(r, c as u16, *n, &data_fmt)?,
            };
        }
    }
    for (c, w) in widths.iter().enumerate() {
        sheet.set_column_width(c as u16, *w)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    if !headers.is_empty() {
        sheet.autofilter(0, 0, rows.len() as u32, (headers.len() - 1) as u16)?;
    }
    Ok(())
}

fn save_single_sheet<H: AsRef<str>>(
    path: &Path,
    sheet_name: Option<&str>,
    headers: &[H],
    rows: &[Vec<Cell>],
    fill: u32,
    widths: &[f64],
) -> SeoResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    if let Some(name) = sheet_name {
        sheet.set_name(name)?;
    }
    write_table(sheet, headers, rows, fill, widths)?;
    workbook.save(path)?;
    Ok(())
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(|x| x.as_array())
        .map(|arr| {
            arr.iter()
                .map(|x| match x {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `recommended_keywords`, or `keyword_strategy.primary_keywords` when absent.
pub fn recommended_keywords(suggestions: &Value) -> Vec<String> {
    let direct = string_list(suggestions.get("recommended_keywords"));
    if !direct.is_empty() {
        return direct;
    }
    string_list(
        suggestions
            .get("keyword_strategy")
            .and_then(|k| k.get("primary_keywords")),
    )
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub struct ExcelWriter {
    output_dir: PathBuf,
    max_headings: usize,
}

impl ExcelWriter {
    pub fn new(output_dir: impl Into<PathBuf>, max_headings: usize) -> SeoResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            max_headings,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn write_existing_content_improvements(
        &self,
        items: &[ImprovementItem],
        filename: &str,
    ) -> SeoResult<PathBuf> {
        info!("Writing existing content improvements to Excel...");
        let headers = [
            "آدرس صفحه",
            "کلیدواژه اصلی",
            "موقعیت فعلی",
            "تعداد نمایش",
            "پیشنهادات بهبود",
            "کلیدواژه‌های پیشنهادی",
        ];
        let rows: Vec<Vec<Cell>> = items
            .iter()
            .map(|item| {
                let improvements = string_list(item.ai_suggestions.get("primary_improvements"))
                    .iter()
                    .map(|s| format!("• {}", s))
                    .collect::<Vec<_>>()
                    .join("\n");
                vec![
                    Cell::text(&item.url),
                    Cell::text(&item.main_keyword),
                    Cell::Number(round1(item.position)),
                    Cell::Number(item.impressions as f64),
                    Cell::Text(improvements),
                    Cell::Text(recommended_keywords(&item.ai_suggestions).join(", ")),
                ]
            })
            .collect();

        let path = self.output_dir.join(filename);
        save_single_sheet(
            &path,
            None,
            &headers,
            &rows,
            IMPROVEMENTS_FILL,
            &[50.0, 30.0, 15.0, 18.0, 60.0, 40.0],
        )?;
        info!("Created: {}", path.display());
        Ok(path)
    }

    /// Number of `هدینگ H2 شماره N` columns for these clusters.
    pub fn heading_columns(&self, clusters: &[ContentCluster]) -> usize {
        let max_actual = clusters
            .iter()
            .map(|c| c.cluster.h2_headings.len())
            .max()
            .unwrap_or(0);
        self.max_headings.min(max_actual)
    }

    pub fn write_new_content_suggestions(
        &self,
        clusters: &[ContentCluster],
        filename: &str,
    ) -> SeoResult<PathBuf> {
        info!("Writing new content suggestions to Excel...");
        let n_headings = self.heading_columns(clusters);
        let mut headers: Vec<String> = [
            "عنوان پیشنهادی مقاله",
            "پیش‌بینی نمایش",
            "کلاستر کلیدواژه اصلی",
            "نوع محتوا",
            "هدف جستجو",
            "تعداد کلمات پیشنهادی",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        headers.extend((1..=n_headings).map(|i| format!("هدینگ H2 شماره {}", i)));

        let rows: Vec<Vec<Cell>> = clusters
            .iter()
            .map(|c| {
                let mut row = vec![
                    Cell::text(c.title()),
                    Cell::Number(c.avg_impressions.trunc()),
                    Cell::Text(
                        c.cluster
                            .keywords
                            .iter()
                            .take(5)
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", "),
                    ),
                    Cell::text(&c.cluster.content_type),
                    Cell::text(&c.cluster.search_intent),
                    Cell::Number(c.cluster.recommended_word_count as f64),
                ];
                row.extend((0..n_headings).map(|i| {
                    Cell::text(c.cluster.h2_headings.get(i).cloned().unwrap_or_default())
                }));
                row
            })
            .collect();

        let mut widths = vec![60.0, 18.0, 50.0, 20.0, 20.0, 20.0];
        widths.extend(std::iter::repeat(40.0).take(n_headings));
        let path = self.output_dir.join(filename);
        save_single_sheet(&path, None, &headers, &rows, NEW_CONTENT_FILL, &widths)?;
        info!("Created: {}", path.display());
        Ok(path)
    }

    /// Summary, By Position and Top Keywords sheets.
    pub fn write_full_analysis_report(&self, stats: &SummaryStats, filename: &str) -> SeoResult<PathBuf> {
        info!("Writing full analysis report to Excel...");
        let path = self.output_dir.join(filename);
        let mut workbook = Workbook::new();

        let summary_headers = [
            "total_queries",
            "total_impressions",
            "total_clicks",
            "avg_position",
            "avg_ctr",
            "opportunities",
            "matched_queries",
            "unmatched_queries",
            "improvement_suggestions",
            "new_content_clusters",
        ];
        let summary_row = vec![vec![
            Cell::Number(stats.total_queries as f64),
            Cell::Number(stats.total_impressions as f64),
            Cell::Number(stats.total_clicks as f64),
            Cell::Number(round1(stats.avg_position)),
            Cell::Number(stats.avg_ctr),
            Cell::Number(stats.opportunities as f64),
            Cell::Number(stats.matched_queries as f64),
            Cell::Number(stats.unmatched_queries as f64),
            Cell::Number(stats.improvement_suggestions as f64),
            Cell::Number(stats.new_content_clusters as f64),
        ]];
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_table(sheet, &summary_headers, &summary_row, IMPROVEMENTS_FILL, &[20.0; 10])?;

        let by_position: Vec<Vec<Cell>> = stats
            .opportunities_by_position
            .iter()
            .map(|b| {
                vec![
                    Cell::text(&b.range),
                    Cell::Number(b.count as f64),
                    Cell::Number(b.impressions as f64),
                ]
            })
            .collect();
        let sheet = workbook.add_worksheet();
        sheet.set_name("By Position")?;
        write_table(
            sheet,
            &["range", "count", "impressions"],
            &by_position,
            IMPROVEMENTS_FILL,
            &[15.0, 12.0, 15.0],
        )?;

        let top: Vec<Vec<Cell>> = stats
            .top_keywords
            .iter()
            .map(|k| {
                vec![
                    Cell::text(&k.query),
                    Cell::Number(k.impressions as f64),
                    Cell::Number(k.clicks as f64),
                    Cell::Number(round1(k.position)),
                    Cell::Number(k.ctr),
                ]
            })
            .collect();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Top Keywords")?;
        write_table(
            sheet,
            &["query", "impressions", "clicks", "position", "ctr"],
            &top,
            IMPROVEMENTS_FILL,
            &[40.0, 15.0, 12.0, 12.0, 12.0],
        )?;

        workbook.save(&path)?;
        info!("Created: {}", path.display());
        Ok(path)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scraper resume file
// ─────────────────────────────────────────────────────────────────────────────

pub fn write_seo_data(rows: &[PageSeoData], path: &Path) -> SeoResult<()> {
    let cells: Vec<Vec<Cell>> = rows
        .iter()
        .map(|r| {
            vec![
                Cell::text(&r.url),
                Cell::text(r.status.as_str()),
                Cell::text(&r.title),
                Cell::text(&r.meta_description),
                Cell::text(&r.h1),
                Cell::text(&r.canonical_url),
                Cell::text(&r.og_title),
                Cell::text(&r.og_description),
                Cell::text(&r.twitter_title),
                Cell::text(&r.twitter_description),
                Cell::text(&r.language),
                Cell::text(&r.error),
            ]
        })
        .collect();
    let widths = [60.0, 10.0, 50.0, 60.0, 40.0, 50.0, 40.0, 50.0, 40.0, 50.0, 10.0, 40.0];
    save_single_sheet(path, None, &SEO_DATA_COLUMNS, &cells, IMPROVEMENTS_FILL, &widths)?;
    info!("Saved {} records to {}", rows.len(), path.display());
    Ok(())
}

/// Read a file written by [`write_seo_data`]. Only the `url` column is required.
pub fn read_seo_data(path: &Path) -> SeoResult<Vec<PageSeoData>> {
    let table = read_first_sheet(path)?;
    let url_col = table.column("url").ok_or_else(|| SeoError::MissingColumns {
        missing: vec!["url".to_string()],
        available: table.headers.clone(),
    })?;
    let col = |name: &str| table.column(name);
    let get = |row: &[calamine::Data], c: Option<usize>| {
        c.map(|c| table.text(row, c).trim().to_string())
            .unwrap_or_default()
    };

    let cols: Vec<Option<usize>> = SEO_DATA_COLUMNS.iter().map(|c| col(c)).collect();
    let mut out = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let url = table.text(row, url_col).trim().to_string();
        if url.is_empty() {
            continue;
        }
        out.push(PageSeoData {
            url,
            status: ScrapeStatus::parse(&get(row, cols[1])),
            title: get(row, cols[2]),
            meta_description: get(row, cols[3]),
            h1: get(row, cols[4]),
            canonical_url: get(row, cols[5]),
            og_title: get(row, cols[6]),
            og_description: get(row, cols[7]),
            twitter_title: get(row, cols[8]),
            twitter_description: get(row, cols[9]),
            language: get(row, cols[10]),
            error: get(row, cols[11]),
        });
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Synonyms & articles
// ─────────────────────────────────────────────────────────────────────────────

/// One row per keyword; column widths follow the longest value (max 60).
pub fn write_synonyms(rows: &[SynonymRow], path: &Path) -> SeoResult<()> {
    let cells: Vec<Vec<Cell>> = rows
        .iter()
        .map(|r| {
            let mut row = vec![Cell::text(&r.keyword)];
            row.extend(
                r.synonyms
                    .categories()
                    .iter()
                    .map(|(_, values)| Cell::Text(values.join(", "))),
            );
            row
        })
        .collect();

    let widths: Vec<f64> = (0..SYNONYM_HEADERS.len())
        .map(|c| {
            let longest = cells
                .iter()
                .filter_map(|r| r.get(c))
                .map(Cell::display_len)
                .chain(std::iter::once(SYNONYM_HEADERS[c].chars().count()))
                .max()
                .unwrap_or(0);
            ((longest + 2).min(60)) as f64
        })
        .collect();
    save_single_sheet(path, Some("Synonyms"), &SYNONYM_HEADERS, &cells, IMPROVEMENTS_FILL, &widths)
}

pub fn write_generated_articles(rows: &[GeneratedArticle], path: &Path) -> SeoResult<()> {
    let headers = [
        "موضوع اصلی",
        "عنوان سئو",
        "توضیحات متا",
        "هدینگ‌ها",
        "تعداد کلمات",
        "لینک‌های داخلی",
        "مدل",
        "محتوای کامل",
    ];
    let cells: Vec<Vec<Cell>> = rows
        .iter()
        .map(|a| {
            vec![
                Cell::text(&a.topic),
                Cell::text(&a.seo_title),
                Cell::text(&a.meta_description),
                Cell::Text(a.headings.join("\n")),
                Cell::Number(a.word_count as f64),
                Cell::Number(a.internal_links as f64),
                Cell::text(&a.model),
                Cell::text(&a.html),
            ]
        })
        .collect();
    save_single_sheet(
        path,
        Some("Articles"),
        &headers,
        &cells,
        NEW_CONTENT_FILL,
        &[40.0, 50.0, 60.0, 50.0, 14.0, 14.0, 20.0, 100.0],
    )?;
    info!("Saved {} article(s) to {}", rows.len(), path.display());
    Ok(())
}
