/// End-to-end content optimization over a Search Console workbook, with the
/// AI provider replaced by a canned client.
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_xlsxwriter::Workbook;
use seo_scout::cli::ScriptedPrompter;
use seo_scout::export::excel::{read_seo_data, write_seo_data, ExcelWriter};
use seo_scout::export::read_first_sheet;
use seo_scout::llm::{prompts, AiProcessor, ChatRequest, LlmClient};
use seo_scout::workflows::content::process_file;
use seo_scout::{AppConfig, AppState, PageSeoData, ScrapeStatus, SeoResult};
use serde_json::json;

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

struct CannedAi {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for CannedAi {
    async fn complete(&self, req: &ChatRequest) -> SeoResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = if req.system.as_deref() == Some(prompts::CLUSTER_SYSTEM) {
            json!({
                "clusters": [{
                    "main_topic": "لپ تاپ",
                    "keywords": ["قیمت لپ تاپ ایسوس", "بهترین لپ تاپ دانشجویی"],
                    "article_title": "راهنمای خرید لپ تاپ دانشجویی",
                    "h2_headings": ["بررسی قیمت", "مقایسه مدل‌ها", "جمع‌بندی"],
                    "content_type": "راهنما",
                    "search_intent": "تجاری",
                    "recommended_word_count": 1800
                }]
            })
        } else {
            json!({
                "primary_improvements": ["افزودن جدول مقایسه"],
                "keyword_strategy": {"primary_keywords": ["گوشی سامسونگ"]}
            })
        };
        Ok(format!("```json\n{}\n```", reply))
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

fn write_search_console(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, h) in ["Query", "Clicks", "Impressions", "CTR", "Position"]
        .iter()
        .enumerate()
    {
        sheet.write_string(0, col as u16, *h).unwrap();
    }
    let rows: [(&str, f64, f64, f64, f64); 5] = [
        ("خرید گوشی سامسونگ", 5.0, 400.0, 0.0125, 14.2),
        ("قیمت لپ تاپ ایسوس", 3.0, 300.0, 0.01, 18.0),
        ("بهترین لپ تاپ دانشجویی", 1.0, 250.0, 0.004, 22.0),
        ("گوشی", 100.0, 5000.0, 0.2, 2.0),
        ("کم نمایش", 0.0, 5.0, 0.0, 30.0),
    ];
    for (i, (query, clicks, impressions, ctr, position)) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, *query).unwrap();
        sheet.write_number(r, 1, *clicks).unwrap();
        sheet.write_number(r, 2, *impressions).unwrap();
        sheet.write_number(r, 3, *ctr).unwrap();
        sheet.write_number(r, 4, *position).unwrap();
    }
    workbook.save(path).unwrap();
}

#[tokio::test]
async fn test_process_search_console_file() {
    init_logger();
    let root = tempfile::tempdir().unwrap();
    let output = root.path().join("output");
    let kb_dir = root.path().join("kb");
    let input = root.path().join("gsc.xlsx");
    write_search_console(&input);

    let yaml = format!(
        "app:\n  output_directory: \"{}\"\n  knowledge_base_directory: \"{}\"\n  min_position: 10\n  min_impressions: 10\n  top_clusters: 5\n  duplicate_threshold: 0.85\n  max_headings_per_article: 8\n",
        output.display(),
        kb_dir.display()
    );
    let cfg = AppConfig::from_yaml_str(&yaml).unwrap();
    let state = AppState::new(cfg, Arc::new(ScriptedPrompter::default()))
        .with_project_name(Some("shop.ir".into()));
    let mut kb = state.open_knowledge_base("shop.ir").unwrap();

    let canned = Arc::new(CannedAi {
        calls: AtomicUsize::new(0),
    });
    let processor = AiProcessor::new(canned.clone());
    let writer = ExcelWriter::new(state.output_dir(), 8).unwrap();
    let sitemap = vec![
        "https://shop.ir/mobile/خرید-گوشی-سامسونگ".to_string(),
        "https://shop.ir/about".to_string(),
    ];

    println!("\n🧪 Content pipeline on {}", input.display());
    let report = process_file(&state, &processor, &writer, &mut kb, &input, &sitemap)
        .await
        .unwrap();
    println!("📊 Report: {:?}", report);
    assert_eq!(report.improvements, 1, "❌ FAIL: one page should get improvements");
    assert_eq!(report.new_content, 1, "❌ FAIL: one new-content cluster expected");
    assert_eq!(canned.calls.load(Ordering::SeqCst), 2);

    let improvements = read_first_sheet(&output.join("improvements_gsc.xlsx")).unwrap();
    assert_eq!(improvements.headers[0], "آدرس صفحه");
    assert_eq!(improvements.rows.len(), 1);
    let row = &improvements.rows[0];
    assert_eq!(improvements.text(row, 0), sitemap[0]);
    assert_eq!(improvements.text(row, 1), "خرید گوشی سامسونگ");
    assert_eq!(improvements.text(row, 4), "• افزودن جدول مقایسه");
    assert_eq!(improvements.text(row, 5), "گوشی سامسونگ");

    let new_content = read_first_sheet(&output.join("new_content_gsc.xlsx")).unwrap();
    assert_eq!(new_content.headers.len(), 6 + 3, "❌ FAIL: three heading columns expected");
    assert_eq!(new_content.headers[6], "هدینگ H2 شماره 1");
    let row = &new_content.rows[0];
    assert_eq!(new_content.text(row, 0), "راهنمای خرید لپ تاپ دانشجویی");
    assert_eq!(new_content.text(row, 5), "1800");
    assert_eq!(new_content.text(row, 8), "جمع‌بندی");

    assert!(output.join("analysis_gsc.xlsx").exists());

    let stats = kb.statistics();
    assert_eq!(stats.total_content_suggestions, 1);
    assert_eq!(stats.total_keyword_clusters, 1);
    assert_eq!(stats.total_improvements_tracked, 1);
    assert_eq!(stats.metadata.total_analyses, 1);

    // A second pass over the same data finds the cluster in the knowledge base.
    let mut kb = state.open_knowledge_base("shop.ir").unwrap();
    let report = process_file(&state, &processor, &writer, &mut kb, &input, &sitemap)
        .await
        .unwrap();
    assert_eq!(report.new_content, 0, "❌ FAIL: known cluster suggested again");
    assert_eq!(report.improvements, 1);
    assert_eq!(kb.statistics().metadata.total_analyses, 2);
}

#[tokio::test]
async fn test_missing_columns_are_reported() {
    init_logger();
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("bad.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Query").unwrap();
    sheet.write_string(0, 1, "Clicks").unwrap();
    workbook.save(&input).unwrap();

    let err = seo_scout::export::search_console::load_search_console_data(&input).unwrap_err();
    println!("⚠️  {}", err);
    let msg = err.to_string();
    assert!(msg.contains("Impressions"));
    assert!(msg.contains("Position"));
}

#[test]
fn test_seo_data_workbook_reloads() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("seo_data_shop.ir.xlsx");
    let rows = vec![
        PageSeoData {
            url: "https://shop.ir/a".into(),
            status: ScrapeStatus::Success,
            title: "خرید گوشی".into(),
            meta_description: "بهترین قیمت".into(),
            h1: "گوشی".into(),
            canonical_url: "/a".into(),
            language: "pes".into(),
            ..Default::default()
        },
        PageSeoData::failed("https://shop.ir/b", ScrapeStatus::Timeout, "Request timeout after 30s"),
    ];
    write_seo_data(&rows, &path).unwrap();
    let loaded = read_seo_data(&path).unwrap();
    assert_eq!(loaded, rows);
}
