//! Spelling variants and synonyms for Persian keywords.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::cli::progress_bar;
use crate::core::error::SeoResult;
use crate::core::types::{SynonymRow, SynonymSet};
use crate::export::{excel, read_first_sheet};
use crate::llm::processor::parse_json_reply;
use crate::llm::prompts;
use crate::llm::provider::{ChatRequest, LlmClient};

/// Key a Persian letter sits on in the standard Persian layout, if any.
fn qwerty_key(ch: char) -> Option<char> {
    let key = match ch {
        'ض' => 'q',
        'ص' => 'w',
        'ث' => 'e',
        'ق' => 'r',
        'ف' => 't',
        'غ' => 'y',
        'ع' => 'u',
        'ه' => 'i',
        'خ' => 'o',
        'ح' => 'p',
        'ج' => '[',
        'چ' => ']',
        'ش' => 'a',
        'س' => 's',
        'ی' | 'ي' => 'd',
        'ب' => 'f',
        'ل' => 'g',
        'ا' => 'h',
        'ت' => 'j',
        'ن' => 'k',
        'م' => 'l',
        'ک' | 'ك' => ';',
        'گ' => '\'',
        'ظ' => 'z',
        'ط' => 'x',
        'ز' => 'c',
        'ر' => 'v',
        'ذ' => 'b',
        'د' => 'n',
        'پ' => 'm',
        'و' => ',',
        'آ' => 'H',
        'ژ' => 'C',
        '\u{200c}' => 'B',
        '۰'..='۹' => char::from_digit(ch as u32 - '۰' as u32, 10)?,
        _ => return None,
    };
    Some(key)
}

/// What a keyword looks like when typed with the keyboard left on English.
///
/// Characters without a Persian key (spaces, Latin letters) pass through.
pub fn persian_to_qwerty(text: &str) -> String {
    text.chars().map(|c| qwerty_key(c).unwrap_or(c)).collect()
}

fn has_persian_letters(text: &str) -> bool {
    text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c))
}

/// Parse a (possibly fenced) JSON reply. Anything unparsable is all-empty.
pub fn parse_synonyms(reply: &str) -> SynonymSet {
    match parse_json_reply(reply).and_then(|v| Ok(serde_json::from_value::<SynonymSet>(v)?)) {
        Ok(set) => set,
        Err(e) => {
            error!("    ❌ Failed to parse synonyms JSON: {}", e);
            SynonymSet::default()
        }
    }
}

pub struct SynonymFinder {
    client: Arc<dyn LlmClient>,
}

impl SynonymFinder {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        info!("✅ Synonym finder initialized ({})", client.model_name());
        Self { client }
    }

    /// Ask the model for all eight variant categories of `keyword`.
    pub async fn find_synonyms(&self, keyword: &str) -> SeoResult<SynonymSet> {
        info!("  🔍 Finding synonyms for: {}", keyword);
        let req = ChatRequest::new(prompts::synonym_prompt(keyword))
            .system(prompts::SYNONYM_SYSTEM)
            .temperature(0.5)
            .max_tokens(2000);
        let reply = self.client.complete(&req).await?;
        let mut set = parse_synonyms(&reply);

        // The layout mapping is deterministic; make sure it is in the list.
        if has_persian_letters(keyword) {
            let typed = persian_to_qwerty(keyword);
            if !set.english_keyboard_typing.contains(&typed) {
                set.english_keyboard_typing.insert(0, typed);
            }
        }

        let total: usize = set.categories().iter().map(|(_, v)| v.len()).sum();
        info!("    ✅ Found {} total variations", total);
        Ok(set)
    }

    /// Find synonyms for the first-column keyword of every row of `path` and
    /// write `synonyms_{stem}.xlsx` into `output_dir`.
    pub async fn process_excel_file(&self, path: &Path, output_dir: &Path) -> Result<PathBuf> {
        let table = read_first_sheet(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        info!(
            "📊 Read {} keywords from {}",
            table.rows.len(),
            path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        );

        let pb = progress_bar(table.rows.len() as u64, "Processing keywords");
        let mut rows = Vec::with_capacity(table.rows.len());
        for (idx, row) in table.rows.iter().enumerate() {
            pb.inc(1);
            let keyword = table.text(row, 0).trim().to_string();
            if keyword.is_empty() {
                warn!("  Row {}: empty keyword, skipping", idx + 1);
                continue;
            }
            let synonyms = match self.find_synonyms(&keyword).await {
                Ok(s) => s,
                Err(e) => {
                    error!("  Row {} failed: {}", idx + 1, e);
                    SynonymSet::default()
                }
            };
            rows.push(SynonymRow { keyword, synonyms });
        }
        pb.finish_and_clear();

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "keywords".to_string());
        let out = output_dir.join(format!("synonyms_{}.xlsx", stem));
        excel::write_synonyms(&rows, &out)?;
        info!("✅ Saved synonyms: {}", out.display());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persian_to_qwerty() {
        assert_eq!(persian_to_qwerty("گوشی"), "',ad");
        assert_eq!(persian_to_qwerty("سلام"), "sghl");
        assert_eq!(persian_to_qwerty("آب ۱۲"), "Hf 12");
        assert_eq!(persian_to_qwerty("abc"), "abc");
    }

    #[test]
    fn test_parse_synonyms_fills_missing_categories() {
        let set = parse_synonyms(
            "```json\n{\"persian_synonyms\": [\"تلفن\"], \"english_equivalents\": [\"phone\"]}\n```",
        );
        assert_eq!(set.persian_synonyms, vec!["تلفن"]);
        assert_eq!(set.english_equivalents, vec!["phone"]);
        assert!(set.abbreviations.is_empty());

        let empty = parse_synonyms("no json here");
        assert_eq!(empty, SynonymSet::default());
    }
}
