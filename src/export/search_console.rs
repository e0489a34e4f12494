//! Google Search Console performance export loader.

use std::path::{Path, PathBuf};

use calamine::Data;
use tracing::info;

use crate::core::error::{SeoError, SeoResult};
use crate::core::types::QueryRow;
use crate::export::{cell_number, cell_text, read_first_sheet};

const REQUIRED: [&str; 5] = ["Query", "Clicks", "Impressions", "CTR", "Position"];

fn alternatives(canonical: &str) -> &'static [&'static str] {
    match canonical {
        "Query" => &["query", "top queries", "top query", "search query", "keyword"],
        "Clicks" => &["clicks", "click"],
        "Impressions" => &["impressions", "impression"],
        "CTR" => &["ctr", "click-through rate", "clickthrough rate"],
        "Position" => &[
            "position",
            "avg position",
            "average position",
            "avg. position",
        ],
        _ => &[],
    }
}

/// Map each required column to a header index.
///
/// Exact canonical names win; otherwise the first header matching the name or
/// one of its alternatives case-insensitively is used.
fn map_columns(headers: &[String]) -> SeoResult<[usize; 5]> {
    let mut found = [usize::MAX; 5];
    let mut missing = Vec::new();

    for (slot, canonical) in REQUIRED.iter().enumerate() {
        if let Some(idx) = headers.iter().position(|h| h == canonical) {
            found[slot] = idx;
            continue;
        }
        let alts = alternatives(canonical);
        let lower_canonical = canonical.to_lowercase();
        match headers.iter().position(|h| {
            let lower = h.to_lowercase();
            alts.contains(&lower.as_str()) || lower == lower_canonical
        }) {
            Some(idx) => found[slot] = idx,
            None => missing.push(canonical.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(SeoError::MissingColumns {
            missing,
            available: headers.to_vec(),
        });
    }
    Ok(found)
}

/// CTR cells may be fractions (`0.032`) or percent strings (`"3.2%"`).
fn parse_ctr(cell: &Data) -> f64 {
    if let Data::String(s) = cell {
        let t = s.trim();
        if let Some(pct) = t.strip_suffix('%') {
            return pct.trim().parse::<f64>().map(|v| v / 100.0).unwrap_or(0.0);
        }
    }
    cell_number(cell).unwrap_or(0.0)
}

fn parse_count(cell: &Data) -> u64 {
    cell_number(cell).map(|v| v.max(0.0) as u64).unwrap_or(0)
}

/// Load a Search Console export (first worksheet).
pub fn load_search_console_data(path: &Path) -> SeoResult<Vec<QueryRow>> {
    info!("Loading Search Console data from {}", path.display());
    let table = read_first_sheet(path)?;
    let [q, c, i, ctr, pos] = map_columns(&table.headers)?;

    let empty = Data::Empty;
    let rows: Vec<QueryRow> = table
        .rows
        .iter()
        .filter_map(|r| {
            let query = r.get(q).map(cell_text).unwrap_or_default();
            if query.trim().is_empty() {
                return None;
            }
            Some(QueryRow {
                query,
                clicks: parse_count(r.get(c).unwrap_or(&empty)),
                impressions: parse_count(r.get(i).unwrap_or(&empty)),
                ctr: parse_ctr(r.get(ctr).unwrap_or(&empty)),
                position: r.get(pos).and_then(cell_number).unwrap_or(0.0),
            })
        })
        .collect();

    info!(
        "✅ Loaded {} queries from Search Console data",
        rows.len()
    );
    Ok(rows)
}

/// Copy `name.ext` to `name_backup.ext` next to it.
pub fn create_backup(path: &Path) -> SeoResult<PathBuf> {
    if !path.exists() {
        return Err(SeoError::NotFound(path.to_path_buf()));
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_backup.{}", stem, ext.to_string_lossy()),
        None => format!("{}_backup", stem),
    };
    let backup = path.with_file_name(name);
    std::fs::copy(path, &backup)?;
    info!("Created backup: {}", backup.display());
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_map_columns_with_alternatives() {
        let h = headers(&["Top queries", "Clicks", "Impressions", "CTR", "Avg. Position"]);
        assert_eq!(map_columns(&h).unwrap(), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_exact_name_wins_over_alternative() {
        let h = headers(&["keyword", "Query", "clicks", "impressions", "ctr", "position"]);
        let m = map_columns(&h).unwrap();
        assert_eq!(m[0], 1);
    }

    #[test]
    fn test_missing_columns_reported() {
        let h = headers(&["Query", "Clicks"]);
        match map_columns(&h).unwrap_err() {
            SeoError::MissingColumns { missing, available } => {
                assert_eq!(missing, vec!["Impressions", "CTR", "Position"]);
                assert_eq!(available.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_ctr_percent_string() {
        assert!((parse_ctr(&Data::String("3.2%".into())) - 0.032).abs() < 1e-9);
        assert!((parse_ctr(&Data::Float(0.05)) - 0.05).abs() < 1e-9);
        assert_eq!(parse_ctr(&Data::String("n/a".into())), 0.0);
    }

    #[test]
    fn test_create_backup_missing_file() {
        let err = create_backup(Path::new("/no/such/file.xlsx")).unwrap_err();
        assert!(matches!(err, SeoError::NotFound(_)));
    }
}
