use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use percent_encoding::percent_decode_str;
use tracing::info;

use crate::core::types::{
    KeywordStat, MatchedQuery, PositionBucket, QueryRow, ScoredQuery, SummaryStats, UrlGroup,
};

/// Finds Search Console queries that rank beyond page one and scores them.
pub struct Analyzer {
    min_position: f64,
}

impl Analyzer {
    pub fn new(min_position: f64) -> Self {
        Self { min_position }
    }

    /// Queries ranking worse than `min_position`, by impressions descending.
    pub fn identify_opportunities(&self, rows: &[QueryRow]) -> Vec<QueryRow> {
        let mut out: Vec<QueryRow> = rows
            .iter()
            .filter(|r| r.position > self.min_position)
            .cloned()
            .collect();
        // Stable sort keeps input order among equal impressions.
        out.sort_by(|a, b| b.impressions.cmp(&a.impressions));
        info!(
            "Found {} queries with position > {}",
            out.len(),
            self.min_position
        );
        out
    }

    /// Weighted score: 0.4 impressions, 0.3 closeness to page one, 0.3 CTR gap.
    pub fn calculate_opportunity_score(&self, rows: Vec<QueryRow>) -> Vec<ScoredQuery> {
        if rows.is_empty() {
            return Vec::new();
        }

        let max_impr = rows.iter().map(|r| r.impressions).max().unwrap_or(0);
        let raw_pos: Vec<f64> = rows.iter().map(|r| raw_position_score(r.position)).collect();
        let max_pos = raw_pos.iter().cloned().fold(f64::MIN, f64::max);
        let gaps: Vec<f64> = rows
            .iter()
            .map(|r| (expected_ctr_for_position(r.position) - r.ctr).max(0.0))
            .collect();
        let max_gap = gaps.iter().cloned().fold(0.0, f64::max);

        let mut scored: Vec<ScoredQuery> = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let impressions_score = if max_impr > 0 {
                    row.impressions as f64 / max_impr as f64
                } else {
                    0.0
                };
                let position_score = if max_pos > 0.0 {
                    raw_pos[i] / max_pos
                } else {
                    0.0
                };
                let ctr_gap_score = if max_gap > 0.0 { gaps[i] / max_gap } else { 0.0 };
                ScoredQuery {
                    row,
                    impressions_score,
                    position_score,
                    ctr_gap_score,
                    opportunity_score: impressions_score * 0.4
                        + position_score * 0.3
                        + ctr_gap_score * 0.3,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.opportunity_score
                .partial_cmp(&a.opportunity_score)
                .unwrap_or(Ordering::Equal)
        });
        scored
    }

    pub fn filter_high_potential_queries(
        &self,
        rows: Vec<ScoredQuery>,
        min_impressions: u64,
    ) -> Vec<ScoredQuery> {
        let filtered: Vec<ScoredQuery> = rows
            .into_iter()
            .filter(|q| q.row.impressions >= min_impressions)
            .collect();
        info!(
            "Filtered to {} high-potential queries (min impressions: {})",
            filtered.len(),
            min_impressions
        );
        filtered
    }

    /// Attribute queries to sitemap URLs by word overlap with the URL path.
    ///
    /// Returns `(matched, unmatched)`, both in input order.
    pub fn match_queries_to_urls(
        &self,
        rows: Vec<ScoredQuery>,
        sitemap_urls: &[String],
    ) -> (Vec<MatchedQuery>, Vec<ScoredQuery>) {
        let url_words: Vec<(&String, HashSet<String>)> = sitemap_urls
            .iter()
            .map(|u| (u, path_words(u)))
            .filter(|(_, words)| !words.is_empty())
            .collect();

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();

        for q in rows {
            let query_words: HashSet<String> = q
                .row
                .query
                .to_lowercase()
                .replace('-', " ")
                .split_whitespace()
                .map(str::to_string)
                .collect();

            let mut best: Option<(&String, f64)> = None;
            if !query_words.is_empty() {
                for (url, words) in &url_words {
                    let common = query_words.intersection(words).count();
                    let score = common as f64 / query_words.len() as f64;
                    let best_score = best.map(|(_, s)| s).unwrap_or(0.0);
                    if score > 0.5 && score > best_score {
                        best = Some((url, score));
                    }
                }
            }

            match best {
                Some((url, score)) => matched.push(MatchedQuery {
                    query: q,
                    matched_url: url.clone(),
                    match_score: score,
                }),
                None => unmatched.push(q),
            }
        }

        info!("Matched {} queries to existing URLs", matched.len());
        info!(
            "Found {} queries without matching URLs (new content opportunities)",
            unmatched.len()
        );
        (matched, unmatched)
    }

    /// Group matched queries by URL (URLs sorted, keywords in input order).
    pub fn group_by_url(&self, matched: &[MatchedQuery]) -> Vec<UrlGroup> {
        let mut groups: BTreeMap<&str, Vec<&MatchedQuery>> = BTreeMap::new();
        for m in matched {
            groups.entry(m.matched_url.as_str()).or_default().push(m);
        }
        groups
            .into_iter()
            .map(|(url, items)| {
                let positions: f64 = items.iter().map(|m| m.query.row.position).sum();
                UrlGroup {
                    url: url.to_string(),
                    keywords: items.iter().map(|m| m.query.row.query.clone()).collect(),
                    avg_position: positions / items.len() as f64,
                    total_impressions: items.iter().map(|m| m.query.row.impressions).sum(),
                }
            })
            .collect()
    }

    /// Totals, position buckets and the top 20 keywords for the analysis report.
    pub fn summary_stats(
        &self,
        rows: &[QueryRow],
        opportunities: &[ScoredQuery],
        matched: usize,
        unmatched: usize,
    ) -> SummaryStats {
        let n = rows.len();
        let mean = |f: &dyn Fn(&QueryRow) -> f64| {
            if n == 0 {
                0.0
            } else {
                rows.iter().map(f).sum::<f64>() / n as f64
            }
        };

        let buckets: [(&str, f64, f64); 4] = [
            ("11-20", 10.0, 20.0),
            ("21-30", 20.0, 30.0),
            ("31-50", 30.0, 50.0),
            ("50+", 50.0, f64::INFINITY),
        ];
        let opportunities_by_position = buckets
            .iter()
            .map(|(label, lo, hi)| {
                let in_bucket: Vec<&ScoredQuery> = opportunities
                    .iter()
                    .filter(|q| q.row.position > *lo && q.row.position <= *hi)
                    .collect();
                PositionBucket {
                    range: label.to_string(),
                    count: in_bucket.len(),
                    impressions: in_bucket.iter().map(|q| q.row.impressions).sum(),
                }
            })
            .collect();

        let mut top: Vec<&QueryRow> = opportunities.iter().map(|q| &q.row).collect();
        top.sort_by(|a, b| b.impressions.cmp(&a.impressions));
        let top_keywords = top
            .into_iter()
            .take(20)
            .map(|r| KeywordStat {
                query: r.query.clone(),
                impressions: r.impressions,
                clicks: r.clicks,
                position: r.position,
                ctr: r.ctr,
            })
            .collect();

        SummaryStats {
            total_queries: n,
            total_impressions: rows.iter().map(|r| r.impressions).sum(),
            total_clicks: rows.iter().map(|r| r.clicks).sum(),
            avg_position: mean(&|r| r.position),
            avg_ctr: mean(&|r| r.ctr),
            opportunities: opportunities.len(),
            matched_queries: matched,
            unmatched_queries: unmatched,
            improvement_suggestions: 0,
            new_content_clusters: 0,
            opportunities_by_position,
            top_keywords,
        }
    }
}

/// Benchmark CTR by ranking position.
pub fn expected_ctr_for_position(position: f64) -> f64 {
    if position <= 1.0 {
        0.30
    } else if position <= 3.0 {
        0.15
    } else if position <= 5.0 {
        0.08
    } else if position <= 10.0 {
        0.05
    } else if position <= 20.0 {
        0.02
    } else {
        0.01
    }
}

fn raw_position_score(position: f64) -> f64 {
    let denom = position - 10.0 + 1.0;
    if denom <= 0.0 {
        1.0
    } else {
        1.0 / denom
    }
}

/// Lowercased, percent-decoded path words of a URL (`-` and `/` split words).
fn path_words(url: &str) -> HashSet<String> {
    let path = match url::Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => return HashSet::new(),
    };
    let decoded = percent_decode_str(&path).decode_utf8_lossy().to_lowercase();
    decoded
        .trim_matches('/')
        .replace(['-', '/'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(q: &str, impressions: u64, ctr: f64, position: f64) -> QueryRow {
        QueryRow {
            query: q.to_string(),
            clicks: 0,
            impressions,
            ctr,
            position,
        }
    }

    #[test]
    fn test_identify_opportunities_filters_and_sorts() {
        let a = Analyzer::new(10.0);
        let rows = vec![
            row("a", 5, 0.0, 3.0),
            row("b", 50, 0.0, 15.0),
            row("c", 100, 0.0, 10.0),
            row("d", 80, 0.0, 25.0),
        ];
        let out = a.identify_opportunities(&rows);
        let names: Vec<&str> = out.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(names, vec!["d", "b"]);
    }

    #[test]
    fn test_expected_ctr_table() {
        assert_eq!(expected_ctr_for_position(1.0), 0.30);
        assert_eq!(expected_ctr_for_position(2.5), 0.15);
        assert_eq!(expected_ctr_for_position(5.0), 0.08);
        assert_eq!(expected_ctr_for_position(9.9), 0.05);
        assert_eq!(expected_ctr_for_position(20.0), 0.02);
        assert_eq!(expected_ctr_for_position(35.0), 0.01);
    }

    #[test]
    fn test_opportunity_score_weights() {
        let a = Analyzer::new(10.0);
        // Position 11 → raw 1.0 (max); position 21 → 1/12.
        let scored = a.calculate_opportunity_score(vec![
            row("near", 100, 0.0, 11.0),
            row("far", 50, 0.01, 21.0),
        ]);
        assert_eq!(scored[0].row.query, "near");
        // near: 0.4*1 + 0.3*1 + 0.3*(0.02/0.02) = 1.0
        assert!((scored[0].opportunity_score - 1.0).abs() < 1e-9);
        // far: impressions 0.5, position (1/12)/1, ctr gap 0 → 0.2 + 0.025
        assert!((scored[1].opportunity_score - (0.2 + 0.3 / 12.0)).abs() < 1e-9);
    }

    #[test]
    fn test_opportunity_score_zero_impressions_and_no_gap() {
        let a = Analyzer::new(10.0);
        let scored = a.calculate_opportunity_score(vec![row("x", 0, 0.5, 15.0)]);
        assert_eq!(scored[0].impressions_score, 0.0);
        assert_eq!(scored[0].ctr_gap_score, 0.0);
        assert!((scored[0].opportunity_score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_position_guard_for_low_min_position() {
        let a = Analyzer::new(5.0);
        let scored = a.calculate_opportunity_score(vec![row("x", 10, 0.0, 8.0)]);
        assert!(scored[0].position_score.is_finite());
        assert!((scored[0].position_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_match_queries_to_urls() {
        let a = Analyzer::new(10.0);
        let urls = vec![
            "https://example.com/blog/python-tutorial/".to_string(),
            "https://example.com/rust-book".to_string(),
        ];
        let rows = vec![
            ScoredQuery::unscored(row("python tutorial", 10, 0.0, 12.0)),
            ScoredQuery::unscored(row("golang tips", 10, 0.0, 12.0)),
            ScoredQuery::unscored(row("Rust-Book online", 10, 0.0, 12.0)),
        ];
        let (matched, unmatched) = a.match_queries_to_urls(rows, &urls);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].matched_url, urls[0]);
        assert!((matched[0].match_score - 1.0).abs() < 1e-9);
        // "rust book online" → 2/3 common
        assert_eq!(matched[1].matched_url, urls[1]);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].row.query, "golang tips");
    }

    #[test]
    fn test_match_requires_more_than_half() {
        let a = Analyzer::new(10.0);
        let urls = vec!["https://example.com/python".to_string()];
        let rows = vec![ScoredQuery::unscored(row("learn python", 10, 0.0, 12.0))];
        let (matched, unmatched) = a.match_queries_to_urls(rows, &urls);
        assert!(matched.is_empty());
        assert_eq!(unmatched.len(), 1);
    }

    #[test]
    fn test_match_persian_slug() {
        let a = Analyzer::new(10.0);
        let urls = vec![
            "https://example.ir/%D8%AE%D8%B1%DB%8C%D8%AF-%DA%A9%D9%81%D8%B4".to_string(),
        ];
        let rows = vec![ScoredQuery::unscored(row("خرید کفش", 10, 0.0, 12.0))];
        let (matched, _) = a.match_queries_to_urls(rows, &urls);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn test_tie_keeps_first_url() {
        let a = Analyzer::new(10.0);
        let urls = vec![
            "https://example.com/a/seo-guide".to_string(),
            "https://example.com/b/seo-guide".to_string(),
        ];
        let rows = vec![ScoredQuery::unscored(row("seo guide", 10, 0.0, 12.0))];
        let (matched, _) = a.match_queries_to_urls(rows, &urls);
        assert_eq!(matched[0].matched_url, urls[0]);
    }

    #[test]
    fn test_group_by_url_and_summary() {
        let a = Analyzer::new(10.0);
        let mk = |q: &str, url: &str, impr: u64, pos: f64| MatchedQuery {
            query: ScoredQuery::unscored(row(q, impr, 0.0, pos)),
            matched_url: url.to_string(),
            match_score: 1.0,
        };
        let matched = vec![
            mk("k1", "https://x.com/b", 10, 12.0),
            mk("k2", "https://x.com/a", 20, 14.0),
            mk("k3", "https://x.com/b", 30, 20.0),
        ];
        let groups = a.group_by_url(&matched);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].url, "https://x.com/a");
        assert_eq!(groups[1].keywords, vec!["k1", "k3"]);
        assert_eq!(groups[1].total_impressions, 40);
        assert!((groups[1].avg_position - 16.0).abs() < 1e-9);

        let rows = vec![row("k1", 10, 0.0, 12.0), row("k4", 5, 0.0, 60.0)];
        let opps: Vec<ScoredQuery> = rows.iter().cloned().map(ScoredQuery::unscored).collect();
        let stats = a.summary_stats(&rows, &opps, 1, 1);
        assert_eq!(stats.total_impressions, 15);
        assert_eq!(stats.opportunities_by_position[0].count, 1);
        assert_eq!(stats.opportunities_by_position[3].count, 1);
        assert_eq!(stats.top_keywords[0].query, "k1");
    }
}
