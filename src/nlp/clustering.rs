//! Keyword clustering helpers.
//!
//! The AI produces the primary clusters; `cluster_locally` is the offline
//! fallback (TF-IDF over word 1–3-grams, cosine similarity, density-based
//! grouping). The rest of this module enriches clusters with Search Console
//! metrics and filters them for output.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::core::types::{AiCluster, ContentCluster, QueryRow};
use crate::features::knowledge_base::KnowledgeBase;
use crate::llm::processor::apply_cluster_defaults;

const MAX_FEATURES: usize = 1000;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("static token regex"));

/// Common English function words skipped before n-gram construction.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn ngrams(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for n in 1..=3 {
        if tokens.len() < n {
            break;
        }
        for w in tokens.windows(n) {
            out.push(w.join(" "));
        }
    }
    out
}

/// L2-normalised TF-IDF vectors (sparse) with smoothed idf.
fn tfidf_vectors(docs: &[String]) -> Vec<HashMap<usize, f64>> {
    let grams: Vec<Vec<String>> = docs.iter().map(|d| ngrams(&tokenize(d))).collect();

    // Corpus-wide term frequency decides which features survive the cap.
    let mut corpus_tf: BTreeMap<&str, usize> = BTreeMap::new();
    let mut df: HashMap<&str, usize> = HashMap::new();
    for g in &grams {
        let mut seen = std::collections::HashSet::new();
        for term in g {
            *corpus_tf.entry(term.as_str()).or_default() += 1;
            if seen.insert(term.as_str()) {
                *df.entry(term.as_str()).or_default() += 1;
            }
        }
    }
    let mut ranked: Vec<(&str, usize)> = corpus_tf.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.truncate(MAX_FEATURES);
    let vocab: HashMap<&str, usize> = ranked
        .iter()
        .enumerate()
        .map(|(i, (t, _))| (*t, i))
        .collect();

    let n = docs.len() as f64;
    grams
        .iter()
        .map(|g| {
            let mut v: HashMap<usize, f64> = HashMap::new();
            for term in g {
                if let Some(&idx) = vocab.get(term.as_str()) {
                    *v.entry(idx).or_default() += 1.0;
                }
            }
            for (idx, val) in v.iter_mut() {
                let term = ranked[*idx].0;
                let d = df.get(term).copied().unwrap_or(0) as f64;
                *val *= ((1.0 + n) / (1.0 + d)).ln() + 1.0;
            }
            let norm = v.values().map(|x| x * x).sum::<f64>().sqrt();
            if norm > 0.0 {
                v.values_mut().for_each(|x| *x /= norm);
            }
            v
        })
        .collect()
}

fn cosine(a: &HashMap<usize, f64>, b: &HashMap<usize, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(k, x)| large.get(k).map(|y| x * y))
        .sum()
}

/// Density-based labelling over a precomputed distance matrix.
/// Returns `-1` for noise, otherwise cluster ids in discovery order.
fn dbscan(dist: &[Vec<f64>], eps: f64, min_samples: usize) -> Vec<i64> {
    let n = dist.len();
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| (0..n).filter(|&j| dist[i][j] <= eps).collect())
        .collect();
    let core: Vec<bool> = neighbors.iter().map(|nb| nb.len() >= min_samples).collect();

    let mut labels = vec![-1i64; n];
    let mut next = 0i64;
    for i in 0..n {
        if labels[i] != -1 || !core[i] {
            continue;
        }
        labels[i] = next;
        let mut stack = vec![i];
        while let Some(p) = stack.pop() {
            if !core[p] {
                continue;
            }
            for &q in &neighbors[p] {
                if labels[q] == -1 {
                    labels[q] = next;
                    stack.push(q);
                }
            }
        }
        next += 1;
    }
    labels
}

/// Group similar queries without the AI.
///
/// Noise points become single-keyword clusters. Output order follows the first
/// appearance of each label in the input.
pub fn cluster_locally(queries: &[String], threshold: f64) -> Vec<Vec<String>> {
    info!("Clustering {} queries locally...", queries.len());
    if queries.len() < 2 {
        return vec![queries.to_vec()];
    }

    let vectors = tfidf_vectors(queries);
    let dist: Vec<Vec<f64>> = (0..vectors.len())
        .map(|i| {
            (0..vectors.len())
                .map(|j| {
                    if i == j {
                        0.0
                    } else {
                        1.0 - cosine(&vectors[i], &vectors[j])
                    }
                })
                .collect()
        })
        .collect();

    let labels = dbscan(&dist, 1.0 - threshold, 2);

    let mut order: Vec<i64> = Vec::new();
    let mut groups: HashMap<i64, Vec<String>> = HashMap::new();
    for (idx, label) in labels.iter().enumerate() {
        if !groups.contains_key(label) {
            order.push(*label);
        }
        groups.entry(*label).or_default().push(queries[idx].clone());
    }

    let mut clusters = Vec::new();
    for label in order {
        let members = groups.remove(&label).unwrap_or_default();
        if label == -1 {
            clusters.extend(members.into_iter().map(|q| vec![q]));
        } else {
            clusters.push(members);
        }
    }
    info!("Created {} clusters locally", clusters.len());
    clusters
}

/// Turn local keyword groups into clusters the rest of the pipeline accepts.
///
/// The first keyword names the cluster; the others double as H2 headings.
pub fn clusters_from_groups(groups: Vec<Vec<String>>) -> Vec<AiCluster> {
    groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|keywords| {
            let title = keywords[0].clone();
            let mut cluster = AiCluster {
                main_topic: title.clone(),
                article_title: title.clone(),
                suggested_title: title,
                h2_headings: keywords.clone(),
                keywords,
                ..Default::default()
            };
            apply_cluster_defaults(&mut cluster);
            cluster
        })
        .collect()
}

/// Attach totals and averages of each cluster's keywords, biggest first.
pub fn merge_clusters_with_metadata(
    ai_clusters: Vec<AiCluster>,
    rows: &[QueryRow],
) -> Vec<ContentCluster> {
    info!("Merging clusters with query metadata...");
    let lookup: HashMap<String, &QueryRow> =
        rows.iter().map(|r| (r.query.to_lowercase(), r)).collect();

    let mut out: Vec<ContentCluster> = ai_clusters
        .into_iter()
        .map(|cluster| {
            let mut total_impressions = 0u64;
            let mut total_clicks = 0u64;
            let mut positions = Vec::new();
            let mut ctrs = Vec::new();
            for kw in &cluster.keywords {
                if let Some(r) = lookup.get(&kw.to_lowercase()) {
                    total_impressions += r.impressions;
                    total_clicks += r.clicks;
                    if r.position > 0.0 {
                        positions.push(r.position);
                    }
                    if r.ctr > 0.0 {
                        ctrs.push(r.ctr);
                    }
                }
            }
            let mean = |v: &[f64]| {
                if v.is_empty() {
                    0.0
                } else {
                    v.iter().sum::<f64>() / v.len() as f64
                }
            };
            let keyword_count = cluster.keywords.len();
            ContentCluster {
                avg_impressions: if keyword_count > 0 {
                    total_impressions as f64 / keyword_count as f64
                } else {
                    0.0
                },
                avg_position: mean(&positions),
                avg_ctr: mean(&ctrs),
                total_impressions,
                total_clicks,
                keyword_count,
                cluster,
            }
        })
        .collect();

    out.sort_by(|a, b| b.total_impressions.cmp(&a.total_impressions));
    info!("Enhanced {} clusters with metadata", out.len());
    out
}

/// Keep clusters with a title, at least one keyword and at least two headings.
pub fn validate_clusters(clusters: Vec<ContentCluster>) -> Vec<ContentCluster> {
    let total = clusters.len();
    let valid: Vec<ContentCluster> = clusters
        .into_iter()
        .filter(|c| {
            let ok = !c.cluster.suggested_title.trim().is_empty()
                && !c.cluster.keywords.is_empty()
                && c.cluster.h2_headings.len() >= 2;
            if !ok {
                warn!("Skipping invalid cluster: {}", c.cluster.main_topic);
            }
            ok
        })
        .collect();
    info!("Validated {} clusters out of {}", valid.len(), total);
    valid
}

pub fn extract_top_clusters(mut clusters: Vec<ContentCluster>, top_n: usize) -> Vec<ContentCluster> {
    clusters.sort_by(|a, b| b.total_impressions.cmp(&a.total_impressions));
    clusters.truncate(top_n);
    clusters
}

/// Remove clusters whose title and keywords the knowledge base already holds.
pub fn drop_known_clusters(
    clusters: Vec<ContentCluster>,
    kb: &KnowledgeBase,
    threshold: f64,
) -> Vec<ContentCluster> {
    let before = clusters.len();
    let kept: Vec<ContentCluster> = clusters
        .into_iter()
        .filter(|c| {
            let dup = kb.is_duplicate_content(c.title(), &c.cluster.keywords, threshold);
            if dup {
                info!("⏭️  Skipping previously generated topic: {}", c.title());
            }
            !dup
        })
        .collect();
    if kept.len() < before {
        info!(
            "Dropped {} clusters already in the knowledge base",
            before - kept.len()
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        assert_eq!(tokenize("How to learn a Rust"), s(&["learn", "rust"]));
        assert_eq!(tokenize("آموزش پایتون"), s(&["آموزش", "پایتون"]));
    }

    #[test]
    fn test_single_query_is_one_cluster() {
        assert_eq!(cluster_locally(&s(&["only"]), 0.7), vec![s(&["only"])]);
        assert_eq!(cluster_locally(&[], 0.7), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_identical_queries_cluster_and_noise_is_singleton() {
        let queries = s(&[
            "python tutorial",
            "cooking pasta recipe",
            "python tutorial",
        ]);
        let clusters = cluster_locally(&queries, 0.7);
        assert_eq!(
            clusters,
            vec![
                s(&["python tutorial", "python tutorial"]),
                s(&["cooking pasta recipe"])
            ]
        );
    }

    #[test]
    fn test_low_threshold_merges_overlapping_queries() {
        let queries = s(&["آموزش پایتون", "آموزش پایتون رایگان", "خرید کفش"]);
        let clusters = cluster_locally(&queries, 0.3);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[1], s(&["خرید کفش"]));
    }

    fn qrow(q: &str, clicks: u64, impressions: u64, ctr: f64, position: f64) -> QueryRow {
        QueryRow {
            query: q.into(),
            clicks,
            impressions,
            ctr,
            position,
        }
    }

    fn ai(title: &str, keywords: &[&str], headings: usize) -> AiCluster {
        AiCluster {
            main_topic: title.into(),
            keywords: s(keywords),
            article_title: title.into(),
            suggested_title: title.into(),
            h2_headings: (0..headings).map(|i| format!("h{i}")).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_clusters_with_metadata() {
        let rows = vec![
            qrow("Alpha", 1, 100, 0.01, 12.0),
            qrow("beta", 2, 50, 0.0, 0.0),
            qrow("gamma", 0, 500, 0.02, 30.0),
        ];
        let merged = merge_clusters_with_metadata(
            vec![ai("ab", &["alpha", "BETA", "missing"], 2), ai("g", &["gamma"], 2)],
            &rows,
        );
        assert_eq!(merged[0].cluster.main_topic, "g");
        let ab = &merged[1];
        assert_eq!(ab.total_impressions, 150);
        assert_eq!(ab.total_clicks, 3);
        assert!((ab.avg_position - 12.0).abs() < 1e-9);
        assert!((ab.avg_ctr - 0.01).abs() < 1e-9);
        assert!((ab.avg_impressions - 50.0).abs() < 1e-9);
        assert_eq!(ab.keyword_count, 3);
    }

    #[test]
    fn test_validate_and_top() {
        let merged = merge_clusters_with_metadata(
            vec![ai("ok", &["a"], 2), ai("", &["b"], 3), ai("few", &["c"], 1)],
            &[],
        );
        let valid = validate_clusters(merged);
        assert_eq!(valid.len(), 1);
        assert_eq!(extract_top_clusters(valid, 0).len(), 0);
    }

    #[test]
    fn test_clusters_from_groups_uses_keywords_as_headings() {
        let c = clusters_from_groups(vec![s(&["a b", "a c"]), vec![]]);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].suggested_title, "a b");
        assert_eq!(c[0].h2_headings.len(), 2);
        assert_eq!(c[0].content_type, "راهنما");
    }
}
