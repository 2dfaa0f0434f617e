//! Exact and near-duplicate removal.
//!
//! Exact duplicates share a fingerprint or a canonical-URL id; the copy
//! collected first survives. Near duplicates are grouped into clusters by the
//! Jaccard similarity of their title words, and each cluster is represented by
//! its most relevant member.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{CandidateItem, ScoredItem};
use crate::utils::{normalize_text, sha256_hex};

/// Deterministic hash of the normalized title and a prefix of the body.
pub fn fingerprint(item: &CandidateItem, body_chars: usize) -> String {
    let title = normalize_text(&item.title);
    let body: String = normalize_text(&item.body).chars().take(body_chars).collect();
    sha256_hex(&format!("{title}\n{body}"))
}

/// An item paired with its fingerprint.
#[derive(Debug, Clone)]
pub struct Fingerprinted {
    pub item: CandidateItem,
    pub fingerprint: String,
}

/// Drop items sharing a fingerprint or id with an earlier-collected item.
///
/// Survivors keep their input order. Returns the survivors and the number of
/// items removed.
pub fn exact_dedup(items: Vec<CandidateItem>, body_chars: usize) -> (Vec<Fingerprinted>, usize) {
    let total = items.len();
    let mut indexed: Vec<(usize, Fingerprinted)> = items
        .into_iter()
        .map(|item| {
            let fingerprint = fingerprint(&item, body_chars);
            Fingerprinted { item, fingerprint }
        })
        .enumerate()
        .collect();

    // Stable, so input order breaks collected_at ties.
    indexed.sort_by_key(|(_, f)| f.item.collected_at);

    let mut seen_fingerprints = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut kept: Vec<(usize, Fingerprinted)> = Vec::with_capacity(total);
    for (index, f) in indexed {
        if seen_fingerprints.contains(&f.fingerprint) || seen_ids.contains(&f.item.id) {
            continue;
        }
        seen_fingerprints.insert(f.fingerprint.clone());
        seen_ids.insert(f.item.id.clone());
        kept.push((index, f));
    }

    kept.sort_by_key(|(index, _)| *index);
    let removed = total - kept.len();
    (kept.into_iter().map(|(_, f)| f).collect(), removed)
}

/// Lower-cased title words with surrounding punctuation removed.
pub fn title_words(title: &str) -> HashSet<String> {
    normalize_text(title)
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two word sets; 0 when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

struct Cluster {
    representative: ScoredItem,
    words: HashSet<String>,
}

/// Fold near-duplicate titles into clusters.
///
/// Items are visited by descending relevance (earlier collected first on
/// ties) and join the first cluster whose representative is more similar than
/// `threshold`. Returns one item per cluster and the number folded away.
pub fn near_dedup(items: Vec<Fingerprinted>, threshold: f64) -> (Vec<ScoredItem>, usize) {
    let mut ordered: Vec<(usize, Fingerprinted)> = items.into_iter().enumerate().collect();
    ordered.sort_by(|(ia, a), (ib, b)| {
        b.item
            .relevance
            .partial_cmp(&a.item.relevance)
            .unwrap_or(Ordering::Equal)
            .then(a.item.collected_at.cmp(&b.item.collected_at))
            .then(ia.cmp(ib))
    });

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut merged = 0usize;
    for (_, f) in ordered {
        let words = title_words(&f.item.title);
        if let Some(cluster) = clusters
            .iter_mut()
            .find(|c| jaccard(&c.words, &words) > threshold)
        {
            cluster.representative.merged_ids.push(f.item.id);
            merged += 1;
            continue;
        }
        let id = f.item.id.clone();
        clusters.push(Cluster {
            representative: ScoredItem {
                item: f.item,
                fingerprint: f.fingerprint,
                cluster_id: id,
                merged_ids: Vec::new(),
                summary: None,
            },
            words,
        });
    }

    (clusters.into_iter().map(|c| c.representative).collect(), merged)
}
