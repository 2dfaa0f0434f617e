//! Per-stage counts and a descriptive summary of the final item set.

use chrono::{DateTime, Utc};
use itertools::{Itertools, MinMaxResult};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::ScoredItem;

/// How many items each stage removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub collected: usize,
    pub sources_total: usize,
    pub sources_failed: usize,
    pub date_filtered: usize,
    pub low_quality: usize,
    pub exact_duplicates: usize,
    pub near_duplicates: usize,
    pub low_relevance: usize,
    /// Relevant items cut by `top_n`.
    pub beyond_top_n: usize,
    pub final_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceRange {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

/// Breakdown of the final items.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub total_items: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
    /// Items without a company are counted under `unknown`.
    pub by_company: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<RelevanceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<DateTime<Utc>>,
    pub avg_source_reliability: f64,
}

impl CollectionSummary {
    pub fn from_items(items: &[ScoredItem]) -> Self {
        if items.is_empty() {
            return Self::default();
        }
        let n = items.len() as f64;

        let by_source = items
            .iter()
            .map(|s| s.item.source.clone())
            .counts()
            .into_iter()
            .collect();
        let by_kind = items
            .iter()
            .map(|s| s.item.kind.to_string())
            .counts()
            .into_iter()
            .collect();
        let by_company = items
            .iter()
            .map(|s| s.item.company.as_deref().unwrap_or("unknown"))
            .counts()
            .into_iter()
            .map(|(company, n)| (company.to_string(), n))
            .collect();

        let relevance = match items
            .iter()
            .map(|s| s.item.relevance)
            .minmax_by(|a, b| a.total_cmp(b))
        {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(v) => Some((v, v)),
            MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
        }
        .map(|(min, max)| RelevanceRange {
            avg: items.iter().map(|s| s.item.relevance).sum::<f64>() / n,
            max,
            min,
        });

        let (earliest, latest) = match items.iter().filter_map(|s| s.item.published_at).minmax() {
            MinMaxResult::NoElements => (None, None),
            MinMaxResult::OneElement(d) => (Some(d), Some(d)),
            MinMaxResult::MinMax(lo, hi) => (Some(lo), Some(hi)),
        };

        Self {
            total_items: items.len(),
            by_source,
            by_kind,
            by_company,
            relevance,
            earliest,
            latest,
            avg_source_reliability: items.iter().map(|s| s.item.source_reliability).sum::<f64>() / n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateItem, ItemKind, Source, SourceKind};
    use chrono::TimeZone;

    fn scored(source: &str, relevance: f64, day: Option<u32>, kind: ItemKind) -> ScoredItem {
        let src = Source::new(source, SourceKind::Feed, "https://example.com/feed")
            .with_reliability(0.8)
            .with_item_kind(kind);
        let published = day.map(|d| Utc.with_ymd_and_hms(2025, 6, d, 0, 0, 0).unwrap());
        let mut item = CandidateItem::new(&src, "Title", "", &format!("https://example.com/{source}/{relevance}"), published);
        item.relevance = relevance;
        ScoredItem {
            cluster_id: item.id.clone(),
            item,
            fingerprint: String::new(),
            merged_ids: Vec::new(),
            summary: None,
        }
    }

    #[test]
    fn test_summary_of_items() {
        let items = vec![
            scored("TechCrunch", 0.9, Some(10), ItemKind::News),
            scored("TechCrunch", 0.5, None, ItemKind::News),
            scored("arXiv", 0.4, Some(3), ItemKind::Academic),
        ];
        let summary = CollectionSummary::from_items(&items);
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.by_source["TechCrunch"], 2);
        assert_eq!(summary.by_kind["academic"], 1);
        assert_eq!(summary.by_company["unknown"], 3);
        let rel = summary.relevance.unwrap();
        assert_eq!(rel.max, 0.9);
        assert_eq!(rel.min, 0.4);
        assert!((rel.avg - 0.6).abs() < 1e-9);
        assert_eq!(summary.earliest, Some(Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap()));
        assert_eq!(summary.latest, Some(Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap()));
        assert!((summary.avg_source_reliability - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_summary_by_company() {
        let mut items = vec![
            scored("OpenAI Blog", 0.9, Some(10), ItemKind::News),
            scored("TechCrunch", 0.7, Some(11), ItemKind::News),
            scored("TechCrunch", 0.6, Some(12), ItemKind::News),
        ];
        items[0].item.company = Some("OpenAI".to_string());
        items[1].item.company = Some("OpenAI".to_string());
        let summary = CollectionSummary::from_items(&items);
        assert_eq!(summary.by_company.len(), 2);
        assert_eq!(summary.by_company["OpenAI"], 2);
        assert_eq!(summary.by_company["unknown"], 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["by_company"]["OpenAI"], 2);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = CollectionSummary::from_items(&[]);
        assert_eq!(summary.total_items, 0);
        assert!(summary.relevance.is_none());
        assert!(summary.earliest.is_none());
    }
}
