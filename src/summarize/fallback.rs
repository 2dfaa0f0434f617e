//! Deterministic summaries used when the generation service cannot help.
//!
//! An item's fallback is its title, translated through the phrase tables:
//! a whole-title match wins outright, otherwise keywords are substituted
//! longest first. The result is clipped and prefixed, and is never empty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::ScoredItem;
use crate::utils::clip_chars;

const UNTITLED: &str = "(untitled)";

/// Title and keyword substitution tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseTables {
    /// Whole titles mapped to ready-made summaries.
    pub titles: BTreeMap<String, String>,
    /// Keywords replaced inside titles.
    pub keywords: BTreeMap<String, String>,
}

impl Default for PhraseTables {
    fn default() -> Self {
        let keywords = [
            ("AI models", "AIモデル"),
            ("AI search", "AI検索"),
            ("acquisition", "買収"),
            ("startup", "新興企業"),
            ("valuation", "企業価値"),
            ("billion", "億"),
            ("trillion", "兆"),
            ("executives", "経営陣"),
            ("merger", "合併"),
            ("deal", "取引"),
            ("strategy", "戦略"),
            ("talent", "人材"),
            ("study", "研究"),
            ("research reveals", "研究により明らかになった"),
            ("risk", "リスク"),
            ("data", "データ"),
            ("judge", "裁判官"),
            ("productivity", "生産性"),
            ("warned", "警告した"),
            ("explained", "説明した"),
            ("newspapers", "新聞社"),
            ("parent company", "親会社"),
            ("plagiarism", "盗作"),
            ("new way", "新しい方法"),
        ];
        Self {
            titles: BTreeMap::new(),
            keywords: keywords
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl PhraseTables {
    /// Translate a title through the tables.
    pub fn translate(&self, title: &str) -> String {
        let title = title.trim();
        if let Some(phrase) = self.titles.get(title) {
            return phrase.clone();
        }

        let mut keys: Vec<(&String, &String)> = self.keywords.iter().collect();
        keys.sort_by(|(a, _), (b, _)| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

        let mut text = title.to_string();
        for (from, to) in keys {
            if !from.is_empty() {
                text = text.replace(from.as_str(), to);
            }
        }
        text
    }
}

/// Fallback summary for one item, at most `prefix + max_chars` characters.
pub fn item_summary(title: &str, tables: &PhraseTables, prefix: &str, max_chars: usize) -> String {
    let translated = tables.translate(title);
    let body = if translated.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        clip_chars(translated.trim(), max_chars)
    };
    format!("{prefix}{body}")
}

/// Fallback digest naming the top headline and the leading sources.
pub fn digest(items: &[ScoredItem], prefix: &str, max_chars: usize) -> String {
    let Some(top) = items.first() else {
        return format!("{prefix}No notable items this period.");
    };

    let mut sources: Vec<&str> = Vec::new();
    for s in items {
        if !sources.contains(&s.item.source.as_str()) {
            sources.push(&s.item.source);
        }
    }
    sources.truncate(3);

    let text = format!(
        "{} items this period. Top story: {}. Leading sources: {}.",
        items.len(),
        top.item.title,
        sources.join(", ")
    );
    format!("{prefix}{}", clip_chars(&text, max_chars))
}
