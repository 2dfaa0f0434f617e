//! Keyword relevance heuristic.

/// Score `text` against `topics` in `[0, 1]`.
///
/// A topic contained whole (case-insensitive) earns 2 points, and each of its
/// sub-words longer than two characters earns 1 more. The total is divided by
/// the points all topics together could earn.
pub fn score(text: &str, topics: &[String]) -> f64 {
    let text = text.to_lowercase();
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut earned = 0usize;
    let mut possible = 0usize;
    for topic in topics {
        let topic = topic.trim().to_lowercase();
        if topic.is_empty() {
            continue;
        }
        possible += 2;
        if text.contains(&topic) {
            earned += 2;
        }
        for word in topic.split_whitespace().filter(|w| w.chars().count() > 2) {
            possible += 1;
            if text.contains(word) {
                earned += 1;
            }
        }
    }

    if possible == 0 {
        return 0.0;
    }
    (earned as f64 / possible as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_topic_match_beats_unrelated() {
        let t = topics(&["OpenAI"]);
        let hit = score("OpenAI releases new model", &t);
        let miss = score("Local weather report", &t);
        assert!(hit > 0.0);
        assert!(hit >= miss);
        assert_eq!(hit, 1.0);
        assert_eq!(miss, 0.0);
    }

    #[test]
    fn test_partial_multiword_topic() {
        // "machine learning" can earn 2 + 1 + 1; only "learning" appears.
        let s = score("Deep learning tricks", &topics(&["machine learning"]));
        assert!((s - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_normalized_across_topics() {
        let s = score("Anthropic ships Claude", &topics(&["OpenAI", "Anthropic"]));
        assert!((s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_short_subwords_ignored() {
        // "AI" earns the whole-topic points but no sub-word point.
        let s = score("AI", &topics(&["AI"]));
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(score("", &topics(&["OpenAI"])), 0.0);
        assert_eq!(score("OpenAI", &[]), 0.0);
        assert_eq!(score("OpenAI", &topics(&["  "])), 0.0);
    }

    #[test]
    fn test_score_in_unit_range() {
        let t = topics(&["open source model", "GPU", "chips"]);
        for text in ["open source model GPU chips", "gpu", "nothing", "source"] {
            let s = score(text, &t);
            assert!((0.0..=1.0).contains(&s), "{text}: {s}");
        }
    }
}
