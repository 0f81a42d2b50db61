//! Deterministic lexicon-based sentiment plus the response-shape
//! confidence heuristic. Both are pinned by tests, so the rules are exact:
//! sentences are split on runs of `.!?`, only sentences mentioning the
//! tracked domain vote, and ties stay neutral.

use aivis_common::types::Sentiment;

const DEFAULT_POSITIVE: [&str; 7] = [
    "best",
    "excellent",
    "top",
    "recommended",
    "leading",
    "outstanding",
    "superior",
];

const DEFAULT_NEGATIVE: [&str; 6] = ["worst", "poor", "avoid", "bad", "terrible", "disappointing"];

/// Maximum length of a stored response summary.
pub const SUMMARY_MAX_CHARS: usize = 500;
/// A sentence boundary only qualifies once the summary is at least this full.
const SUMMARY_MIN_CHARS: usize = SUMMARY_MAX_CHARS * 7 / 10;

pub struct SentimentAnalyzer {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self {
            positive: DEFAULT_POSITIVE.iter().map(|w| w.to_string()).collect(),
            negative: DEFAULT_NEGATIVE.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl SentimentAnalyzer {
    /// Build with custom lexicons; words are matched lowercased.
    pub fn with_lexicons(positive: Vec<String>, negative: Vec<String>) -> Self {
        Self {
            positive: positive.into_iter().map(|w| w.to_lowercase()).collect(),
            negative: negative.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Sentiment over the sentences of `text` that mention `domain`.
    pub fn analyze(&self, text: &str, domain: &str) -> Sentiment {
        let domain = domain.to_lowercase();
        if domain.is_empty() {
            return Sentiment::Neutral;
        }

        let mentioning: Vec<String> = split_sentences(text)
            .into_iter()
            .map(str::to_lowercase)
            .filter(|s| s.contains(&domain))
            .collect();

        if mentioning.is_empty() {
            return Sentiment::Neutral;
        }

        let mut positive = 0usize;
        let mut negative = 0usize;
        for sentence in &mentioning {
            for word in sentence.split(|c: char| !c.is_alphanumeric()) {
                if word.is_empty() {
                    continue;
                }
                if self.positive.iter().any(|w| w == word) {
                    positive += 1;
                }
                if self.negative.iter().any(|w| w == word) {
                    negative += 1;
                }
            }
        }

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

/// Split on runs of sentence-ending punctuation, keeping non-empty trimmed
/// fragments.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Response-shape confidence in [0, 1]: more citations, a fast answer and a
/// substantial body all add a little.
pub fn confidence_score(citation_count: usize, response_time_ms: i64, text_len: usize) -> f64 {
    let mut score: f64 = 0.5;
    if citation_count >= 5 {
        score += 0.2;
    } else if citation_count >= 3 {
        score += 0.1;
    }
    if response_time_ms < 3000 {
        score += 0.1;
    }
    if text_len > 500 {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

/// Truncate to at most [`SUMMARY_MAX_CHARS`] characters, preferring the
/// last sentence boundary that lands in the final 30% of the budget. With
/// no qualifying boundary the text is hard-cut and elided.
pub fn summarize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SUMMARY_MAX_CHARS {
        return text.to_string();
    }

    // End index (exclusive, in chars) of every sentence-punctuation run
    let mut best_boundary: Option<usize> = None;
    let mut idx = 0;
    while idx < SUMMARY_MAX_CHARS {
        if matches!(chars[idx], '.' | '!' | '?') {
            let mut end = idx + 1;
            while end < SUMMARY_MAX_CHARS && matches!(chars[end], '.' | '!' | '?') {
                end += 1;
            }
            if end >= SUMMARY_MIN_CHARS && end <= SUMMARY_MAX_CHARS {
                best_boundary = Some(end);
            }
            idx = end;
        } else {
            idx += 1;
        }
    }

    match best_boundary {
        Some(end) => chars[..end].iter().collect(),
        None => {
            let mut cut: String = chars[..SUMMARY_MAX_CHARS].iter().collect();
            cut.push_str("...");
            cut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_sentence_about_domain() {
        let analyzer = SentimentAnalyzer::default();
        let sentiment = analyzer.analyze("Acme.com is a leading provider.", "acme.com");
        assert_eq!(sentiment, Sentiment::Positive);
    }

    #[test]
    fn negative_outweighs_positive() {
        let analyzer = SentimentAnalyzer::default();
        let text = "Avoid acme.com, the worst option. Rival.io is the best tool.";
        assert_eq!(analyzer.analyze(text, "acme.com"), Sentiment::Negative);
    }

    #[test]
    fn sentences_not_mentioning_domain_do_not_vote() {
        let analyzer = SentimentAnalyzer::default();
        // "best" appears only in a sentence that never names the domain
        let text = "The best tool overall is rival.io. Acme.com also exists.";
        assert_eq!(analyzer.analyze(text, "acme.com"), Sentiment::Neutral);
    }

    #[test]
    fn no_mentioning_sentences_is_neutral() {
        let analyzer = SentimentAnalyzer::default();
        assert_eq!(
            analyzer.analyze("Nothing about that brand here.", "acme.com"),
            Sentiment::Neutral
        );
    }

    #[test]
    fn tie_is_neutral() {
        let analyzer = SentimentAnalyzer::default();
        let text = "acme.com is the best but has poor support";
        assert_eq!(analyzer.analyze(text, "acme.com"), Sentiment::Neutral);
    }

    #[test]
    fn custom_lexicons_override_defaults() {
        let analyzer =
            SentimentAnalyzer::with_lexicons(vec!["stellar".into()], vec!["meh".into()]);
        assert_eq!(
            analyzer.analyze("acme.com is stellar", "acme.com"),
            Sentiment::Positive
        );
        // default lexicon word no longer counts
        assert_eq!(
            analyzer.analyze("acme.com is the best", "acme.com"),
            Sentiment::Neutral
        );
    }

    #[test]
    fn confidence_components_add_up() {
        assert_eq!(confidence_score(0, 5000, 100), 0.5);
        assert_eq!(confidence_score(3, 5000, 100), 0.6);
        assert_eq!(confidence_score(5, 5000, 100), 0.7);
        assert_eq!(confidence_score(5, 1000, 100), 0.8);
        assert_eq!(confidence_score(5, 1000, 501), 0.9);
        assert!(confidence_score(10, 1, 10_000) <= 1.0);
    }

    #[test]
    fn short_text_is_returned_unchanged() {
        assert_eq!(summarize("Short answer."), "Short answer.");
    }

    #[test]
    fn long_text_cuts_at_late_sentence_boundary() {
        // 400 chars of first sentence, then more text: the boundary at 400
        // sits past the 350-char floor, so the summary ends there.
        let first = "a".repeat(399);
        let text = format!("{first}. {}", "b".repeat(300));
        let summary = summarize(&text);
        assert_eq!(summary.chars().count(), 400);
        assert!(summary.ends_with('.'));
    }

    #[test]
    fn no_qualifying_boundary_hard_truncates() {
        // Only an early boundary (char 100) exists inside the budget
        let text = format!("{}. {}", "a".repeat(99), "b".repeat(900));
        let summary = summarize(&text);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 3);
        assert!(summary.ends_with("..."));
    }
}
