//! Citation extraction for providers that only emit prose.
//!
//! Scan order: Markdown `[title](url)` links first, then bare
//! `http(s)://` URLs, then numbered `[n] ... url` reference lines. URLs are
//! deduplicated on first sight and ranks assigned densely in discovery
//! order.

use crate::RawCitation;
use regex::Regex;
use std::sync::OnceLock;

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\((https?://[^)\s]+)\)").unwrap())
}

fn bare_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).unwrap())
}

fn numbered_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*\[(\d+)\][^\n]*?(https?://\S+)").unwrap())
}

/// Strip punctuation that prose tends to glue onto the end of a URL.
fn trim_url(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?'])
}

pub fn extract_citations(text: &str) -> Vec<RawCitation> {
    let mut citations: Vec<RawCitation> = Vec::new();

    let mut push = |url: &str, title: Option<&str>| {
        let url = trim_url(url);
        if url.is_empty() || citations.iter().any(|c| c.url == url) {
            return;
        }
        citations.push(RawCitation {
            url: url.to_string(),
            title: title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            snippet: None,
            rank: citations.len() as i32 + 1,
        });
    };

    for caps in markdown_link_re().captures_iter(text) {
        push(&caps[2], Some(&caps[1]));
    }

    for m in bare_url_re().find_iter(text) {
        push(m.as_str(), None);
    }

    for caps in numbered_ref_re().captures_iter(text) {
        push(&caps[2], None);
    }

    citations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_links_take_precedence_and_carry_titles() {
        let text = "See [Acme Guide](https://acme.com/guide) and https://other.com/x for more.";
        let citations = extract_citations(text);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].url, "https://acme.com/guide");
        assert_eq!(citations[0].title.as_deref(), Some("Acme Guide"));
        assert_eq!(citations[0].rank, 1);
        assert_eq!(citations[1].url, "https://other.com/x");
        assert_eq!(citations[1].rank, 2);
    }

    #[test]
    fn duplicate_urls_collapse_to_first_seen_rank() {
        let text = "\
https://a.com/page then https://b.com then again https://a.com/page.
[1] Sources - https://a.com/page";
        let citations = extract_citations(text);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].url, "https://a.com/page");
        assert_eq!(citations[0].rank, 1);
        assert_eq!(citations[1].url, "https://b.com");
    }

    #[test]
    fn numbered_references_are_picked_up() {
        let text = "\
Answer text without inline links.

[1] Acme docs https://acme.com/docs
[2] Rival blog https://rival.io/blog";
        let citations = extract_citations(text);
        // The bare-URL pass already finds both; the numbered pass adds nothing new
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].url, "https://acme.com/docs");
        assert_eq!(citations[1].url, "https://rival.io/blog");
    }

    #[test]
    fn trailing_punctuation_is_trimmed() {
        let citations = extract_citations("Check https://acme.com/pricing.");
        assert_eq!(citations[0].url, "https://acme.com/pricing");
    }

    #[test]
    fn plain_text_yields_nothing() {
        assert!(extract_citations("No links in this answer at all.").is_empty());
    }
}
