//! Citation normalization: merge a provider's raw citation list into the
//! uniform shape the citation record stores.

use aivis_common::types::CompetitorCitation;
use aivis_provider::{ProviderAnswer, RawCitation};
use url::Url;

/// The normalized view of one answer's citations against one project.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCitations {
    pub domain_mentioned: bool,
    pub citation_position: Option<i32>,
    pub citation_context: Option<String>,
    pub competitor_citations: Vec<CompetitorCitation>,
    pub total_sources_cited: i32,
}

/// Extract the registrable host of a URL: lowercase, `www.` stripped.
/// Returns `None` for unparseable URLs, blank hosts and opaque schemes.
pub fn domain_of(raw_url: &str) -> Option<String> {
    let parsed = Url::parse(raw_url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    if host.is_empty() {
        return None;
    }
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Subdomain-inclusive match: `foo.example.com` matches target
/// `example.com`, `notexample.com` does not.
pub fn domain_matches(host: &str, target: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    host == target || host.ends_with(&format!(".{target}"))
}

fn context_of(citation: &RawCitation) -> Option<String> {
    citation
        .snippet
        .clone()
        .or_else(|| citation.title.clone())
        .filter(|s| !s.is_empty())
}

/// Classify every cited URL as self / competitor-or-third-party / unknown,
/// deduplicate by URL keeping the earliest rank, and derive the target's
/// citation position.
pub fn normalize(answer: &ProviderAnswer, primary_domain: &str) -> NormalizedCitations {
    let mut seen_urls: Vec<&str> = Vec::new();
    let mut position: Option<i32> = None;
    let mut context: Option<String> = None;
    let mut target_seen = false;
    let mut unknown_count = 0i32;
    let mut competitors: Vec<CompetitorCitation> = Vec::new();

    for citation in &answer.citations {
        if seen_urls.contains(&citation.url.as_str()) {
            continue;
        }
        seen_urls.push(&citation.url);

        let Some(host) = domain_of(&citation.url) else {
            // Unknown domain: dropped from the citation list, but the
            // provider ranked it as a source so it still counts toward
            // the total
            unknown_count += 1;
            continue;
        };

        if domain_matches(&host, primary_domain) {
            // Further target URLs collapse into the first; position and
            // context stay with the earliest rank
            if !target_seen {
                target_seen = true;
                position = Some(citation.rank);
                context = context_of(citation);
            }
        } else {
            competitors.push(CompetitorCitation {
                domain: host,
                url: citation.url.clone(),
                position: citation.rank,
                context: context_of(citation),
            });
        }
    }

    let total = i32::from(target_seen) + competitors.len() as i32 + unknown_count;

    NormalizedCitations {
        domain_mentioned: target_seen,
        citation_position: position,
        citation_context: context,
        competitor_citations: competitors,
        total_sources_cited: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aivis_common::types::Platform;

    fn answer(citations: Vec<RawCitation>) -> ProviderAnswer {
        ProviderAnswer {
            platform: Platform::Gemini,
            query: "best crm".into(),
            response_text: "Acme.com is a leading provider.".into(),
            citations,
            response_time_ms: 1000,
        }
    }

    fn cite(url: &str, rank: i32) -> RawCitation {
        RawCitation {
            url: url.into(),
            title: None,
            snippet: None,
            rank,
        }
    }

    #[test]
    fn target_and_competitor_split_with_positions() {
        let normalized = normalize(
            &answer(vec![
                cite("https://other.com/x", 1),
                cite("https://www.acme.com/guide", 2),
            ]),
            "acme.com",
        );
        assert!(normalized.domain_mentioned);
        assert_eq!(normalized.citation_position, Some(2));
        assert_eq!(normalized.total_sources_cited, 2);
        assert_eq!(normalized.competitor_citations.len(), 1);
        assert_eq!(normalized.competitor_citations[0].domain, "other.com");
        assert_eq!(normalized.competitor_citations[0].position, 1);
    }

    #[test]
    fn subdomain_counts_as_mention() {
        let normalized = normalize(
            &answer(vec![cite("https://foo.example.com/a", 1)]),
            "example.com",
        );
        assert!(normalized.domain_mentioned);
        assert_eq!(normalized.citation_position, Some(1));
    }

    #[test]
    fn lookalike_host_is_not_a_mention() {
        let normalized = normalize(
            &answer(vec![cite("https://notexample.com/a", 1)]),
            "example.com",
        );
        assert!(!normalized.domain_mentioned);
        assert_eq!(normalized.citation_position, None);
        assert_eq!(normalized.competitor_citations[0].domain, "notexample.com");
    }

    #[test]
    fn duplicate_urls_keep_earliest_rank() {
        let normalized = normalize(
            &answer(vec![
                cite("https://acme.com/a", 1),
                cite("https://acme.com/a", 2),
                cite("https://acme.com/a", 7),
            ]),
            "acme.com",
        );
        assert_eq!(normalized.citation_position, Some(1));
        assert_eq!(normalized.total_sources_cited, 1);
    }

    #[test]
    fn second_target_url_does_not_move_position_or_total() {
        let normalized = normalize(
            &answer(vec![
                cite("https://acme.com/a", 1),
                cite("https://acme.com/b", 2),
                cite("https://rival.io/c", 3),
            ]),
            "acme.com",
        );
        assert_eq!(normalized.citation_position, Some(1));
        // target collapses to one entry; invariant total = 1 + competitors
        assert_eq!(normalized.total_sources_cited, 2);
        assert_eq!(normalized.competitor_citations.len(), 1);
    }

    #[test]
    fn unparseable_urls_drop_from_the_list_but_count_as_sources() {
        let normalized = normalize(
            &answer(vec![cite("not a url", 1), cite("https://acme.com/a", 2)]),
            "acme.com",
        );
        assert!(normalized.domain_mentioned);
        assert_eq!(normalized.citation_position, Some(2));
        assert!(normalized.competitor_citations.is_empty());
        // The provider ranked the opaque entry as a source
        assert_eq!(normalized.total_sources_cited, 2);
    }

    #[test]
    fn duplicate_unparseable_urls_count_once() {
        let normalized = normalize(
            &answer(vec![
                cite("not a url", 1),
                cite("not a url", 2),
                cite("https://rival.io/x", 3),
            ]),
            "acme.com",
        );
        assert_eq!(normalized.total_sources_cited, 2);
        assert_eq!(normalized.competitor_citations.len(), 1);
    }

    #[test]
    fn empty_citation_list_yields_empty_record() {
        let normalized = normalize(&answer(vec![]), "acme.com");
        assert!(!normalized.domain_mentioned);
        assert_eq!(normalized.citation_position, None);
        assert_eq!(normalized.citation_context, None);
        assert_eq!(normalized.total_sources_cited, 0);
    }
}
