// src/report/citations.rs — Citation assembly
//
// Items keep their aggregator order. Exact-URL duplicates across sources
// collapse to the first occurrence and never consume an id; there is no
// content-similarity dedup. Ids are 1-based with no gaps.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retrieval::RetrievalItem;

/// A numbered, caller-facing reference to one retrieved item.
/// Ids are stable only within one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: usize,
    pub source: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub snippet: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Drop items whose exact URL already appeared earlier in the sequence.
/// Items without a URL are always kept.
pub fn dedup_by_url(items: Vec<RetrievalItem>) -> Vec<RetrievalItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| match &item.url {
            Some(url) => seen.insert(url.clone()),
            None => true,
        })
        .collect()
}

/// Assign sequential ids and produce the deduplicated source-label set.
/// Labels keep first-occurrence order; only uniqueness is guaranteed.
pub fn assemble(items: &[RetrievalItem], snippet_max_chars: usize) -> (Vec<Citation>, Vec<String>) {
    let mut citations = Vec::new();
    let mut labels: Vec<String> = Vec::new();
    let mut seen_urls = HashSet::new();
    let mut seen_labels = HashSet::new();

    for item in items {
        if let Some(url) = &item.url {
            if !seen_urls.insert(url.clone()) {
                continue;
            }
        }

        citations.push(Citation {
            id: citations.len() + 1,
            source: item.origin.clone(),
            url: item.url.clone(),
            title: item.title.clone(),
            snippet: truncate_snippet(&item.content, snippet_max_chars),
            timestamp: item.published_at,
        });

        if !item.origin.is_empty() && seen_labels.insert(item.origin.clone()) {
            labels.push(item.origin.clone());
        }
    }

    (citations, labels)
}

/// Truncate on a char boundary, appending an ellipsis marker only when
/// content was dropped.
fn truncate_snippet(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut out: String = content.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::SourceKind;

    fn item(content: &str, origin: &str, url: Option<&str>) -> RetrievalItem {
        RetrievalItem {
            kind: SourceKind::Web,
            content: content.into(),
            origin: origin.into(),
            url: url.map(str::to_string),
            title: None,
            published_at: None,
            score: None,
        }
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let items = vec![
            item("a", "s1", Some("https://a")),
            item("b", "s2", Some("https://b")),
            item("c", "s3", None),
        ];
        let (citations, _) = assemble(&items, 200);

        let ids: Vec<usize> = citations.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_urls_collapse_without_consuming_an_id() {
        let items = vec![
            item("first", "s1", Some("https://same")),
            item("second", "s2", Some("https://same")),
            item("third", "s3", Some("https://other")),
        ];
        let (citations, _) = assemble(&items, 200);

        assert_eq!(citations.len(), 2);
        // First occurrence wins
        assert_eq!(citations[0].snippet, "first");
        // No gap: the later item gets id 2, not 3
        assert_eq!(citations[1].id, 2);
        assert_eq!(citations[1].url.as_deref(), Some("https://other"));
    }

    #[test]
    fn test_items_without_urls_never_collapse() {
        let items = vec![item("a", "s", None), item("a", "s", None)];
        let (citations, _) = assemble(&items, 200);
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn test_long_snippet_truncated_with_ellipsis() {
        let long = "x".repeat(250);
        let (citations, _) = assemble(&[item(&long, "s", None)], 200);

        assert_eq!(citations[0].snippet.chars().count(), 203);
        assert!(citations[0].snippet.ends_with("..."));
    }

    #[test]
    fn test_short_snippet_untouched() {
        let (citations, _) = assemble(&[item("short text", "s", None)], 200);
        assert_eq!(citations[0].snippet, "short text");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let content = "é".repeat(210);
        let (citations, _) = assemble(&[item(&content, "s", None)], 200);
        assert!(citations[0].snippet.starts_with('é'));
        assert!(citations[0].snippet.ends_with("..."));
    }

    #[test]
    fn test_source_labels_are_deduplicated() {
        let items = vec![
            item("a", "example.com", Some("https://a")),
            item("b", "example.com", Some("https://b")),
            item("c", "feed", None),
        ];
        let (_, labels) = assemble(&items, 200);
        assert_eq!(labels, vec!["example.com".to_string(), "feed".to_string()]);
    }

    #[test]
    fn test_dedup_by_url_keeps_first_occurrence() {
        let items = vec![
            item("first", "s1", Some("https://same")),
            item("second", "s2", Some("https://same")),
            item("bare", "s3", None),
        ];
        let deduped = dedup_by_url(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].content, "first");
        assert_eq!(deduped[1].content, "bare");
    }
}
