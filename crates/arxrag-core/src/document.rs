use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of leading body characters that take part in a document's identity.
pub const IDENTITY_BODY_CHARS: usize = 100;

/// A single row returned by a nearest-neighbor query, in ascending distance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub category: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// A retrieved document. Immutable once it leaves the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub category: String,
    #[serde(rename = "abstract")]
    pub body: String,
}

/// Dedup identity: the title plus the first [`IDENTITY_BODY_CHARS`] characters of the body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentity {
    title: String,
    body_prefix: String,
}

impl Document {
    pub fn new(
        title: impl Into<String>,
        category: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            body: body.into(),
        }
    }

    /// Identity pair used by [`dedupe`]. Counts characters, not bytes, so a
    /// multi-byte body is never split mid-codepoint.
    pub fn identity(&self) -> DocumentIdentity {
        DocumentIdentity {
            title: self.title.clone(),
            body_prefix: self.body.chars().take(IDENTITY_BODY_CHARS).collect(),
        }
    }
}

impl From<SearchResult> for Document {
    fn from(row: SearchResult) -> Self {
        Self {
            title: row.title,
            category: row.category,
            body: row.abstract_text,
        }
    }
}

/// Order-stable deduplication: keeps the first occurrence of each identity
/// and drops later ones, preserving the relative order of survivors.
pub fn dedupe(documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert(doc.identity()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, body: &str) -> Document {
        Document::new(title, "cs.LG", body)
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence_order() {
        let input = vec![doc("A", "t1"), doc("B", "t2"), doc("A", "t1")];
        let out = dedupe(input);
        assert_eq!(out, vec![doc("A", "t1"), doc("B", "t2")]);
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let input = vec![
            doc("A", "t1"),
            doc("B", "t2"),
            doc("A", "t1"),
            doc("C", "t3"),
            doc("B", "t2"),
        ];
        let once = dedupe(input);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_identity_ignores_category() {
        let a = Document::new("Same", "math.PR", "body");
        let b = Document::new("Same", "stat.ML", "body");
        assert_eq!(dedupe(vec![a.clone(), b]), vec![a]);
    }

    #[test]
    fn test_identity_uses_only_body_prefix() {
        let prefix = "x".repeat(IDENTITY_BODY_CHARS);
        let a = doc("T", &format!("{prefix} first tail"));
        let b = doc("T", &format!("{prefix} second tail"));
        let out = dedupe(vec![a.clone(), b]);
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn test_identity_prefix_counts_chars() {
        let body: String = "é".repeat(IDENTITY_BODY_CHARS + 5);
        let d = doc("T", &body);
        let id = d.identity();
        assert_eq!(id.body_prefix.chars().count(), IDENTITY_BODY_CHARS);
    }

    #[test]
    fn test_same_body_different_title_is_distinct() {
        let out = dedupe(vec![doc("A", "shared"), doc("B", "shared")]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_dedupe_empty() {
        assert!(dedupe(Vec::new()).is_empty());
    }

    #[test]
    fn test_search_result_into_document() {
        let row = SearchResult {
            title: "Brownian motion".into(),
            category: "math.PR".into(),
            abstract_text: "We study...".into(),
        };
        let d: Document = row.into();
        assert_eq!(d.body, "We study...");
        assert_eq!(d.category, "math.PR");
    }

    #[test]
    fn test_document_serializes_body_as_abstract() {
        let d = doc("T", "body text");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["abstract"], "body text");
        assert!(json.get("body").is_none());
    }
}
