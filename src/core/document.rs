//! Request and response shapes exchanged with the serving host.
//!
//! The host generates its wire schema from these types, so their serde layout
//! is the wire layout:
//!
//! - a document set is a plain array of `{ document: { text, title, docid }, score }`
//! - a request is `{ queries: [..], documents: [[..], ..] }`
//! - a prediction is `{ results: [{ sentence, result: [..] }, ..] }`

use serde::{Deserialize, Serialize};

use super::error::{RerankError, Result};

/// A candidate passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub docid: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            docid: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_docid(mut self, docid: impl Into<String>) -> Self {
        self.docid = docid.into();
        self
    }

    /// Text submitted to the scorer for this document.
    ///
    /// Blank titles are skipped even when titles are requested.
    pub fn passage_text(&self, include_title: bool, separator: &str) -> String {
        match self.title.as_deref() {
            Some(title) if include_title && !title.trim().is_empty() => {
                format!("{title}{separator}{}", self.text)
            }
            _ => self.text.clone(),
        }
    }
}

/// A document together with its relevance score.
///
/// Inbound, `score` is a placeholder supplied by the caller. Outbound, it is
/// a fresh record carrying the model's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    pub document: Document,
    #[serde(default)]
    pub score: f32,
}

impl RankedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            score: 0.0,
        }
    }

    pub(crate) fn rescored(&self, score: f32) -> Self {
        Self {
            document: self.document.clone(),
            score,
        }
    }
}

/// The ordered candidate pool for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentSet {
    pub documents: Vec<RankedDocument>,
}

impl DocumentSet {
    pub fn new(documents: Vec<RankedDocument>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedDocument> {
        self.documents.iter()
    }
}

impl From<Vec<RankedDocument>> for DocumentSet {
    fn from(documents: Vec<RankedDocument>) -> Self {
        Self { documents }
    }
}

impl FromIterator<Document> for DocumentSet {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        Self {
            documents: iter.into_iter().map(RankedDocument::new).collect(),
        }
    }
}

/// Inbound rerank request. Queries pair 1:1 with document sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerankRequest {
    pub queries: Vec<String>,
    pub documents: Vec<DocumentSet>,
}

impl RerankRequest {
    pub fn new(queries: Vec<String>, documents: Vec<DocumentSet>) -> Self {
        Self { queries, documents }
    }

    pub fn validate(&self) -> Result<()> {
        check_pairing(self.queries.len(), self.documents.len())
    }
}

pub(crate) fn check_pairing(queries: usize, document_sets: usize) -> Result<()> {
    if queries != document_sets {
        return Err(RerankError::InputShape(format!(
            "{queries} queries but {document_sets} document sets"
        )));
    }
    Ok(())
}

/// Ranked documents for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankPrediction {
    /// Echo of the query.
    pub sentence: String,
    pub result: Vec<RankedDocument>,
}

/// Response for a whole request, one prediction per query in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRerankPrediction {
    pub results: Vec<RerankPrediction>,
}

/// The five reference documents used by the demo client.
pub fn sample_documents() -> DocumentSet {
    let rows = [
        ("A man is eating food.", "A"),
        ("Someone in a gorilla costume is playing a set of drums.", "in"),
        ("A monkey is playing drums.", "is"),
        ("A man is riding a white horse on an enclosed ground.", "riding"),
        ("Two men pushed carts through the woods.", "through"),
    ];
    let documents = rows
        .iter()
        .enumerate()
        .map(|(i, (text, title))| RankedDocument {
            document: Document::new(*text)
                .with_title(*title)
                .with_docid(i.to_string()),
            score: i as f32,
        })
        .collect();
    DocumentSet::new(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_prepended_with_separator() {
        let doc = Document::new("X").with_title("T");
        assert_eq!(doc.passage_text(true, "\n\n"), "T\n\nX");
        assert_eq!(doc.passage_text(false, "\n\n"), "X");
    }

    #[test]
    fn blank_titles_are_ignored() {
        assert_eq!(Document::new("X").with_title("   ").passage_text(true, " | "), "X");
        assert_eq!(Document::new("X").with_title("").passage_text(true, " | "), "X");
        assert_eq!(Document::new("X").passage_text(true, " | "), "X");
    }

    #[test]
    fn document_set_wire_shape_is_a_plain_array() {
        let json = r#"[{"document": {"text": "A man is eating food.", "title": "A", "docid": "0"}, "score": 0}]"#;
        let set: DocumentSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.documents[0].document.docid, "0");
        assert_eq!(set.documents[0].document.title.as_deref(), Some("A"));

        let back = serde_json::to_value(&set).unwrap();
        assert!(back.is_array());
    }

    #[test]
    fn mismatched_request_is_rejected() {
        let request = RerankRequest::new(vec!["q".into()], vec![]);
        assert!(matches!(request.validate(), Err(RerankError::InputShape(_))));
    }

    #[test]
    fn sample_documents_match_reference_titles() {
        let titles: Vec<_> = sample_documents()
            .iter()
            .map(|d| d.document.title.clone().unwrap_or_default())
            .collect();
        assert_eq!(titles, ["A", "in", "is", "riding", "through"]);
    }
}
