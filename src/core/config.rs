use serde::{Deserialize, Serialize};

use super::error::{RerankError, Result};

/// Module-level reranking defaults.
///
/// Every field can be overridden for a single call through [`RerankOptions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Maximum documents returned per query. Zero or negative keeps all of them.
    pub max_num_documents: i64,
    /// Prepend the document title to its text when the title is not blank.
    pub include_title: bool,
    /// Token cap for queries, markers included.
    pub query_maxlen: usize,
    /// Token cap for documents, markers included.
    pub doc_maxlen: usize,
    /// Sub-batch size used when encoding documents. Zero disables chunking.
    pub doc_batch_size: usize,
    /// Placed between title and text when titles are included.
    pub title_separator: String,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            max_num_documents: 180,
            include_title: false,
            query_maxlen: 32,
            doc_maxlen: 180,
            doc_batch_size: 128,
            title_separator: "\n\n".to_string(),
        }
    }
}

/// Room for `[CLS]`, the segment marker, `[SEP]` and at least one content token.
const MIN_SEQUENCE_LEN: usize = 4;

impl RerankConfig {
    pub fn validate(&self) -> Result<()> {
        if self.query_maxlen < MIN_SEQUENCE_LEN {
            return Err(RerankError::InvalidConfig(format!(
                "query_maxlen must be at least {MIN_SEQUENCE_LEN}, got {}",
                self.query_maxlen
            )));
        }
        if self.doc_maxlen < MIN_SEQUENCE_LEN {
            return Err(RerankError::InvalidConfig(format!(
                "doc_maxlen must be at least {MIN_SEQUENCE_LEN}, got {}",
                self.doc_maxlen
            )));
        }
        Ok(())
    }

    /// Apply per-call overrides on top of these defaults.
    pub fn merged(&self, options: &RerankOptions) -> RerankConfig {
        RerankConfig {
            max_num_documents: options.max_num_documents.unwrap_or(self.max_num_documents),
            include_title: options.include_title.unwrap_or(self.include_title),
            query_maxlen: options.query_maxlen.unwrap_or(self.query_maxlen),
            doc_maxlen: options.doc_maxlen.unwrap_or(self.doc_maxlen),
            doc_batch_size: options.doc_batch_size.unwrap_or(self.doc_batch_size),
            title_separator: options
                .title_separator
                .clone()
                .unwrap_or_else(|| self.title_separator.clone()),
        }
    }

    pub fn sequence_limits(&self) -> SequenceLimits {
        SequenceLimits {
            query_maxlen: self.query_maxlen,
            doc_maxlen: self.doc_maxlen,
            doc_batch_size: self.doc_batch_size,
        }
    }
}

/// Per-call overrides. `None` falls back to the module defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankOptions {
    pub max_num_documents: Option<i64>,
    pub include_title: Option<bool>,
    pub query_maxlen: Option<usize>,
    pub doc_maxlen: Option<usize>,
    pub doc_batch_size: Option<usize>,
    pub title_separator: Option<String>,
}

impl RerankOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_num_documents(mut self, n: i64) -> Self {
        self.max_num_documents = Some(n);
        self
    }

    pub fn include_title(mut self, include: bool) -> Self {
        self.include_title = Some(include);
        self
    }

    pub fn query_maxlen(mut self, n: usize) -> Self {
        self.query_maxlen = Some(n);
        self
    }

    pub fn doc_maxlen(mut self, n: usize) -> Self {
        self.doc_maxlen = Some(n);
        self
    }

    pub fn doc_batch_size(mut self, n: usize) -> Self {
        self.doc_batch_size = Some(n);
        self
    }
}

/// Token-length caps handed to the scorer on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLimits {
    pub query_maxlen: usize,
    pub doc_maxlen: usize,
    pub doc_batch_size: usize,
}

impl Default for SequenceLimits {
    fn default() -> Self {
        RerankConfig::default().sequence_limits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_fall_back_to_defaults() {
        let defaults = RerankConfig::default();
        let merged = defaults.merged(&RerankOptions::new().max_num_documents(3));
        assert_eq!(merged.max_num_documents, 3);
        assert!(!merged.include_title);
        assert_eq!(merged.query_maxlen, 32);
        assert_eq!(merged.title_separator, "\n\n");
    }

    #[test]
    fn rejects_sequence_caps_without_room_for_markers() {
        let config = RerankConfig::default().merged(&RerankOptions::new().doc_maxlen(3));
        assert!(matches!(config.validate(), Err(RerankError::InvalidConfig(_))));
        assert!(RerankConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config: RerankConfig = serde_yaml::from_str("max_num_documents: 10\n").unwrap();
        assert_eq!(config.max_num_documents, 10);
        assert_eq!(config.doc_maxlen, 180);
    }
}
