use tokenizers::Tokenizer;

use crate::core::{RerankError, Result};

/// Token marking a query encoding.
pub const QUERY_MARKER: &str = "[unused0]";
/// Token marking a document encoding.
pub const DOC_MARKER: &str = "[unused1]";

/// Id the checkpoint was trained with for [`QUERY_MARKER`].
pub const QUERY_MARKER_ID: u32 = 1;
/// Id the checkpoint was trained with for [`DOC_MARKER`].
pub const DOC_MARKER_ID: u32 = 2;

/// Text-to-id mapping used by the encoders.
pub trait Vocabulary {
    /// Token ids for `text` without any special tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<u32>>;

    /// Token strings for `text` without any special tokens.
    fn tokens(&self, text: &str) -> Result<Vec<String>>;

    fn token_to_id(&self, token: &str) -> Option<u32>;
}

impl Vocabulary for Tokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .encode(text, false)
            .map_err(|e| RerankError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn tokens(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .encode(text, false)
            .map_err(|e| RerankError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        // Deref to the inner implementation; the path form resolves back here.
        (**self).token_to_id(token)
    }
}

/// Special token ids resolved once against a vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
    pub mask: u32,
    pub query_marker: u32,
    pub doc_marker: u32,
}

impl SpecialTokens {
    /// Resolve the special ids and check the segment markers against the ids the
    /// checkpoint expects. A mismatch means vocabulary and checkpoint do not
    /// belong together.
    pub fn resolve<V: Vocabulary + ?Sized>(vocab: &V) -> Result<Self> {
        Ok(Self {
            cls: require(vocab, "[CLS]")?,
            sep: require(vocab, "[SEP]")?,
            pad: vocab.token_to_id("[PAD]").unwrap_or(0),
            mask: require(vocab, "[MASK]")?,
            query_marker: expect_id(vocab, QUERY_MARKER, QUERY_MARKER_ID)?,
            doc_marker: expect_id(vocab, DOC_MARKER, DOC_MARKER_ID)?,
        })
    }
}

fn require<V: Vocabulary + ?Sized>(vocab: &V, token: &str) -> Result<u32> {
    vocab
        .token_to_id(token)
        .ok_or_else(|| RerankError::Tokenizer(format!("vocabulary has no `{token}` token")))
}

fn expect_id<V: Vocabulary + ?Sized>(vocab: &V, token: &str, expected: u32) -> Result<u32> {
    match vocab.token_to_id(token) {
        Some(id) if id == expected => Ok(id),
        found => Err(RerankError::VocabularyMismatch {
            token: token.to_string(),
            expected,
            found,
        }),
    }
}
