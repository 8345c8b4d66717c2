use std::sync::Arc;

use candle_core::Device;
use tokenizers::Tokenizer;

use super::batching::TokenBatch;
use super::vocab::{SpecialTokens, Vocabulary};
use crate::core::{RerankError, Result};

/// Encodes queries as `[CLS] [Q] tokens... [SEP]` padded with `[MASK]`.
///
/// Every query row is exactly `query_maxlen` wide. The `[MASK]` fill is kept out
/// of the attention mask but still produces embeddings, which the late
/// interaction uses as soft query expansion.
#[derive(Debug)]
pub struct QueryTokenizer<V = Tokenizer> {
    vocab: Arc<V>,
    special: SpecialTokens,
}

impl<V: Vocabulary> QueryTokenizer<V> {
    pub fn new(vocab: Arc<V>) -> Result<Self> {
        let special = SpecialTokens::resolve(vocab.as_ref())?;
        Ok(Self { vocab, special })
    }

    pub fn encode<S: AsRef<str>>(&self, queries: &[S], add_special_tokens: bool) -> Result<Vec<Vec<u32>>> {
        queries
            .iter()
            .map(|query| {
                let ids = self.vocab.tokenize(query.as_ref())?;
                Ok(if add_special_tokens { self.wrap(&ids) } else { ids })
            })
            .collect()
    }

    pub fn tensorize<S: AsRef<str>>(&self, queries: &[S], query_maxlen: usize, device: &Device) -> Result<TokenBatch> {
        if query_maxlen < 4 {
            return Err(RerankError::InvalidConfig(format!(
                "query_maxlen must leave room for markers, got {query_maxlen}"
            )));
        }

        let content_len = query_maxlen - 3;
        let rows: Vec<Vec<u32>> = self
            .encode(queries, false)?
            .into_iter()
            .map(|ids| self.wrap(&ids[..ids.len().min(content_len)]))
            .collect();

        TokenBatch::padded(&rows, query_maxlen, self.special.mask, device)
    }

    fn wrap(&self, content: &[u32]) -> Vec<u32> {
        let mut row = Vec::with_capacity(content.len() + 3);
        row.push(self.special.cls);
        row.push(self.special.query_marker);
        row.extend_from_slice(content);
        row.push(self.special.sep);
        row
    }
}
