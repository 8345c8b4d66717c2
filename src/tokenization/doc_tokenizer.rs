use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use super::batching::{batch_by_length, BatchedTokens, TokenBatch};
use super::vocab::{SpecialTokens, Vocabulary};
use crate::core::{RerankError, Result};

/// Printable stand-in for the document marker in token-string output.
const DOC_MARKER_TOKEN: &str = "[D]";

/// ASCII punctuation. Document positions holding these tokens never take part
/// in MaxSim.
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Encodes documents as `[CLS] [D] tokens... [SEP]`.
#[derive(Debug)]
pub struct DocTokenizer<V = Tokenizer> {
    vocab: Arc<V>,
    special: SpecialTokens,
    skiplist: Vec<u32>,
    used: AtomicBool,
}

impl<V: Vocabulary> DocTokenizer<V> {
    /// Fails with [`RerankError::VocabularyMismatch`] when the document marker id
    /// of `vocab` is not the one the checkpoint expects.
    pub fn new(vocab: Arc<V>) -> Result<Self> {
        let special = SpecialTokens::resolve(vocab.as_ref())?;
        let mut skiplist: Vec<u32> = PUNCTUATION
            .chars()
            .filter_map(|symbol| vocab.token_to_id(&symbol.to_string()))
            .collect();
        skiplist.sort_unstable();
        skiplist.dedup();
        Ok(Self {
            vocab,
            special,
            skiplist,
            used: AtomicBool::new(false),
        })
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special
    }

    /// Sorted ids of the punctuation tokens excluded from scoring.
    pub fn skiplist(&self) -> &[u32] {
        &self.skiplist
    }

    /// The mask MaxSim reads for `batch`: the attention mask with punctuation
    /// positions zeroed. The encoder still attends to punctuation.
    pub fn scoring_mask(&self, batch: &TokenBatch) -> Result<Tensor> {
        if self.skiplist.is_empty() {
            return Ok(batch.mask.clone());
        }

        let ids = batch.ids.to_vec2::<u32>()?;
        let mask = batch.mask.to_vec2::<u32>()?;
        let mut values = Vec::with_capacity(batch.len() * batch.width());
        for (id_row, mask_row) in ids.iter().zip(&mask) {
            for (id, &m) in id_row.iter().zip(mask_row) {
                let skipped = self.skiplist.binary_search(id).is_ok();
                values.push(if skipped { 0 } else { m });
            }
        }
        Ok(Tensor::from_vec(values, (batch.len(), batch.width()), batch.mask.device())?)
    }

    /// Token strings per text, optionally wrapped with the markers.
    pub fn tokenize<S: AsRef<str>>(&self, texts: &[S], add_special_tokens: bool) -> Result<Vec<Vec<String>>> {
        let tokens = texts
            .iter()
            .map(|text| self.vocab.tokens(text.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if !add_special_tokens {
            return Ok(tokens);
        }

        Ok(tokens
            .into_iter()
            .map(|content| {
                let mut row = Vec::with_capacity(content.len() + 3);
                row.push("[CLS]".to_string());
                row.push(DOC_MARKER_TOKEN.to_string());
                row.extend(content);
                row.push("[SEP]".to_string());
                row
            })
            .collect())
    }

    /// Token ids per text, optionally wrapped as `[CLS] [D] ids [SEP]`.
    pub fn encode<S: AsRef<str>>(&self, texts: &[S], add_special_tokens: bool) -> Result<Vec<Vec<u32>>> {
        let ids = texts
            .iter()
            .map(|text| self.vocab.tokenize(text.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if !add_special_tokens {
            return Ok(ids);
        }

        Ok(ids.into_iter().map(|content| self.wrap(&content)).collect())
    }

    /// Encode, truncate to `doc_maxlen` (markers included), pad and batch by
    /// length. `bsize` of `None` or zero keeps a single batch in input order.
    pub fn tensorize<S: AsRef<str>>(
        &self,
        texts: &[S],
        doc_maxlen: usize,
        bsize: Option<usize>,
        device: &Device,
    ) -> Result<BatchedTokens> {
        if doc_maxlen < 4 {
            return Err(RerankError::InvalidConfig(format!(
                "doc_maxlen must leave room for markers, got {doc_maxlen}"
            )));
        }
        if texts.is_empty() {
            return Ok(BatchedTokens::empty());
        }

        let content_len = doc_maxlen - 3;
        let rows: Vec<Vec<u32>> = self
            .encode(texts, false)?
            .into_iter()
            .map(|ids| self.wrap(&ids[..ids.len().min(content_len)]))
            .collect();

        let batch = TokenBatch::from_rows(&rows, self.special.pad, device)?;

        if !self.used.swap(true, Ordering::Relaxed) {
            tracing::debug!(
                rows = batch.len(),
                width = batch.width(),
                ?bsize,
                first_row = ?rows.first(),
                "first document batch tensorized"
            );
        }

        batch_by_length(batch, bsize)
    }

    fn wrap(&self, content: &[u32]) -> Vec<u32> {
        let mut row = Vec::with_capacity(content.len() + 3);
        row.push(self.special.cls);
        row.push(self.special.doc_marker);
        row.extend_from_slice(content);
        row.push(self.special.sep);
        row
    }
}
