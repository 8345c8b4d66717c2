//! Turning text into the padded token tensors a ColBERT checkpoint consumes.
//!
//! - [`DocTokenizer`] wraps documents as `[CLS] [D] ... [SEP]` and batches them
//!   by length through [`batching`].
//! - [`QueryTokenizer`] wraps queries as `[CLS] [Q] ... [SEP]` and pads them
//!   with `[MASK]` up to the query length.

pub mod batching;
pub mod doc_tokenizer;
pub mod query_tokenizer;
pub mod vocab;

pub use batching::{
    batch_by_length, sort_by_length, split_into_batches, BatchedTokens, ReverseIndex, TokenBatch,
};
pub use doc_tokenizer::DocTokenizer;
pub use query_tokenizer::QueryTokenizer;
pub use vocab::{SpecialTokens, Vocabulary, DOC_MARKER, DOC_MARKER_ID, QUERY_MARKER, QUERY_MARKER_ID};

#[cfg(test)]
pub(crate) mod test_support {
    use std::str::FromStr;

    use tokenizers::Tokenizer;

    /// Whitespace word-level tokenizer with BERT special ids and the words used
    /// throughout the tests.
    pub(crate) fn tiny_tokenizer() -> Tokenizer {
        let words = [
            "a", "man", "is", "eating", "food", "monkey", "playing", "drums", "riding", "white",
            "horse", "what", "the", "color", "of", "?", ".",
        ];
        let mut vocab: Vec<(&str, u32)> = vec![
            ("[PAD]", 0),
            ("[unused0]", 1),
            ("[unused1]", 2),
            ("[UNK]", 100),
            ("[CLS]", 101),
            ("[SEP]", 102),
            ("[MASK]", 103),
        ];
        vocab.extend(words.iter().zip(1000u32..).map(|(w, id)| (*w, id)));
        tokenizer_from_vocab(&vocab)
    }

    pub(crate) fn tokenizer_from_vocab(vocab: &[(&str, u32)]) -> Tokenizer {
        let vocab: serde_json::Map<String, serde_json::Value> = vocab
            .iter()
            .map(|(token, id)| (token.to_string(), serde_json::Value::from(*id)))
            .collect();
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": { "type": "Lowercase" },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
        });
        Tokenizer::from_str(&json.to_string()).expect("valid tokenizer json")
    }
}
