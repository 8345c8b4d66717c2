//! ColBERT late-interaction scorer.
//!
//! A BERT encoder followed by a bias-free linear projection (`linear`) produces
//! one L2-normalised embedding per token. A document's score for a query is the
//! sum, over query tokens, of the best dot product with any real document token
//! (MaxSim).
//!
//! Reference: <https://arxiv.org/abs/2004.12832>

use std::sync::Arc;

use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{linear_no_bias, Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::artifact::CheckpointSource;
use crate::core::{ModelOptions, RerankError, SequenceLimits};
use crate::loaders::CheckpointFiles;
use crate::pipelines::reranker_pipeline::reranker_model::{RerankModel, Scorer};
use crate::tokenization::{DocTokenizer, QueryTokenizer, TokenBatch};

/// Added to the similarity of masked positions so they never win the max.
const PADDING_PENALTY: f64 = 1e4;

/// Selects the checkpoint a [`ColbertModel`] is bootstrapped from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColbertOptions {
    pub source: CheckpointSource,
}

impl ColbertOptions {
    pub fn new(source: CheckpointSource) -> Self {
        Self { source }
    }
}

impl ModelOptions for ColbertOptions {
    fn cache_key(&self) -> String {
        format!("colbert-{}", self.source)
    }
}

#[derive(Deserialize)]
struct EncoderShape {
    hidden_size: usize,
}

/// A loaded ColBERT checkpoint. Cloning shares the weights.
#[derive(Clone)]
pub struct ColbertModel {
    bert: Arc<BertModel>,
    linear: Linear,
    doc_tokenizer: Arc<DocTokenizer>,
    query_tokenizer: Arc<QueryTokenizer>,
    device: Device,
    dim: usize,
    span: tracing::Span,
}

impl ColbertModel {
    pub fn from_files(files: &CheckpointFiles, device: &Device) -> anyhow::Result<Self> {
        let config = std::fs::read_to_string(&files.config)
            .map_err(|e| anyhow::anyhow!("failed to read config file {:?}: {e}", files.config))?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer).map_err(|e| {
            anyhow::anyhow!("failed to load tokenizer from {:?}: {e}", files.tokenizer)
        })?;
        // Sequence shaping is done by the document and query tokenizers.
        tokenizer.with_padding(None);
        tokenizer.with_truncation(None).map_err(anyhow::Error::msg)?;

        let weights = &files.weights;
        let vb = if weights.extension().is_some_and(|ext| ext == "safetensors") {
            // Safety: the weight file is not modified while it is mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)? }
        } else if weights.extension().is_some_and(|ext| ext == "bin") {
            VarBuilder::from_pth(weights, DType::F32, device)?
        } else {
            return Err(RerankError::artifact(weights.as_path(), "unsupported weight file format").into());
        };

        let model = Self::assemble(vb, &config, files.colbert_dim()?, tokenizer, device)?;
        tracing::info!(weights = ?files.weights, dim = model.dim, "loaded ColBERT checkpoint");
        Ok(model)
    }

    fn assemble(
        vb: VarBuilder,
        config_json: &str,
        dim: usize,
        tokenizer: Tokenizer,
        device: &Device,
    ) -> anyhow::Result<Self> {
        let config: BertConfig = serde_json::from_str(config_json)
            .map_err(|e| anyhow::anyhow!("failed to parse encoder config: {e}"))?;
        let shape: EncoderShape = serde_json::from_str(config_json)?;

        let bert = BertModel::load(vb.clone(), &config)?;
        let linear = linear_no_bias(shape.hidden_size, dim, vb.pp("linear"))?;

        let vocab = Arc::new(tokenizer);
        let doc_tokenizer = DocTokenizer::new(Arc::clone(&vocab))?;
        let query_tokenizer = QueryTokenizer::new(vocab)?;

        Ok(Self {
            bert: Arc::new(bert),
            linear,
            doc_tokenizer: Arc::new(doc_tokenizer),
            query_tokenizer: Arc::new(query_tokenizer),
            device: device.clone(),
            dim,
            span: tracing::debug_span!("colbert"),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn doc_tokenizer(&self) -> &DocTokenizer {
        &self.doc_tokenizer
    }

    pub fn query_tokenizer(&self) -> &QueryTokenizer {
        &self.query_tokenizer
    }

    /// Per-token query embeddings, `[1, query_maxlen, dim]`.
    pub fn query_embeddings(&self, query: &str, query_maxlen: usize) -> anyhow::Result<Tensor> {
        let batch = self.query_tokenizer.tensorize(&[query], query_maxlen, &self.device)?;
        Ok(self.encode(&batch)?)
    }

    /// Per-token document embeddings, `[rows, width, dim]`.
    pub fn doc_embeddings(&self, batch: &TokenBatch) -> anyhow::Result<Tensor> {
        Ok(self.encode(batch)?)
    }

    /// Score `passages` against `query`, one score per passage in input order.
    ///
    /// Passages are encoded in length-sorted sub-batches of
    /// `limits.doc_batch_size` and the scores scattered back afterwards.
    pub fn rescore(&self, query: &str, passages: &[String], limits: SequenceLimits) -> anyhow::Result<Vec<f32>> {
        let _enter = self.span.enter();
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let query_embeddings = self.query_embeddings(query, limits.query_maxlen)?;
        let docs = self.doc_tokenizer.tensorize(
            passages,
            limits.doc_maxlen,
            Some(limits.doc_batch_size),
            &self.device,
        )?;
        tracing::debug!(passages = passages.len(), batches = docs.batches.len(), "scoring passages");

        let mut sorted = Vec::with_capacity(passages.len());
        for batch in &docs.batches {
            let doc_embeddings = self.doc_embeddings(batch)?;
            let scoring_mask = self.doc_tokenizer.scoring_mask(batch)?;
            sorted.extend(maxsim_scores(&query_embeddings, &doc_embeddings, &scoring_mask)?);
        }

        Ok(docs.reverse_index.restore(&sorted)?)
    }

    fn encode(&self, batch: &TokenBatch) -> candle_core::Result<Tensor> {
        let token_type_ids = batch.ids.zeros_like()?;
        let hidden = self
            .bert
            .forward(&batch.ids, &token_type_ids, Some(&batch.mask))?;
        let projected = self.linear.forward(&hidden)?;
        l2_normalize(&projected)
    }
}

/// L2-normalise along the last dimension.
pub fn l2_normalize(tensor: &Tensor) -> candle_core::Result<Tensor> {
    let norm = tensor.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?;
    let norm = norm.clamp(1e-12, f64::MAX)?;
    tensor.broadcast_div(&norm)
}

/// MaxSim of one query against a batch of documents.
///
/// * `query` - `[1, q_len, dim]`
/// * `docs` - `[n, d_len, dim]`
/// * `doc_mask` - `[n, d_len]`, zero on padding and skipped tokens
///
/// Returns `n` scores.
pub fn maxsim_scores(query: &Tensor, docs: &Tensor, doc_mask: &Tensor) -> candle_core::Result<Vec<f32>> {
    let (n, _, _) = docs.dims3()?;
    let (_, q_len, dim) = query.dims3()?;

    let query = query.broadcast_as((n, q_len, dim))?.contiguous()?;
    // [n, q_len, d_len]
    let sim = query.matmul(&docs.transpose(1, 2)?.contiguous()?)?;

    let penalty = doc_mask
        .to_dtype(sim.dtype())?
        .affine(PADDING_PENALTY, -PADDING_PENALTY)?
        .unsqueeze(1)?;
    let sim = sim.broadcast_add(&penalty)?;

    sim.max(D::Minus1)?.sum(1)?.to_dtype(DType::F32)?.to_vec1::<f32>()
}

impl Scorer for ColbertModel {
    fn score(&self, query: &str, passages: &[String], limits: SequenceLimits) -> anyhow::Result<Vec<f32>> {
        self.rescore(query, passages, limits)
    }
}

impl RerankModel for ColbertModel {
    type Options = ColbertOptions;

    fn new(options: Self::Options, device: Device) -> anyhow::Result<Self> {
        let files = CheckpointFiles::fetch(&options.source)?;
        Self::from_files(&files, &device)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
