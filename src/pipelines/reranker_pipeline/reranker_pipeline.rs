use std::cmp::Ordering;

use super::reranker_model::Scorer;
use crate::core::document::check_pairing;
use crate::core::{
    DocumentRerankPrediction, DocumentSet, RerankConfig, RerankError, RerankOptions,
    RerankPrediction, RerankRequest, Result,
};

/// Ranks each query's candidate documents with a [`Scorer`].
pub struct RerankPipeline<M: Scorer> {
    pub(crate) model: M,
    pub(crate) config: RerankConfig,
    pub(crate) span: tracing::Span,
}

impl<M: Scorer> RerankPipeline<M> {
    /// Build a pipeline around an already loaded scorer.
    pub fn new(model: M, config: RerankConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            span: tracing::info_span!("rerank"),
        })
    }

    /// Log inside `span` instead of the default `rerank` span.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Rerank one document set per query.
    ///
    /// Results come back in query order. Each holds new records carrying the
    /// model's score, sorted by descending score (ties keep input order) and cut
    /// to `max_num_documents` when that is positive. Any scorer failure fails
    /// the whole call.
    pub fn rerank<Q: AsRef<str>>(
        &self,
        queries: &[Q],
        document_sets: &[DocumentSet],
        options: &RerankOptions,
    ) -> Result<Vec<RerankPrediction>> {
        check_pairing(queries.len(), document_sets.len())?;
        let config = self.config.merged(options);
        config.validate()?;

        let _enter = self.span.enter();
        tracing::debug!(queries = queries.len(), ?options, "rerank request");

        queries
            .iter()
            .zip(document_sets)
            .map(|(query, documents)| self.rerank_one(query.as_ref(), documents, &config))
            .collect()
    }

    /// Handle a wire-level request.
    pub fn run(&self, request: &RerankRequest, options: &RerankOptions) -> Result<DocumentRerankPrediction> {
        request.validate()?;
        let results = self.rerank(request.queries.as_slice(), &request.documents, options)?;
        Ok(DocumentRerankPrediction { results })
    }

    fn rerank_one(&self, query: &str, documents: &DocumentSet, config: &RerankConfig) -> Result<RerankPrediction> {
        if documents.is_empty() {
            return Ok(RerankPrediction {
                sentence: query.to_string(),
                result: Vec::new(),
            });
        }

        let texts: Vec<String> = documents
            .iter()
            .map(|d| d.document.passage_text(config.include_title, &config.title_separator))
            .collect();

        let scores = self
            .model
            .score(query, &texts, config.sequence_limits())
            .map_err(RerankError::Scorer)?;
        if scores.len() != texts.len() {
            return Err(RerankError::ScoreCount {
                expected: texts.len(),
                found: scores.len(),
            });
        }

        let ranked = rank_indices(&scores, config.max_num_documents);
        tracing::debug!(candidates = texts.len(), kept = ranked.len(), "ranked documents");

        let result = ranked
            .into_iter()
            .map(|idx| documents.documents[idx].rescored(scores[idx]))
            .collect();

        Ok(RerankPrediction {
            sentence: query.to_string(),
            result,
        })
    }
}

/// Indices of `scores` by descending score, ties in input order, keeping at most
/// `max_num_documents` when it is positive. NaN scores rank last.
pub fn rank_indices(scores: &[f32], max_num_documents: i64) -> Vec<usize> {
    let key = |i: usize| {
        let s = scores[i];
        if s.is_nan() {
            f32::NEG_INFINITY
        } else {
            s
        }
    };

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));

    if max_num_documents > 0 {
        order.truncate(max_num_documents as usize);
    }
    order
}
