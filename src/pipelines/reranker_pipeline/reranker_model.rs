use candle_core::Device;

use crate::core::SequenceLimits;

/// The relevance scoring capability the pipeline ranks with.
///
/// Implementations return one score per passage, in passage order. A scorer
/// must be stateless between calls: the pipeline never retries, so callers may
/// safely resend a failed request.
pub trait Scorer {
    fn score(&self, query: &str, passages: &[String], limits: SequenceLimits) -> anyhow::Result<Vec<f32>>;
}

impl<S: Scorer + ?Sized> Scorer for &S {
    fn score(&self, query: &str, passages: &[String], limits: SequenceLimits) -> anyhow::Result<Vec<f32>> {
        (**self).score(query, passages, limits)
    }
}

impl<S: Scorer + ?Sized> Scorer for std::sync::Arc<S> {
    fn score(&self, query: &str, passages: &[String], limits: SequenceLimits) -> anyhow::Result<Vec<f32>> {
        (**self).score(query, passages, limits)
    }
}

/// A scorer backed by a pretrained checkpoint.
///
/// `Options` selects the checkpoint variant and how to bootstrap it.
pub trait RerankModel: Scorer {
    type Options: std::fmt::Debug + Clone;

    fn new(options: Self::Options, device: Device) -> anyhow::Result<Self>
    where
        Self: Sized;

    fn device(&self) -> &Device;
}
