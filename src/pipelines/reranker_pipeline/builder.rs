use std::path::Path;

use candle_core::Device;

use super::reranker_model::RerankModel;
use super::reranker_pipeline::RerankPipeline;
use crate::artifact::{self, CheckpointSource};
use crate::core::{global_cache, ModelOptions, RerankConfig, RerankOptions};
use crate::models::{ColbertModel, ColbertOptions};
use crate::pipelines::utils::{build_cache_key, DeviceRequest};

/// Configures and loads a [`RerankPipeline`].
///
/// Settings given on the builder override the defaults, which come either from
/// [`RerankConfig::default`] or from the module descriptor read by
/// [`RerankPipelineBuilder::load`].
pub struct RerankPipelineBuilder<M: RerankModel> {
    options: M::Options,
    device_request: DeviceRequest,
    defaults: RerankConfig,
    overrides: RerankOptions,
    span: Option<tracing::Span>,
}

impl<M: RerankModel> RerankPipelineBuilder<M> {
    pub fn new(options: M::Options) -> Self {
        Self {
            options,
            device_request: DeviceRequest::Default,
            defaults: RerankConfig::default(),
            overrides: RerankOptions::default(),
            span: None,
        }
    }

    pub fn cpu(mut self) -> Self {
        self.device_request = DeviceRequest::Cpu;
        self
    }

    pub fn cuda_device(mut self, index: usize) -> Self {
        self.device_request = DeviceRequest::Cuda(index);
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.device_request = DeviceRequest::Explicit(device);
        self
    }

    /// Replace the defaults the overrides are applied on.
    pub fn defaults(mut self, defaults: RerankConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn max_num_documents(mut self, n: i64) -> Self {
        self.overrides = self.overrides.max_num_documents(n);
        self
    }

    pub fn include_title(mut self, include: bool) -> Self {
        self.overrides = self.overrides.include_title(include);
        self
    }

    pub fn query_maxlen(mut self, n: usize) -> Self {
        self.overrides = self.overrides.query_maxlen(n);
        self
    }

    pub fn doc_maxlen(mut self, n: usize) -> Self {
        self.overrides = self.overrides.doc_maxlen(n);
        self
    }

    pub fn doc_batch_size(mut self, n: usize) -> Self {
        self.overrides = self.overrides.doc_batch_size(n);
        self
    }

    /// Span the pipeline logs under. Defaults to an `info` span named `rerank`.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// The configuration the built pipeline will start from.
    pub fn config(&self) -> RerankConfig {
        self.defaults.merged(&self.overrides)
    }

    pub async fn build(self) -> anyhow::Result<RerankPipeline<M>>
    where
        M: Clone + Send + Sync + 'static,
        M::Options: ModelOptions,
    {
        let config = self.config();
        config.validate()?;

        let device = self.device_request.resolve()?;
        let key = build_cache_key(&self.options, &device);
        tracing::info!(%key, "building rerank pipeline");

        let options = self.options;
        let model = global_cache()
            .get_or_create(&key, || M::new(options, device))
            .await?;

        let pipeline = RerankPipeline::new(model, config)?;
        Ok(match self.span {
            Some(span) => pipeline.with_span(span),
            None => pipeline,
        })
    }
}

impl RerankPipelineBuilder<ColbertModel> {
    /// A ColBERT pipeline for a known checkpoint.
    pub fn colbert(source: CheckpointSource) -> Self {
        Self::new(ColbertOptions::new(source))
    }

    /// A ColBERT pipeline for a module path.
    ///
    /// `model_path` is a module directory with a `config.yml` descriptor, a raw
    /// checkpoint directory, or a hub id such as `colbert-ir/colbertv2.0@main`.
    /// Defaults recorded in the descriptor replace the built-in ones.
    pub fn load(model_path: impl AsRef<Path>) -> crate::core::Result<Self> {
        let resolved = artifact::resolve(model_path)?;
        let defaults = resolved.defaults().cloned().unwrap_or_default();
        defaults.validate()?;
        Ok(Self::colbert(resolved.source).defaults(defaults))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn overrides_apply_on_defaults() {
        let builder = RerankPipelineBuilder::colbert(CheckpointSource::Local("ckpt".into()))
            .defaults(RerankConfig {
                max_num_documents: 10,
                ..RerankConfig::default()
            })
            .doc_maxlen(64)
            .include_title(true);

        let config = builder.config();
        assert_eq!(config.max_num_documents, 10);
        assert_eq!(config.doc_maxlen, 64);
        assert!(config.include_title);
        assert_eq!(config.query_maxlen, RerankConfig::default().query_maxlen);
    }

    #[test]
    fn load_reads_descriptor_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("checkpoint"))?;
        fs::write(
            dir.path().join("config.yml"),
            "artifact: checkpoint\nrerank:\n  max_num_documents: 3\n  include_title: true\n",
        )?;

        let builder = RerankPipelineBuilder::load(dir.path())?;
        assert_eq!(
            builder.options.source,
            CheckpointSource::Local(dir.path().join("checkpoint"))
        );
        let config = builder.config();
        assert_eq!(config.max_num_documents, 3);
        assert!(config.include_title);
        Ok(())
    }

    #[tokio::test]
    async fn build_rejects_invalid_config() {
        let err = RerankPipelineBuilder::colbert(CheckpointSource::Local("missing".into()))
            .cpu()
            .query_maxlen(2)
            .build()
            .await;
        assert!(err.is_err());
    }
}
