#![deny(unconditional_recursion)]

pub mod artifact;
pub mod core;
pub mod loaders;
pub mod models;
pub mod pipelines;
pub mod tokenization;

// Re-export core types
pub use crate::core::{
    Document, DocumentRerankPrediction, DocumentSet, RankedDocument, RerankConfig, RerankError,
    RerankOptions, RerankPrediction, RerankRequest,
};

pub use artifact::CheckpointSource;
pub use models::{ColbertModel, ColbertOptions};
pub use pipelines::reranker_pipeline::{RerankModel, RerankPipeline, RerankPipelineBuilder, Scorer};
