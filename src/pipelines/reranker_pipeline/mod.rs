//! Query-conditioned document reranking.
//!
//! For each query, every candidate document is scored by a late-interaction
//! model and the set is returned sorted by descending score, optionally cut to
//! the top `max_num_documents`.
//!
//! ## Main Types
//!
//! - [`RerankPipeline`] - Ranks document sets with any [`Scorer`]
//! - [`RerankPipelineBuilder`] - Loads a checkpoint and configures the pipeline
//! - [`Scorer`] - One relevance score per passage
//! - [`RerankModel`] - A scorer bootstrapped from a pretrained checkpoint
//! - [`ColbertModel`] - ColBERT MaxSim implementation
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use colbert_rerank::core::{sample_documents, RerankOptions};
//! use colbert_rerank::pipelines::reranker_pipeline::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pipeline = RerankPipelineBuilder::load("colbert-ir/colbertv2.0")?
//!     .cpu()
//!     .build()
//!     .await?;
//!
//! let results = pipeline.rerank(
//!     &["what is the color of the horse?"],
//!     &[sample_documents()],
//!     &RerankOptions::new().max_num_documents(3),
//! )?;
//!
//! for ranked in &results[0].result {
//!     println!("{} (score: {:.3})", ranked.document.text, ranked.score);
//! }
//! # anyhow::Ok(())
//! # });
//! ```

pub mod builder;
pub mod reranker_model;
pub mod reranker_pipeline;

pub use builder::RerankPipelineBuilder;
pub use reranker_model::{RerankModel, Scorer};
pub use reranker_pipeline::{rank_indices, RerankPipeline};

pub use crate::models::colbert::{ColbertModel, ColbertOptions};
