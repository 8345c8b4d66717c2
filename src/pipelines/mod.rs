pub mod reranker_pipeline;
pub mod utils;

pub use reranker_pipeline::*;
