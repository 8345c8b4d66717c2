pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;

pub use cache::{global_cache, ModelCache, ModelOptions};
pub use config::{RerankConfig, RerankOptions, SequenceLimits};
pub use document::{
    sample_documents, Document, DocumentRerankPrediction, DocumentSet, RankedDocument,
    RerankPrediction, RerankRequest,
};
pub use error::{RerankError, Result};
pub use logging::init_tracing;
