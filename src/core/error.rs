use std::path::PathBuf;

use thiserror::Error;

/// Result type used throughout the reranking pipeline.
pub type Result<T> = std::result::Result<T, RerankError>;

/// Errors surfaced by the reranker.
///
/// Every failure is returned synchronously to the immediate caller; the host
/// runtime is expected to turn it into a protocol-level failure response.
#[derive(Debug, Error)]
pub enum RerankError {
    /// The request was malformed (mismatched query/document counts and the like).
    #[error("invalid request: {0}")]
    InputShape(String),

    /// A special marker id does not match the loaded vocabulary. This means the
    /// vocabulary and checkpoint do not belong together and is never recovered.
    #[error("vocabulary mismatch for `{token}`: expected id {expected}, found {found:?}")]
    VocabularyMismatch {
        token: String,
        expected: u32,
        found: Option<u32>,
    },

    /// The model path could not be turned into a usable checkpoint.
    #[error("cannot resolve model artifact at {path:?}: {reason}")]
    ArtifactResolution { path: PathBuf, reason: String },

    /// The external scorer failed. The error is passed through untouched.
    #[error(transparent)]
    Scorer(anyhow::Error),

    /// The scorer returned a different number of scores than passages.
    #[error("scorer returned {found} scores for {expected} passages")]
    ScoreCount { expected: usize, found: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("tokenization failed: {0}")]
    Tokenizer(String),

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl RerankError {
    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArtifactResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
