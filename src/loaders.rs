//! Locating the files of a ColBERT checkpoint.
//!
//! A checkpoint is a BERT-style model directory:
//! - `config.json` for the encoder
//! - `model.safetensors` or `pytorch_model.bin` for the weights
//! - `tokenizer.json` for the vocabulary
//! - `artifact.metadata` (optional) with ColBERT settings such as the projection `dim`
//!
//! Local directories are read in place. Hub checkpoints are downloaded into the
//! Hugging Face cache, with retries when another process holds the cache lock.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::Deserialize;

use crate::artifact::CheckpointSource;
use crate::core::RerankError;

const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// Projection size used by ColBERT checkpoints that do not record one.
pub const DEFAULT_COLBERT_DIM: usize = 128;

#[derive(Debug, Clone)]
pub struct CheckpointFiles {
    pub config: PathBuf,
    pub weights: PathBuf,
    pub tokenizer: PathBuf,
    pub metadata: Option<PathBuf>,
}

impl CheckpointFiles {
    pub fn fetch(source: &CheckpointSource) -> anyhow::Result<Self> {
        match source {
            CheckpointSource::Local(dir) => Self::from_dir(dir),
            CheckpointSource::Hub { repo, revision } => HfLoader::new(repo, revision).fetch(),
        }
    }

    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let config = dir.join("config.json");
        if !config.is_file() {
            return Err(RerankError::artifact(dir, "checkpoint directory has no config.json").into());
        }
        let tokenizer = dir.join("tokenizer.json");
        if !tokenizer.is_file() {
            return Err(RerankError::artifact(dir, "checkpoint directory has no tokenizer.json").into());
        }
        let weights = WEIGHT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                RerankError::artifact(
                    dir,
                    "model weights not found. Expected `model.safetensors` or `pytorch_model.bin`",
                )
            })?;
        let metadata = Some(dir.join("artifact.metadata")).filter(|p| p.is_file());

        Ok(Self {
            config,
            weights,
            tokenizer,
            metadata,
        })
    }

    /// ColBERT projection size from `artifact.metadata`, or the default.
    pub fn colbert_dim(&self) -> anyhow::Result<usize> {
        #[derive(Deserialize)]
        struct Metadata {
            dim: Option<usize>,
        }

        let Some(path) = &self.metadata else {
            return Ok(DEFAULT_COLBERT_DIM);
        };
        let content = std::fs::read_to_string(path)?;
        let metadata: Metadata = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse {path:?}: {e}"))?;
        Ok(metadata.dim.unwrap_or(DEFAULT_COLBERT_DIM))
    }
}

/// Downloads checkpoint files from the Hugging Face hub.
#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub revision: String,
}

impl HfLoader {
    const MAX_RETRIES: u32 = 3;

    pub fn new(repo: &str, revision: &str) -> Self {
        Self {
            repo: repo.into(),
            revision: revision.into(),
        }
    }

    pub fn fetch(&self) -> anyhow::Result<CheckpointFiles> {
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            self.repo.clone(),
            RepoType::Model,
            self.revision.clone(),
        ));

        tracing::info!(repo = %self.repo, revision = %self.revision, "fetching checkpoint");
        let config = self
            .get(&repo, "config.json")
            .map_err(|e| self.unresolved(format!("cannot fetch config.json: {e}")))?;
        let tokenizer = self
            .get(&repo, "tokenizer.json")
            .map_err(|e| self.unresolved(format!("cannot fetch tokenizer.json: {e}")))?;
        let weights = match self.get(&repo, WEIGHT_FILES[0]) {
            Ok(path) => path,
            Err(_) => self.get(&repo, WEIGHT_FILES[1]).map_err(|e| {
                self.unresolved(format!(
                    "model weights not found. Expected `model.safetensors` or `pytorch_model.bin`. Error: {e}"
                ))
            })?,
        };
        let metadata = self.get(&repo, "artifact.metadata").ok();

        Ok(CheckpointFiles {
            config,
            weights,
            tokenizer,
            metadata,
        })
    }

    fn unresolved(&self, reason: String) -> RerankError {
        RerankError::artifact(format!("{}@{}", self.repo, self.revision), reason)
    }

    fn get(&self, repo: &ApiRepo, filename: &str) -> anyhow::Result<PathBuf> {
        let mut attempt = 0;
        loop {
            match repo.get(filename) {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let lock_contended = e.to_string().contains("Lock acquisition failed");
                    if lock_contended && attempt + 1 < Self::MAX_RETRIES {
                        let wait = Duration::from_millis(100 * (1 << attempt));
                        tracing::debug!(filename, attempt, ?wait, "hub cache locked, retrying");
                        thread::sleep(wait);
                        attempt += 1;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}
