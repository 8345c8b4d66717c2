//! Resolving a model path handed over by the serving host into a checkpoint.
//!
//! A model path is one of:
//!
//! - a checkpoint identifier on the Hugging Face hub (`org/name` or
//!   `org/name@revision`), when it is not a local directory;
//! - a module directory holding a `config.yml` descriptor whose `artifact`
//!   names the checkpoint, either a subdirectory or a hub identifier;
//! - a raw checkpoint directory holding `config.json`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{RerankConfig, RerankError, Result};

/// File name of the module descriptor inside a module directory.
pub const DESCRIPTOR_FILE: &str = "config.yml";

const DEFAULT_REVISION: &str = "main";

/// Where checkpoint files come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckpointSource {
    Local(PathBuf),
    Hub { repo: String, revision: String },
}

impl CheckpointSource {
    /// Parse `repo` or `repo@revision`.
    pub fn hub(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim();
        let (repo, revision) = match identifier.split_once('@') {
            Some((repo, revision)) => (repo, revision),
            None => (identifier, DEFAULT_REVISION),
        };
        if repo.is_empty() || revision.is_empty() {
            return Err(RerankError::artifact(
                identifier,
                "empty checkpoint identifier",
            ));
        }
        Ok(Self::Hub {
            repo: repo.to_string(),
            revision: revision.to_string(),
        })
    }
}

impl fmt::Display for CheckpointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Hub { repo, revision } => write!(f, "{repo}@{revision}"),
        }
    }
}

/// Contents of `config.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Checkpoint location, relative to the module directory or a hub identifier.
    pub artifact: String,
    /// Module-level reranking defaults.
    #[serde(default)]
    pub rerank: Option<RerankConfig>,
}

impl ModuleDescriptor {
    pub fn load(module_dir: impl AsRef<Path>) -> Result<Self> {
        let path = module_dir.as_ref().join(DESCRIPTOR_FILE);
        let content = std::fs::read_to_string(&path)?;
        let descriptor: ModuleDescriptor = serde_yaml::from_str(&content)?;
        if descriptor.artifact.trim().is_empty() {
            return Err(RerankError::artifact(path, "descriptor has an empty `artifact`"));
        }
        Ok(descriptor)
    }
}

/// A resolved model path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArtifact {
    pub source: CheckpointSource,
    pub descriptor: Option<ModuleDescriptor>,
}

impl ResolvedArtifact {
    /// Module-level defaults carried by the descriptor, if any.
    pub fn defaults(&self) -> Option<&RerankConfig> {
        self.descriptor.as_ref().and_then(|d| d.rerank.as_ref())
    }
}

/// Resolve `model_path` into a checkpoint source.
pub fn resolve(model_path: impl AsRef<Path>) -> Result<ResolvedArtifact> {
    let model_path = model_path.as_ref();

    if !model_path.is_dir() {
        let identifier = model_path.to_string_lossy();
        tracing::debug!(%identifier, "model path is not a directory, using it as a checkpoint id");
        return Ok(ResolvedArtifact {
            source: CheckpointSource::hub(&identifier)?,
            descriptor: None,
        });
    }

    if model_path.join(DESCRIPTOR_FILE).is_file() {
        let descriptor = ModuleDescriptor::load(model_path)?;
        let artifact = model_path.join(&descriptor.artifact);
        let source = if artifact.is_dir() {
            CheckpointSource::Local(artifact)
        } else {
            CheckpointSource::hub(&descriptor.artifact)?
        };
        tracing::debug!(path = %model_path.display(), %source, "resolved module descriptor");
        return Ok(ResolvedArtifact {
            source,
            descriptor: Some(descriptor),
        });
    }

    if model_path.join("config.json").is_file() {
        return Ok(ResolvedArtifact {
            source: CheckpointSource::Local(model_path.to_path_buf()),
            descriptor: None,
        });
    }

    Err(RerankError::artifact(
        model_path,
        format!("directory has neither a {DESCRIPTOR_FILE} descriptor nor a config.json checkpoint"),
    ))
}
