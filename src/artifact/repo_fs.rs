//! Filesystem repository for model artifacts.
//!
//! Layout: `<root>/<family>/artifact.json`.

use std::fs;
use std::path::PathBuf;

use crate::common::config::AppCfg;
use crate::common::digest::artifact_digest;
use crate::common::error::{ServeError, ServeResult};

use super::domain::{ArtifactFile, ModelFamily, Provenance};

const ARTIFACT_FILE: &str = "artifact.json";

/// Repository contract for model artifacts.
pub trait ArtifactRepo: Send + Sync {
    /// Read and parse the artifact for a family. No validation beyond the schema.
    fn get_artifact(&self, family: ModelFamily) -> ServeResult<(ArtifactFile, Provenance)>;

    /// Persist an artifact, replacing any previous version.
    fn put_artifact(&self, artifact: &ArtifactFile) -> ServeResult<PathBuf>;
}

/// Artifacts stored as JSON files under a root directory.
#[derive(Clone, Debug)]
pub struct FsArtifactRepo {
    root: PathBuf,
}

impl FsArtifactRepo {
    pub fn new(cfg: &AppCfg) -> Self {
        Self::with_root(cfg.artifact_root.clone())
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(&self, family: ModelFamily) -> PathBuf {
        self.root.join(family.as_str()).join(ARTIFACT_FILE)
    }
}

impl ArtifactRepo for FsArtifactRepo {
    fn get_artifact(&self, family: ModelFamily) -> ServeResult<(ArtifactFile, Provenance)> {
        let path = self.artifact_path(family);
        let bytes = fs::read(&path).map_err(|err| ServeError::io(&path, err))?;
        let artifact: ArtifactFile = serde_json::from_slice(&bytes)
            .map_err(|err| ServeError::artifact(family.as_str(), err.to_string()))?;
        let provenance = Provenance::Loaded {
            digest: artifact_digest(&bytes),
            path,
        };
        Ok((artifact, provenance))
    }

    fn put_artifact(&self, artifact: &ArtifactFile) -> ServeResult<PathBuf> {
        let path = self.artifact_path(artifact.model);
        let dir = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir).map_err(|err| ServeError::io(&dir, err))?;

        let body = serde_json::to_vec_pretty(artifact)
            .map_err(|err| ServeError::artifact(artifact.model.as_str(), err.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &body).map_err(|err| ServeError::io(&tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| ServeError::io(&path, err))?;
        Ok(path)
    }
}
