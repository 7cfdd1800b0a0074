//! Model artifacts: schema, per-family configuration, validation and caching.
//!
//! An artifact is loaded once per process and never mutated; picking up a new
//! version requires a restart.

pub mod domain;
pub mod repo_fs;
pub mod service;

pub use domain::{ArtifactFile, Model, ModelFamily, ModelSpec, Provenance};
pub use repo_fs::{ArtifactRepo, FsArtifactRepo};
pub use service::{build_model, placeholder, ArtifactCache};
