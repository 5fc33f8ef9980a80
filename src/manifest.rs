//! Manifest sources
//!
//! A manifest is the raw templated YAML for one managed kind, containing the
//! literal placeholder tokens listed in [`crate::fleet::Placeholder`]. The
//! operator ships default manifests compiled into the binary; a directory with
//! `endpoint.yaml` and `workload.yaml` can replace them at startup.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::fleet::{ManagedResourceKind, TemplateError};

/// Default Service manifest
pub const ENDPOINT_MANIFEST: &str = include_str!("../manifests/endpoint.yaml");

/// Default Deployment manifest
pub const WORKLOAD_MANIFEST: &str = include_str!("../manifests/workload.yaml");

/// Provides the templated manifest of a managed kind
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Load the raw manifest text for `kind`
    async fn load_manifest(&self, kind: ManagedResourceKind) -> Result<String, TemplateError>;
}

/// Manifests compiled into the operator binary
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedManifests;

#[async_trait]
impl ManifestSource for EmbeddedManifests {
    async fn load_manifest(&self, kind: ManagedResourceKind) -> Result<String, TemplateError> {
        Ok(match kind {
            ManagedResourceKind::Endpoint => ENDPOINT_MANIFEST,
            ManagedResourceKind::Workload => WORKLOAD_MANIFEST,
        }
        .to_string())
    }
}

/// Manifests read from a directory on every load
///
/// Files are re-read each time so an updated ConfigMap mount is picked up
/// without restarting the operator.
#[derive(Clone, Debug)]
pub struct DirectoryManifests {
    dir: PathBuf,
}

impl DirectoryManifests {
    /// Read manifests from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory manifests are read from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the manifest file for `kind`
    pub fn path_for(&self, kind: ManagedResourceKind) -> PathBuf {
        self.dir.join(kind.manifest_file_name())
    }
}

#[async_trait]
impl ManifestSource for DirectoryManifests {
    async fn load_manifest(&self, kind: ManagedResourceKind) -> Result<String, TemplateError> {
        let path = self.path_for(kind);
        debug!(%kind, path = %path.display(), "loading manifest");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| TemplateError::load(kind, format!("{}: {}", path.display(), e)))
    }
}
