//! Manifest loading
//!
//! YAML files, possibly multi-document, are decoded through the
//! [`ResourceRegistry`] and applied to the store: created when absent,
//! updated against the stored version otherwise.

use keel_store::{ObjectStore, StoreError};
use keel_types::{CodecError, DynamicObject, ResourceRegistry};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{ApiError, DaemonError, DaemonResult};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ManifestError> for ApiError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Yaml(e) => ApiError::BadRequest(e.to_string()),
            ManifestError::Codec(e) => e.into(),
            ManifestError::Store(e) => e.into(),
        }
    }
}

/// Split a YAML stream into documents, skipping empty ones
pub fn parse_documents(source: &str) -> Result<Vec<Value>, ManifestError> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(source) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// Decode one manifest and apply it.
///
/// A manifest that carries `status` has it written through as well, so
/// observed kinds such as nodes can be seeded from files.
pub async fn apply_manifest(
    store: &dyn ObjectStore,
    registry: &ResourceRegistry,
    manifest: Value,
) -> Result<DynamicObject, ManifestError> {
    let carries_status = manifest.get("status").is_some();
    let object = registry.decode(manifest)?;
    let status = object.status().cloned();

    let mut applied = store.apply(object).await?;
    debug!(kind = %applied.kind, key = %applied.key(), "Applied manifest");

    if let (true, Some(status)) = (carries_status, status) {
        if applied.status() != Some(&status) {
            applied.data.insert("status".to_string(), status);
            applied = store.update_status(applied).await?;
        }
    }
    Ok(applied)
}

/// Apply every document of one YAML stream
pub async fn apply_source(
    store: &dyn ObjectStore,
    registry: &ResourceRegistry,
    source: &str,
) -> Result<Vec<DynamicObject>, ManifestError> {
    let mut applied = Vec::new();
    for document in parse_documents(source)? {
        applied.push(apply_manifest(store, registry, document).await?);
    }
    Ok(applied)
}

fn is_manifest(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Apply every `.yaml`/`.yml` file in `dir`, in file name order. Returns the
/// number of objects applied.
pub async fn load_dir(
    store: &dyn ObjectStore,
    registry: &ResourceRegistry,
    dir: &Path,
) -> DaemonResult<usize> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_manifest(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut total = 0;
    for path in paths {
        let source = tokio::fs::read_to_string(&path).await?;
        let applied = apply_source(store, registry, &source)
            .await
            .map_err(|e| DaemonError::Manifest {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        info!(path = %path.display(), objects = applied.len(), "Loaded manifests");
        total += applied.len();
    }
    Ok(total)
}
