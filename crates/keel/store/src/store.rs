//! Object store interface

use async_trait::async_trait;
use keel_types::{DynamicObject, ObjectKey, ObjectMeta, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

use crate::error::{StoreError, StoreResult};

/// Filter for list operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Restrict to one namespace; `None` lists across all namespaces
    pub namespace: Option<String>,

    /// Every label here must be present with the same value
    pub labels: BTreeMap<String, String>,
}

impl ListParams {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, object: &DynamicObject) -> bool {
        if let Some(namespace) = &self.namespace {
            if &object.metadata.namespace != namespace {
                return false;
            }
        }
        self.labels
            .iter()
            .all(|(k, v)| object.metadata.labels.get(k) == Some(v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
}

/// One change notification
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub event_type: WatchEventType,
    pub object: DynamicObject,
}

/// Declarative object store.
///
/// Every write carries the object's `resource_version`; the store rejects a
/// write whose version does not match with [`StoreError::Conflict`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get an object; absence is `Ok(None)`
    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> StoreResult<Option<DynamicObject>>;

    async fn list(&self, kind: ResourceKind, params: &ListParams) -> StoreResult<Vec<DynamicObject>>;

    /// Create; the store assigns identity and version
    async fn create(&self, object: DynamicObject) -> StoreResult<DynamicObject>;

    /// Replace metadata and spec, keeping the stored status
    async fn update(&self, object: DynamicObject) -> StoreResult<DynamicObject>;

    /// Replace only the status
    async fn update_status(&self, object: DynamicObject) -> StoreResult<DynamicObject>;

    /// Request deletion. Objects with finalizers are only marked; returns
    /// false if the object did not exist.
    async fn delete(&self, kind: ResourceKind, key: &ObjectKey) -> StoreResult<bool>;

    /// Subscribe to change notifications
    fn watch(&self) -> broadcast::Receiver<WatchEvent>;

    /// Create, or update against the currently stored version. Metadata the
    /// manifest does not name is carried over from the stored object; see
    /// [`merge_stored_metadata`].
    async fn apply(&self, mut object: DynamicObject) -> StoreResult<DynamicObject> {
        let key = object.key();
        match self.get(object.kind, &key).await? {
            None => self.create(object).await,
            Some(existing) => {
                merge_stored_metadata(&existing.metadata, &mut object.metadata);
                match self.update(object).await {
                    Err(StoreError::NotFound { .. }) => Err(StoreError::Conflict {
                        kind: existing.kind,
                        key,
                    }),
                    other => other,
                }
            }
        }
    }
}

/// Fold stored metadata into an applied manifest.
///
/// The manifest wins for every label and annotation it names; stored keys it
/// does not name are kept (the serial-number annotation among them). Stored
/// finalizers are always kept, so re-applying a deleting object never skips
/// its finalization. Owner references are kept unless the manifest sets its
/// own.
pub fn merge_stored_metadata(stored: &ObjectMeta, applied: &mut ObjectMeta) {
    applied.resource_version = stored.resource_version.clone();

    for (key, value) in &stored.labels {
        applied
            .labels
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    for (key, value) in &stored.annotations {
        applied
            .annotations
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    let mut finalizers = stored.finalizers.clone();
    for finalizer in applied.finalizers.drain(..) {
        if !finalizers.contains(&finalizer) {
            finalizers.push(finalizer);
        }
    }
    applied.finalizers = finalizers;

    if applied.owner_references.is_empty() {
        applied.owner_references = stored.owner_references.clone();
    }
}
