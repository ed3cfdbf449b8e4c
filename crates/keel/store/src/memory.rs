//! In-memory object store
//!
//! Reference implementation of [`ObjectStore`] used by the daemon and by
//! tests. Objects live in a single ordered map guarded by one lock, so every
//! write is atomic with respect to version checks and cascade deletion.

use async_trait::async_trait;
use chrono::Utc;
use keel_types::{DynamicObject, ObjectKey, ResourceKind, ResourceRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{ListParams, ObjectStore, WatchEvent, WatchEventType};

const DEFAULT_WATCH_CAPACITY: usize = 1024;

/// Kind of write recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    UpdateStatus,
    Delete,
}

/// One entry of the write audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub op: WriteOp,
    pub kind: ResourceKind,
    pub key: ObjectKey,
}

type Slot = (ResourceKind, ObjectKey);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Slot, DynamicObject>,
    version: u64,
    writes: Vec<WriteRecord>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn record(&mut self, op: WriteOp, kind: ResourceKind, key: &ObjectKey) {
        self.writes.push(WriteRecord {
            op,
            kind,
            key: key.clone(),
        });
    }
}

/// In-memory store for development and testing
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    events: broadcast::Sender<WatchEvent>,
    registry: Arc<ResourceRegistry>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(ResourceRegistry::standard()))
    }
}

fn slot(kind: ResourceKind, key: &ObjectKey) -> Slot {
    if kind.is_cluster_scoped() {
        (kind, ObjectKey::cluster(key.name.clone()))
    } else {
        (kind, key.clone())
    }
}

fn check_version(stored: &DynamicObject, incoming: &DynamicObject) -> StoreResult<()> {
    if incoming.metadata.resource_version.is_none()
        || incoming.metadata.resource_version != stored.metadata.resource_version
    {
        return Err(StoreError::Conflict {
            kind: stored.kind,
            key: stored.key(),
        });
    }
    Ok(())
}

impl InMemoryStore {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self::with_watch_capacity(registry, DEFAULT_WATCH_CAPACITY)
    }

    pub fn with_watch_capacity(registry: Arc<ResourceRegistry>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Arc::new(RwLock::new(State::default())),
            events,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Every write accepted so far, in order
    pub async fn writes(&self) -> Vec<WriteRecord> {
        self.state.read().await.writes.clone()
    }

    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes.len()
    }

    /// Number of stored objects of one kind
    pub async fn count(&self, kind: ResourceKind) -> usize {
        self.state
            .read()
            .await
            .objects
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    fn emit(&self, event_type: WatchEventType, object: DynamicObject) {
        trace!(kind = %object.kind, key = %object.key(), ?event_type, "Watch event");
        // No subscribers is fine
        let _ = self.events.send(WatchEvent { event_type, object });
    }

    fn prepare(&self, object: DynamicObject) -> StoreResult<DynamicObject> {
        if object.metadata.name.is_empty() {
            return Err(StoreError::InvalidData(format!(
                "{} object has no name",
                object.kind
            )));
        }
        let mut object = self.registry.normalize(object)?;
        if object.kind.is_cluster_scoped() {
            object.metadata.namespace.clear();
        }
        Ok(object)
    }

    /// Remove an object and, recursively, everything owned by it. Dependents
    /// carrying finalizers are only marked for deletion.
    fn remove_cascading(&self, state: &mut State, slot: &Slot) {
        let Some(removed) = state.objects.remove(slot) else {
            return;
        };
        let mut pending: Vec<String> = removed.metadata.uid.iter().cloned().collect();
        self.emit(WatchEventType::Deleted, removed);

        while let Some(uid) = pending.pop() {
            let dependents: Vec<Slot> = state
                .objects
                .iter()
                .filter(|(_, object)| object.metadata.is_owned_by(&uid))
                .map(|(slot, _)| slot.clone())
                .collect();

            for dependent_slot in dependents {
                let Some(mut dependent) = state.objects.remove(&dependent_slot) else {
                    continue;
                };
                if !dependent.metadata.finalizers.is_empty() {
                    if dependent.metadata.deletion_timestamp.is_none() {
                        dependent.metadata.deletion_timestamp = Some(Utc::now());
                        dependent.metadata.resource_version = Some(state.next_version());
                        self.emit(WatchEventType::Modified, dependent.clone());
                    }
                    state.objects.insert(dependent_slot, dependent);
                    continue;
                }
                debug!(kind = %dependent.kind, key = %dependent.key(), owner_uid = %uid, "Cascade delete");
                pending.extend(dependent.metadata.uid.clone());
                self.emit(WatchEventType::Deleted, dependent);
            }
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> StoreResult<Option<DynamicObject>> {
        let state = self.state.read().await;
        Ok(state.objects.get(&slot(kind, key)).cloned())
    }

    async fn list(&self, kind: ResourceKind, params: &ListParams) -> StoreResult<Vec<DynamicObject>> {
        let state = self.state.read().await;
        Ok(state
            .objects
            .iter()
            .filter(|((k, _), object)| *k == kind && params.matches(object))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(&self, object: DynamicObject) -> StoreResult<DynamicObject> {
        let mut object = self.prepare(object)?;
        let kind = object.kind;
        let key = object.key();
        let slot = slot(kind, &key);

        let mut state = self.state.write().await;
        if state.objects.contains_key(&slot) {
            return Err(StoreError::AlreadyExists { kind, key });
        }

        let meta = &mut object.metadata;
        meta.uid = Some(Uuid::new_v4().to_string());
        meta.creation_timestamp = Some(Utc::now());
        meta.deletion_timestamp = None;
        meta.generation = 1;
        meta.resource_version = Some(state.next_version());

        state.objects.insert(slot, object.clone());
        state.record(WriteOp::Create, kind, &key);
        self.emit(WatchEventType::Added, object.clone());
        Ok(object)
    }

    async fn update(&self, object: DynamicObject) -> StoreResult<DynamicObject> {
        let mut object = self.prepare(object)?;
        let kind = object.kind;
        let key = object.key();
        let slot = slot(kind, &key);

        let mut state = self.state.write().await;
        let stored = state
            .objects
            .get(&slot)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;
        check_version(&stored, &object)?;

        let spec_changed = stored.spec() != object.spec();
        let meta = &mut object.metadata;
        meta.uid = stored.metadata.uid.clone();
        meta.creation_timestamp = stored.metadata.creation_timestamp;
        meta.deletion_timestamp = stored.metadata.deletion_timestamp;
        meta.generation = stored.metadata.generation + i64::from(spec_changed);
        meta.resource_version = Some(state.next_version());

        match stored.status() {
            Some(status) => {
                object.data.insert("status".to_string(), status.clone());
            }
            None => {
                object.data.remove("status");
            }
        }

        state.record(WriteOp::Update, kind, &key);
        state.objects.insert(slot.clone(), object.clone());

        if object.metadata.is_being_deleted() && object.metadata.finalizers.is_empty() {
            debug!(kind = %kind, key = %key, "Last finalizer removed, deleting");
            self.remove_cascading(&mut state, &slot);
        } else {
            self.emit(WatchEventType::Modified, object.clone());
        }
        Ok(object)
    }

    async fn update_status(&self, object: DynamicObject) -> StoreResult<DynamicObject> {
        let object = self.prepare(object)?;
        let kind = object.kind;
        let key = object.key();
        let slot = slot(kind, &key);

        let mut state = self.state.write().await;
        let mut stored = state
            .objects
            .get(&slot)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;
        check_version(&stored, &object)?;

        match object.status() {
            Some(status) => {
                stored.data.insert("status".to_string(), status.clone());
            }
            None => {
                stored.data.remove("status");
            }
        }
        stored.metadata.resource_version = Some(state.next_version());

        state.record(WriteOp::UpdateStatus, kind, &key);
        state.objects.insert(slot, stored.clone());
        self.emit(WatchEventType::Modified, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, kind: ResourceKind, key: &ObjectKey) -> StoreResult<bool> {
        let slot = slot(kind, key);
        let mut state = self.state.write().await;
        let Some(mut stored) = state.objects.get(&slot).cloned() else {
            return Ok(false);
        };
        state.record(WriteOp::Delete, kind, key);

        if stored.metadata.finalizers.is_empty() {
            self.remove_cascading(&mut state, &slot);
            return Ok(true);
        }

        if stored.metadata.deletion_timestamp.is_none() {
            debug!(kind = %kind, key = %key, finalizers = ?stored.metadata.finalizers, "Marking for deletion");
            stored.metadata.deletion_timestamp = Some(Utc::now());
            stored.metadata.resource_version = Some(state.next_version());
            state.objects.insert(slot, stored.clone());
            self.emit(WatchEventType::Modified, stored);
        }
        Ok(true)
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::{
        DnsEndpoint, DnsEndpointSpec, HostedService, HostedServiceSpec, Node, NodeStatus,
        ObjectMeta, Resource,
    };

    fn hosted(name: &str) -> DynamicObject {
        DynamicObject::from_resource(&HostedService::new(
            ObjectMeta::new("prod", name),
            HostedServiceSpec {
                region: name.into(),
                hosted_zone: "example.com".into(),
                replicas: 1,
            },
        ))
        .unwrap()
    }

    fn owned_dns(owner: &DynamicObject) -> DynamicObject {
        let mut meta = ObjectMeta::new("prod", owner.metadata.name.clone());
        let typed: HostedService = owner.clone().into_resource().unwrap();
        meta.set_owner(typed.owner_ref().unwrap());
        DynamicObject::from_resource(&DnsEndpoint::new(meta, DnsEndpointSpec::default())).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_identity() {
        let store = InMemoryStore::default();
        let created = store.create(hosted("eu")).await.unwrap();

        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.creation_timestamp.is_some());
        assert_eq!(created.metadata.generation, 1);
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));

        let err = store.create(hosted("eu")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = InMemoryStore::default();
        let created = store.create(hosted("eu")).await.unwrap();

        let mut first = created.clone();
        first.metadata.set_annotation("a", "1");
        store.update(first).await.unwrap();

        let mut stale = created;
        stale.metadata.set_annotation("a", "2");
        let err = store.update(stale).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_missing_version_conflicts() {
        let store = InMemoryStore::default();
        store.create(hosted("eu")).await.unwrap();
        let err = store.update(hosted("eu")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_generation_bumps_only_on_spec_change() {
        let store = InMemoryStore::default();
        let created = store.create(hosted("eu")).await.unwrap();

        let mut relabel = created.clone();
        relabel.metadata.labels.insert("team".into(), "dns".into());
        let relabeled = store.update(relabel).await.unwrap();
        assert_eq!(relabeled.metadata.generation, 1);

        let mut typed: HostedService = relabeled.into_resource().unwrap();
        typed.spec.replicas = 3;
        let respec = store
            .update(DynamicObject::from_resource(&typed).unwrap())
            .await
            .unwrap();
        assert_eq!(respec.metadata.generation, 2);
        assert_eq!(respec.metadata.uid, created.metadata.uid);
    }

    #[tokio::test]
    async fn test_update_keeps_status_and_update_status_keeps_spec() {
        let store = InMemoryStore::default();
        let created: HostedService = store
            .create(hosted("eu"))
            .await
            .unwrap()
            .into_resource()
            .unwrap();

        let mut with_status = created.clone();
        with_status.status.records = 5;
        with_status.spec.replicas = 9;
        let after: HostedService = store
            .update_status(DynamicObject::from_resource(&with_status).unwrap())
            .await
            .unwrap()
            .into_resource()
            .unwrap();
        assert_eq!(after.status.records, 5);
        assert_eq!(after.spec.replicas, 1);

        let mut spec_write = after.clone();
        spec_write.status.records = 0;
        spec_write.spec.replicas = 2;
        let after: HostedService = store
            .update(DynamicObject::from_resource(&spec_write).unwrap())
            .await
            .unwrap()
            .into_resource()
            .unwrap();
        assert_eq!(after.status.records, 5);
        assert_eq!(after.spec.replicas, 2);
    }

    #[tokio::test]
    async fn test_delete_honours_finalizers() {
        let store = InMemoryStore::default();
        let mut object = hosted("eu");
        object.metadata.add_finalizer("keel.io/finalizer");
        store.create(object).await.unwrap();

        let key = ObjectKey::new("prod", "eu");
        assert!(store.delete(ResourceKind::HostedService, &key).await.unwrap());

        let marked = store
            .get(ResourceKind::HostedService, &key)
            .await
            .unwrap()
            .unwrap();
        assert!(marked.metadata.is_being_deleted());

        let mut finalized = marked;
        finalized.metadata.remove_finalizer("keel.io/finalizer");
        store.update(finalized).await.unwrap();
        assert!(store
            .get(ResourceKind::HostedService, &key)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let store = InMemoryStore::default();
        let key = ObjectKey::new("prod", "nope");
        assert!(!store.delete(ResourceKind::HostedService, &key).await.unwrap());
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_through_owner_references() {
        let store = InMemoryStore::default();
        let owner = store.create(hosted("eu")).await.unwrap();
        store.create(owned_dns(&owner)).await.unwrap();
        store.create(hosted("us")).await.unwrap();
        assert_eq!(store.count(ResourceKind::DnsEndpoint).await, 1);

        store
            .delete(ResourceKind::HostedService, &ObjectKey::new("prod", "eu"))
            .await
            .unwrap();
        assert_eq!(store.count(ResourceKind::DnsEndpoint).await, 0);
        assert_eq!(store.count(ResourceKind::HostedService).await, 1);
    }

    #[tokio::test]
    async fn test_watch_emits_one_event_per_write() {
        let store = InMemoryStore::default();
        let mut events = store.watch();

        let created = store.create(hosted("eu")).await.unwrap();
        let mut changed = created.clone();
        changed.metadata.set_annotation("a", "b");
        store.update(changed).await.unwrap();
        store
            .delete(ResourceKind::HostedService, &created.key())
            .await
            .unwrap();

        let types: Vec<_> = [
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|e| e.event_type)
        .collect();
        assert_eq!(
            types,
            vec![
                WatchEventType::Added,
                WatchEventType::Modified,
                WatchEventType::Deleted
            ]
        );
    }

    #[tokio::test]
    async fn test_list_filters_namespace_and_labels() {
        let store = InMemoryStore::default();
        let mut labeled = hosted("eu");
        labeled.metadata.labels.insert("tier".into(), "gold".into());
        store.create(labeled).await.unwrap();
        store.create(hosted("us")).await.unwrap();

        let all = store
            .list(ResourceKind::HostedService, &ListParams::all())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let gold = store
            .list(
                ResourceKind::HostedService,
                &ListParams::namespaced("prod").with_label("tier", "gold"),
            )
            .await
            .unwrap();
        assert_eq!(gold.len(), 1);
        assert_eq!(gold[0].metadata.name, "eu");

        let other = store
            .list(ResourceKind::HostedService, &ListParams::namespaced("dev"))
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_cluster_scoped_objects_drop_namespace() {
        let store = InMemoryStore::default();
        let mut node = Node::new("worker-1", NodeStatus::default());
        node.metadata.namespace = "ignored".into();
        let created = store
            .create(DynamicObject::from_resource(&node).unwrap())
            .await
            .unwrap();
        assert!(created.metadata.namespace.is_empty());
        assert!(store
            .get(ResourceKind::Node, &ObjectKey::cluster("worker-1"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_apply_creates_then_updates() {
        let store = InMemoryStore::default();
        store.apply(hosted("eu")).await.unwrap();

        let mut typed: HostedService = hosted("eu").into_resource().unwrap();
        typed.spec.replicas = 4;
        let applied: HostedService = store
            .apply(DynamicObject::from_resource(&typed).unwrap())
            .await
            .unwrap()
            .into_resource()
            .unwrap();
        assert_eq!(applied.spec.replicas, 4);
        assert_eq!(applied.metadata.generation, 2);
    }

    #[tokio::test]
    async fn test_reapply_keeps_stored_annotations_and_finalizers() {
        let store = InMemoryStore::default();
        let created = store.apply(hosted("eu")).await.unwrap();

        let mut annotated = created;
        annotated.metadata.set_annotation("keel.io/serial-number", "SN-1");
        annotated.metadata.set_annotation("team", "dns");
        annotated.metadata.add_finalizer("keel.io/hosted-service");
        store.update(annotated).await.unwrap();

        // Same manifest as the first apply, plus one annotation of its own
        let mut manifest = hosted("eu");
        manifest.metadata.set_annotation("team", "edge");
        let applied = store.apply(manifest).await.unwrap();

        assert_eq!(
            applied.metadata.annotation("keel.io/serial-number"),
            Some("SN-1")
        );
        assert_eq!(applied.metadata.annotation("team"), Some("edge"));
        assert_eq!(applied.metadata.finalizers, vec!["keel.io/hosted-service"]);
    }

    #[tokio::test]
    async fn test_reapply_to_deleting_object_does_not_skip_finalization() {
        let store = InMemoryStore::default();
        let mut object = hosted("eu");
        object.metadata.add_finalizer("keel.io/hosted-service");
        store.create(object).await.unwrap();

        let key = ObjectKey::new("prod", "eu");
        store.delete(ResourceKind::HostedService, &key).await.unwrap();
        store.apply(hosted("eu")).await.unwrap();

        let still_there = store
            .get(ResourceKind::HostedService, &key)
            .await
            .unwrap()
            .unwrap();
        assert!(still_there.metadata.is_being_deleted());
        assert!(still_there.metadata.has_finalizer("keel.io/hosted-service"));
    }

    #[tokio::test]
    async fn test_rejects_unnamed_object() {
        let store = InMemoryStore::default();
        let err = store.create(hosted("")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
