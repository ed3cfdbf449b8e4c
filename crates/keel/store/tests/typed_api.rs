//! Typed facade behaviour against the in-memory store

use keel_store::{Api, InMemoryStore, ListParams, ObjectStore, WriteOp};
use keel_types::{
    IngressHost, LicenseRef, LicensedServer, LicensedServerSpec, ObjectKey, ObjectMeta,
    SerialNumber,
};
use std::sync::Arc;

fn server(namespace: &str, name: &str) -> LicensedServer {
    LicensedServer::new(
        ObjectMeta::new(namespace, name),
        LicensedServerSpec {
            version: "23.9.0".into(),
            license: LicenseRef {
                issuer: "comet".into(),
                features: Default::default(),
            },
            ingress: IngressHost {
                host: "backup.example".into(),
            },
        },
    )
}

fn setup() -> (Arc<InMemoryStore>, Api<LicensedServer>) {
    let store = Arc::new(InMemoryStore::default());
    let dyn_store: Arc<dyn ObjectStore> = store.clone();
    (store, Api::new(dyn_store))
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let (_, api) = setup();
    assert!(api
        .get(&ObjectKey::new("tenants", "acme"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_annotation_update_round_trips() {
    let (store, api) = setup();
    let mut created = api.create(&server("tenants", "acme")).await.unwrap();
    assert!(created.metadata.uid.is_some());

    created.set_serial_number(&SerialNumber::new("SN-42"));
    let updated = api.update(&created).await.unwrap();
    assert_eq!(updated.serial_number(), Some(SerialNumber::new("SN-42")));
    // Metadata-only change
    assert_eq!(updated.metadata.generation, 1);

    let ops: Vec<_> = store.writes().await.into_iter().map(|w| w.op).collect();
    assert_eq!(ops, vec![WriteOp::Create, WriteOp::Update]);
}

#[tokio::test]
async fn test_concurrent_writers_conflict() {
    let (_, api) = setup();
    let created = api.create(&server("tenants", "acme")).await.unwrap();

    let mut a = created.clone();
    let mut b = created;
    a.status.serial_issued = true;
    b.status.serial_issued = true;

    api.update_status(&a).await.unwrap();
    let err = api.update_status(&b).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_list_by_namespace() {
    let (_, api) = setup();
    api.create(&server("tenants", "acme")).await.unwrap();
    api.create(&server("tenants", "globex")).await.unwrap();
    api.create(&server("staging", "acme")).await.unwrap();

    assert_eq!(api.list_all().await.unwrap().len(), 3);
    let tenants = api.list(&ListParams::namespaced("tenants")).await.unwrap();
    let names: Vec<_> = tenants.iter().map(|s| s.metadata.name.as_str()).collect();
    assert_eq!(names, vec!["acme", "globex"]);
}

#[tokio::test]
async fn test_delete_through_api() {
    let (_, api) = setup();
    api.create(&server("tenants", "acme")).await.unwrap();
    let key = ObjectKey::new("tenants", "acme");
    assert!(api.delete(&key).await.unwrap());
    assert!(api.get(&key).await.unwrap().is_none());
}
