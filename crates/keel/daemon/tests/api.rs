//! REST handlers exercised in-process

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use keel_daemon::{create_router, AppState};
use keel_store::{InMemoryStore, ObjectStore};
use keel_types::{ObjectKey, ResourceKind, ResourceRegistry};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const MANIFESTS: &str = r#"
kind: HostedService
metadata:
  namespace: prod
  name: edge
spec:
  region: eu
  hostedZone: z.example
  replicas: 1
---
kind: Node
metadata:
  name: worker-1
"#;

fn app() -> (Router, Arc<InMemoryStore>) {
    let registry = Arc::new(ResourceRegistry::standard());
    let store = Arc::new(InMemoryStore::new(Arc::clone(&registry)));
    let dyn_store: Arc<dyn ObjectStore> = store.clone();
    (create_router(AppState::new(dyn_store, registry)), store)
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_healthz() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/healthz", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_apply_then_get_and_list() {
    let (app, store) = app();

    let (status, body) = send(&app, Method::POST, "/api/v1/objects", Body::from(MANIFESTS)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert_eq!(store.count(ResourceKind::HostedService).await, 1);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/objects/hostedservices/edge?namespace=prod",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "HostedService");
    assert_eq!(body["spec"]["hostedZone"], "z.example");
    assert!(body["metadata"]["uid"].is_string());

    let (status, body) = send(&app, Method::GET, "/api/v1/objects/Node", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["metadata"]["name"], "worker-1");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/objects/hostedservices?namespace=staging",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_missing_object_is_404() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/objects/hostedservices/nope?namespace=prod",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_kind_is_404() {
    let (app, _) = app();
    let (status, _) = send(&app, Method::GET, "/api/v1/objects/pods", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_namespaced_get_requires_namespace() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/objects/hostedservices/edge",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalid_manifest_is_400() {
    let (app, _) = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/objects",
        Body::from("metadata:\n  name: x\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/v1/objects", Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_without_finalizer_removes_object() {
    let (app, store) = app();
    send(&app, Method::POST, "/api/v1/objects", Body::from(MANIFESTS)).await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/v1/objects/hostedservices/edge?namespace=prod",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(store
        .get(ResourceKind::HostedService, &ObjectKey::new("prod", "edge"))
        .await
        .unwrap()
        .is_none());

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/v1/objects/hostedservices/edge?namespace=prod",
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_kinds_lists_templates() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/kinds", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);

    let kinds = body.as_array().unwrap();
    assert_eq!(kinds.len(), ResourceKind::ALL.len());

    let hosted = kinds.iter().find(|k| k["kind"] == "HostedService").unwrap();
    assert_eq!(hosted["clusterScoped"], false);
    assert_eq!(hosted["template"]["kind"], "HostedService");
    assert_eq!(hosted["template"]["metadata"]["namespace"], "default");
    assert!(hosted["template"]["spec"].is_object());

    let node = kinds.iter().find(|k| k["kind"] == "Node").unwrap();
    assert_eq!(node["clusterScoped"], true);
    assert!(node["template"]["metadata"].get("namespace").is_none());
}
