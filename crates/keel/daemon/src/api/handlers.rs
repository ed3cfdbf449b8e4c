//! Object handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use keel_store::ListParams;
use keel_types::{ObjectKey, ObjectMeta, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::manifests::apply_source;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
    })
}

/// One registered kind with an empty manifest to start from
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindInfo {
    pub kind: ResourceKind,
    pub cluster_scoped: bool,
    pub template: Value,
}

pub async fn list_kinds(State(state): State<AppState>) -> ApiResult<Json<Vec<KindInfo>>> {
    let kinds = state
        .registry
        .kinds()
        .map(|kind| -> ApiResult<KindInfo> {
            let namespace = if kind.is_cluster_scoped() { "" } else { "default" };
            let metadata = ObjectMeta::new(namespace, "example");
            let template = state.registry.default_object(kind, metadata)?;
            Ok(KindInfo {
                kind,
                cluster_scoped: kind.is_cluster_scoped(),
                template: state.registry.encode(&template)?,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(kinds))
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub namespace: Option<String>,
}

fn parse_kind(kind: &str) -> ApiResult<ResourceKind> {
    kind.parse()
        .map_err(|_| ApiError::NotFound(format!("unknown resource kind: {kind}")))
}

/// Key for a single-object route. Namespaced kinds require `?namespace=`.
fn object_key(kind: ResourceKind, name: String, scope: ScopeQuery) -> ApiResult<ObjectKey> {
    if kind.is_cluster_scoped() {
        return Ok(ObjectKey::cluster(name));
    }
    match scope.namespace.filter(|ns| !ns.is_empty()) {
        Some(namespace) => Ok(ObjectKey::new(namespace, name)),
        None => Err(ApiError::BadRequest(format!(
            "{kind} is namespaced; the namespace query parameter is required"
        ))),
    }
}

pub async fn list_objects(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let kind = parse_kind(&kind)?;
    let params = match scope.namespace {
        Some(namespace) if !kind.is_cluster_scoped() => ListParams::namespaced(namespace),
        _ => ListParams::all(),
    };

    let objects = state.store.list(kind, &params).await?;
    let encoded = objects
        .iter()
        .map(|object| state.registry.encode(object))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(encoded))
}

pub async fn get_object(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Json<Value>> {
    let kind = parse_kind(&kind)?;
    let key = object_key(kind, name, scope)?;

    let object = state
        .store
        .get(kind, &key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{kind} {key}")))?;
    Ok(Json(state.registry.encode(&object)?))
}

/// Request deletion. Objects with finalizers are only marked and disappear
/// once their controller finalizes them.
pub async fn delete_object(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<StatusCode> {
    let kind = parse_kind(&kind)?;
    let key = object_key(kind, name, scope)?;

    if state.store.delete(kind, &key).await? {
        tracing::info!(kind = %kind, key = %key, "Deletion requested");
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::NotFound(format!("{kind} {key}")))
    }
}

/// Apply a YAML or JSON body holding one or more manifests
pub async fn apply_objects(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<Vec<Value>>> {
    let applied = apply_source(state.store.as_ref(), &state.registry, &body).await?;
    if applied.is_empty() {
        return Err(ApiError::BadRequest("no manifests in request body".into()));
    }

    let encoded = applied
        .iter()
        .map(|object| state.registry.encode(object))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(encoded))
}
