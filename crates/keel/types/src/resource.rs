//! Resource traits and the type-erased object form

use serde::de::DeserializeOwned;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CodecError, ObjectKey, ObjectMeta, OwnerReference, ResourceKind};

/// A typed object stored in the object store
pub trait Resource: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: ResourceKind;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        self.meta().key()
    }

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn namespace(&self) -> &str {
        &self.meta().namespace
    }

    /// Back-reference to stamp on subordinates; `None` until the store has
    /// assigned a uid.
    fn owner_ref(&self) -> Option<OwnerReference> {
        let meta = self.meta();
        meta.uid.as_ref().map(|uid| OwnerReference {
            kind: Self::KIND,
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            uid: uid.clone(),
        })
    }
}

/// Desired-state resources carrying an observed status
pub trait HasStatus: Resource {
    type Status: Clone + PartialEq + Send + Sync + std::fmt::Debug;

    fn status(&self) -> &Self::Status;

    fn status_mut(&mut self) -> &mut Self::Status;
}

/// Type-erased object as held by the store.
///
/// Serializes as a manifest: `{"kind": ..., "metadata": ..., <data fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    pub kind: ResourceKind,

    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Every top-level field other than `kind` and `metadata`
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl DynamicObject {
    pub fn from_resource<R: Resource>(resource: &R) -> Result<Self, CodecError> {
        let value = serde_json::to_value(resource).map_err(|source| CodecError::Malformed {
            kind: R::KIND,
            source,
        })?;
        let Value::Object(mut data) = value else {
            return Err(CodecError::Malformed {
                kind: R::KIND,
                source: serde_json::Error::custom("resource did not serialize to an object"),
            });
        };
        data.remove("metadata");
        Ok(Self {
            kind: R::KIND,
            metadata: resource.meta().clone(),
            data,
        })
    }

    pub fn into_resource<R: Resource>(self) -> Result<R, CodecError> {
        if self.kind != R::KIND {
            return Err(CodecError::KindMismatch {
                expected: R::KIND,
                actual: self.kind,
            });
        }
        let mut map = self.data;
        let metadata = serde_json::to_value(&self.metadata).map_err(|source| {
            CodecError::Malformed {
                kind: R::KIND,
                source,
            }
        })?;
        map.insert("metadata".to_string(), metadata);
        serde_json::from_value(Value::Object(map)).map_err(|source| CodecError::Malformed {
            kind: R::KIND,
            source,
        })
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn spec(&self) -> Option<&Value> {
        self.data.get("spec")
    }

    pub fn status(&self) -> Option<&Value> {
        self.data.get("status")
    }
}
