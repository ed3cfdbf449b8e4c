//! Explicit kind registry
//!
//! Maps each [`ResourceKind`] to a set of codec functions that convert
//! between manifest JSON and [`DynamicObject`] through the typed struct. The
//! registry is built once and handed to whoever needs it.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    CodecError, Deployment, DnsEndpoint, DynamicObject, HostedService, Ingress, LicenseIssuer,
    LicensedServer, Node, ObjectMeta, PersistentVolumeClaim, Resource, ResourceKind, Service,
};

/// Codec functions for one kind
#[derive(Clone, Copy)]
pub struct KindCodec {
    /// Manifest JSON -> validated dynamic object
    pub decode: fn(Value) -> Result<DynamicObject, CodecError>,
    /// Dynamic object -> manifest JSON (with `kind`)
    pub encode: fn(&DynamicObject) -> Result<Value, CodecError>,
    /// Empty object of this kind carrying the given metadata
    pub default: fn(ObjectMeta) -> Result<DynamicObject, CodecError>,
}

impl std::fmt::Debug for KindCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KindCodec")
    }
}

fn decode_typed<R: Resource>(manifest: Value) -> Result<DynamicObject, CodecError> {
    let resource: R = serde_json::from_value(manifest)
        .map_err(|source| CodecError::Malformed { kind: R::KIND, source })?;
    DynamicObject::from_resource(&resource)
}

fn encode_typed<R: Resource>(object: &DynamicObject) -> Result<Value, CodecError> {
    let resource: R = object.clone().into_resource()?;
    let normalized = DynamicObject::from_resource(&resource)?;
    serde_json::to_value(&normalized).map_err(|source| CodecError::Malformed { kind: R::KIND, source })
}

fn default_typed<R: Resource + Default>(metadata: ObjectMeta) -> Result<DynamicObject, CodecError> {
    let mut resource = R::default();
    *resource.meta_mut() = metadata;
    DynamicObject::from_resource(&resource)
}

/// Kind -> codec mapping
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    codecs: BTreeMap<ResourceKind, KindCodec>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every kind the engine knows about
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register::<HostedService>()
            .register::<LicensedServer>()
            .register::<LicenseIssuer>()
            .register::<Node>()
            .register::<Service>()
            .register::<Ingress>()
            .register::<PersistentVolumeClaim>()
            .register::<Deployment>()
            .register::<DnsEndpoint>();
        registry
    }

    pub fn register<R: Resource + Default>(&mut self) -> &mut Self {
        self.codecs.insert(
            R::KIND,
            KindCodec {
                decode: decode_typed::<R>,
                encode: encode_typed::<R>,
                default: default_typed::<R>,
            },
        );
        self
    }

    pub fn is_registered(&self, kind: ResourceKind) -> bool {
        self.codecs.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.codecs.keys().copied()
    }

    fn codec(&self, kind: ResourceKind) -> Result<&KindCodec, CodecError> {
        self.codecs.get(&kind).ok_or(CodecError::Unregistered(kind))
    }

    /// Decode a manifest of the form `{"kind": ..., "metadata": ..., ...}`
    pub fn decode(&self, manifest: Value) -> Result<DynamicObject, CodecError> {
        let kind: ResourceKind = manifest
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingKind)?
            .parse()?;
        (self.codec(kind)?.decode)(manifest)
    }

    pub fn encode(&self, object: &DynamicObject) -> Result<Value, CodecError> {
        (self.codec(object.kind)?.encode)(object)
    }

    pub fn default_object(
        &self,
        kind: ResourceKind,
        metadata: ObjectMeta,
    ) -> Result<DynamicObject, CodecError> {
        (self.codec(kind)?.default)(metadata)
    }

    /// Round-trip through the typed struct, dropping unknown fields and
    /// filling defaults
    pub fn normalize(&self, object: DynamicObject) -> Result<DynamicObject, CodecError> {
        let manifest = self.encode(&object)?;
        self.decode(manifest)
    }
}
