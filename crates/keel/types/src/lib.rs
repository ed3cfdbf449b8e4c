//! Keel Types - Core object model for the convergence engine
//!
//! Keel drives cluster state toward user-declared desired state for two
//! resource kinds and the subordinate objects derived from them.
//!
//! ## Key Concepts
//!
//! - **HostedService**: multi-region hosted service, materialized as DNS records
//! - **LicensedServer**: licensed application server, materialized as a
//!   service, ingress, storage claim and deployment
//! - **LicenseIssuer**: credentials for the external licensing authority
//! - **Node**: observed cluster member whose readiness drives DNS targets
//! - **Subordinates**: objects created by the engine, each carrying an owner
//!   back-reference to the desired object that caused them
//! - **ResourceRegistry**: explicit kind -> codec mapping, passed around as a
//!   dependency

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

/// Implement [`Resource`] for a struct with a `metadata: ObjectMeta` field
macro_rules! impl_resource {
    ($ty:ty, $kind:expr) => {
        impl $crate::resource::Resource for $ty {
            const KIND: $crate::kind::ResourceKind = $kind;

            fn meta(&self) -> &$crate::meta::ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut $crate::meta::ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

pub mod error;
pub mod hosted;
pub mod issuer;
pub mod kind;
pub mod licensed;
pub mod meta;
pub mod names;
pub mod node;
pub mod registry;
pub mod resource;
pub mod workload;

// Re-export main types
pub use error::{CodecError, SpecValidationError};
pub use hosted::{HostedService, HostedServiceSpec, HostedServiceStatus, MAX_REPLICAS};
pub use issuer::{IssuerAuth, LicenseIssuer, LicenseIssuerSpec};
pub use kind::ResourceKind;
pub use licensed::{
    IngressHost, LicenseFeatures, LicenseRef, LicensedServer, LicensedServerSpec,
    LicensedServerStatus, SerialNumber, SERIAL_NUMBER_ANNOTATION,
};
pub use meta::{ObjectKey, ObjectMeta, OwnerReference};
pub use node::{ConditionStatus, Node, NodeAddress, NodeAddressType, NodeCondition, NodeStatus};
pub use registry::{KindCodec, ResourceRegistry};
pub use resource::{DynamicObject, HasStatus, Resource};
pub use workload::{
    AccessMode, ContainerPort, Deployment, DeploymentSpec, DnsEndpoint, DnsEndpointSpec, EnvVar,
    EnvVarSource, Endpoint, Ingress, IngressBackend, IngressSpec, IngressTls,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PodContainer, PodTemplate, Protocol,
    RecordType, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
