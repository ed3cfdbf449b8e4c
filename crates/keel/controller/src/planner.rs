//! Subordinate planning for LicensedServers
//!
//! Pure builders: given a LicensedServer, produce the service, ingress,
//! storage claim and deployment that should exist for it. Nothing here
//! touches the store.

use keel_types::{
    names, AccessMode, ContainerPort, Deployment, DeploymentSpec, EnvVar, EnvVarSource, Ingress,
    IngressBackend, IngressSpec, IngressTls, LicensedServer, ObjectMeta, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PodContainer, PodTemplate, Protocol, Service, ServicePort,
    ServiceSpec, Volume, VolumeMount, SERIAL_NUMBER_ANNOTATION,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const WEB_PORT: u16 = 8060;
pub const WEB_PORT_NAME: &str = "web";
pub const CONTAINER_NAME: &str = "cometd";
pub const DATA_VOLUME: &str = "cometd-data";
pub const SERIAL_ENV: &str = "COMET_LICENSE_SERIAL";
pub const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

/// Deployment-wide knobs for the generated objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerOptions {
    /// Image repository; the server's version is used as the tag
    #[serde(default = "default_image_repository")]
    pub image_repository: String,

    #[serde(default = "default_storage_class")]
    pub storage_class: String,

    #[serde(default = "default_storage_size")]
    pub storage_size: String,

    #[serde(default = "default_ingress_class")]
    pub ingress_class: String,

    /// Certificate issuer named in the ingress annotation
    #[serde(default = "default_cluster_issuer")]
    pub cluster_issuer: String,

    #[serde(default = "default_tls_secret")]
    pub tls_secret: String,
}

fn default_image_repository() -> String {
    "ghcr.io/cometbackup/comet-server".to_string()
}

fn default_storage_class() -> String {
    "hostpath".to_string()
}

fn default_storage_size() -> String {
    "8Gi".to_string()
}

fn default_ingress_class() -> String {
    "traefik".to_string()
}

fn default_cluster_issuer() -> String {
    "letsencrypt-prod".to_string()
}

fn default_tls_secret() -> String {
    "letsencrypt-prod".to_string()
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            image_repository: default_image_repository(),
            storage_class: default_storage_class(),
            storage_size: default_storage_size(),
            ingress_class: default_ingress_class(),
            cluster_issuer: default_cluster_issuer(),
            tls_secret: default_tls_secret(),
        }
    }
}

/// Every subordinate for one LicensedServer
#[derive(Debug, Clone, PartialEq)]
pub struct SubordinatePlan {
    pub service: Service,
    pub ingress: Ingress,
    pub claim: PersistentVolumeClaim,
    pub deployment: Deployment,
}

/// Builds subordinate objects from a LicensedServer
#[derive(Debug, Clone, Default)]
pub struct SubordinatePlanner {
    options: PlannerOptions,
}

fn app_labels(server: &LicensedServer) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), server.metadata.name.clone())])
}

fn subordinate_meta(server: &LicensedServer, name: String) -> ObjectMeta {
    ObjectMeta::new(server.metadata.namespace.clone(), name).with_labels(app_labels(server))
}

impl SubordinatePlanner {
    pub fn new(options: PlannerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    pub fn plan(&self, server: &LicensedServer) -> SubordinatePlan {
        SubordinatePlan {
            service: self.service(server),
            ingress: self.ingress(server),
            claim: self.claim(server),
            deployment: self.deployment(server),
        }
    }

    /// Headless service on the web port
    pub fn service(&self, server: &LicensedServer) -> Service {
        Service::new(
            subordinate_meta(server, names::service_name(&server.metadata.name)),
            ServiceSpec {
                ports: vec![ServicePort {
                    name: WEB_PORT_NAME.to_string(),
                    port: WEB_PORT,
                    protocol: Protocol::Tcp,
                }],
                selector: app_labels(server),
                cluster_ip: Some("None".to_string()),
            },
        )
    }

    /// TLS ingress for the server's FQDN and its wildcard
    pub fn ingress(&self, server: &LicensedServer) -> Ingress {
        let fqdn = server.fqdn();
        let mut metadata = subordinate_meta(server, names::ingress_name(&server.metadata.name));
        metadata.set_annotation(CLUSTER_ISSUER_ANNOTATION, self.options.cluster_issuer.clone());

        Ingress::new(
            metadata,
            IngressSpec {
                ingress_class_name: Some(self.options.ingress_class.clone()),
                tls: vec![IngressTls {
                    hosts: vec![format!("*.{fqdn}"), fqdn],
                    secret_name: self.options.tls_secret.clone(),
                }],
                default_backend: Some(IngressBackend {
                    service_name: names::service_name(&server.metadata.name),
                    port_name: WEB_PORT_NAME.to_string(),
                }),
            },
        )
    }

    pub fn claim(&self, server: &LicensedServer) -> PersistentVolumeClaim {
        PersistentVolumeClaim::new(
            subordinate_meta(server, names::claim_name(&server.metadata.name)),
            PersistentVolumeClaimSpec {
                access_modes: vec![AccessMode::ReadWriteOnce],
                storage_class_name: Some(self.options.storage_class.clone()),
                storage: self.options.storage_size.clone(),
            },
        )
    }

    /// Single-replica deployment. The serial reaches the container by field
    /// reference to the pod's annotations, never as a literal.
    pub fn deployment(&self, server: &LicensedServer) -> Deployment {
        let container = PodContainer {
            name: CONTAINER_NAME.to_string(),
            image: format!("{}:{}", self.options.image_repository, server.spec.version),
            image_pull_policy: Some("Always".to_string()),
            ports: vec![ContainerPort {
                name: WEB_PORT_NAME.to_string(),
                container_port: WEB_PORT,
                protocol: Protocol::Tcp,
            }],
            env: vec![EnvVar {
                name: SERIAL_ENV.to_string(),
                value: None,
                value_from: Some(EnvVarSource::FieldRef {
                    field_path: format!("metadata.annotations['{SERIAL_NUMBER_ANNOTATION}']"),
                }),
            }],
            volume_mounts: vec![
                VolumeMount {
                    name: DATA_VOLUME.to_string(),
                    mount_path: "/var/lib/cometd".to_string(),
                    sub_path: Some("data".to_string()),
                },
                VolumeMount {
                    name: DATA_VOLUME.to_string(),
                    mount_path: "/var/log/cometd".to_string(),
                    sub_path: Some("logs".to_string()),
                },
            ],
        };

        Deployment::new(
            subordinate_meta(server, names::deployment_name(&server.metadata.name)),
            DeploymentSpec {
                replicas: 1,
                selector: app_labels(server),
                template: PodTemplate {
                    labels: app_labels(server),
                    annotations: server.metadata.annotations.clone(),
                    containers: vec![container],
                    volumes: vec![Volume {
                        name: DATA_VOLUME.to_string(),
                        claim_name: names::claim_name(&server.metadata.name),
                    }],
                },
            },
        )
    }
}
