//! HostedService: a multi-region hosted service definition
//!
//! A HostedService is materialized purely as DNS: one address record for the
//! region pointing at every ready node, and per-replica alias records.

use serde::{Deserialize, Serialize};

use crate::{HasStatus, ObjectMeta, ResourceKind, SpecValidationError};

/// Replica names use a single lowercase letter, so 26 is the ceiling.
pub const MAX_REPLICAS: u32 = 26;

const REPLICA_LETTERS: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostedService {
    pub metadata: ObjectMeta,

    pub spec: HostedServiceSpec,

    #[serde(default)]
    pub status: HostedServiceStatus,
}

impl_resource!(HostedService, ResourceKind::HostedService);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedServiceSpec {
    /// Region identifier, the leftmost label of every record
    #[serde(default)]
    pub region: String,

    /// Hosted-zone domain suffix
    #[serde(default)]
    pub hosted_zone: String,

    #[serde(default)]
    pub replicas: u32,
}

impl HostedServiceSpec {
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.region.is_empty() {
            return Err(SpecValidationError::EmptyField { field: "region" });
        }
        if self.hosted_zone.is_empty() {
            return Err(SpecValidationError::EmptyField {
                field: "hostedZone",
            });
        }
        if self.replicas > MAX_REPLICAS {
            return Err(SpecValidationError::TooManyReplicas {
                requested: self.replicas,
                max: MAX_REPLICAS,
            });
        }
        Ok(())
    }

    /// `<region>.<hostedZone>`
    pub fn region_fqdn(&self) -> String {
        format!("{}.{}", self.region, self.hosted_zone)
    }

    /// `<region><letter>.<hostedZone>` for replica `index`, `None` past the
    /// last letter.
    pub fn pod_fqdn(&self, index: u32) -> Option<String> {
        let letter = REPLICA_LETTERS.get(usize::try_from(index).ok()?)?;
        Some(format!(
            "{}{}.{}",
            self.region,
            char::from(*letter),
            self.hosted_zone
        ))
    }
}

/// Observed state written back after each convergence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Sorted A-record targets at the last convergence
    #[serde(default)]
    pub ready_targets: Vec<String>,

    /// Number of DNS records published
    #[serde(default)]
    pub records: u32,
}

impl HostedService {
    pub fn new(metadata: ObjectMeta, spec: HostedServiceSpec) -> Self {
        Self {
            metadata,
            spec,
            status: HostedServiceStatus::default(),
        }
    }
}

impl HasStatus for HostedService {
    type Status = HostedServiceStatus;

    fn status(&self) -> &Self::Status {
        &self.status
    }

    fn status_mut(&mut self) -> &mut Self::Status {
        &mut self.status
    }
}
