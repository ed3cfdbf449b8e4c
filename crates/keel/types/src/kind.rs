//! Resource kinds known to the engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CodecError;

/// Every object kind the engine reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Multi-region hosted service (desired state)
    HostedService,
    /// Licensed application server (desired state)
    LicensedServer,
    /// Credentials for the licensing authority
    LicenseIssuer,
    /// Observed cluster member
    Node,
    /// Network endpoint
    Service,
    /// Ingress rule
    Ingress,
    /// Storage claim
    PersistentVolumeClaim,
    /// Workload deployment
    Deployment,
    /// DNS record set
    DnsEndpoint,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::HostedService,
        ResourceKind::LicensedServer,
        ResourceKind::LicenseIssuer,
        ResourceKind::Node,
        ResourceKind::Service,
        ResourceKind::Ingress,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::Deployment,
        ResourceKind::DnsEndpoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::HostedService => "HostedService",
            ResourceKind::LicensedServer => "LicensedServer",
            ResourceKind::LicenseIssuer => "LicenseIssuer",
            ResourceKind::Node => "Node",
            ResourceKind::Service => "Service",
            ResourceKind::Ingress => "Ingress",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::DnsEndpoint => "DnsEndpoint",
        }
    }

    /// Cluster-scoped kinds have an empty namespace
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, ResourceKind::Node)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CodecError;

    /// Accepts the kind name case-insensitively, plus the lowercase plural
    /// used in REST paths (`hostedservices`, `nodes`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        ResourceKind::ALL
            .into_iter()
            .find(|kind| {
                let name = kind.as_str().to_ascii_lowercase();
                lower == name || lower == format!("{name}s")
            })
            .ok_or_else(|| CodecError::UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind_names() {
        assert_eq!(
            "HostedService".parse::<ResourceKind>().unwrap(),
            ResourceKind::HostedService
        );
        assert_eq!(
            "persistentvolumeclaims".parse::<ResourceKind>().unwrap(),
            ResourceKind::PersistentVolumeClaim
        );
        assert_eq!("nodes".parse::<ResourceKind>().unwrap(), ResourceKind::Node);
        assert!("Pod".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.to_string().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_only_nodes_are_cluster_scoped() {
        let scoped: Vec<_> = ResourceKind::ALL
            .into_iter()
            .filter(ResourceKind::is_cluster_scoped)
            .collect();
        assert_eq!(scoped, vec![ResourceKind::Node]);
    }
}
