//! LicensedServer: a licensed application server definition

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{HasStatus, ObjectMeta, ResourceKind, SpecValidationError};

/// Annotation carrying the issued serial number.
///
/// Presence of this annotation is the only record that issuance happened.
pub const SERIAL_NUMBER_ANNOTATION: &str = "keel.io/serial-number";

/// Feature name -> quantity limit
pub type LicenseFeatures = BTreeMap<String, u32>;

/// Opaque license serial, issued at most once per object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialNumber(String);

impl SerialNumber {
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicensedServer {
    pub metadata: ObjectMeta,

    pub spec: LicensedServerSpec,

    #[serde(default)]
    pub status: LicensedServerStatus,
}

impl_resource!(LicensedServer, ResourceKind::LicensedServer);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensedServerSpec {
    /// Image tag of the application server
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub license: LicenseRef,

    #[serde(default)]
    pub ingress: IngressHost,
}

/// Reference to the issuer plus the features requested from it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRef {
    /// Name of a LicenseIssuer in the same namespace
    #[serde(default)]
    pub issuer: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: LicenseFeatures,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressHost {
    /// Base domain; the server is exposed at `<name>.<host>`
    #[serde(default)]
    pub host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensedServerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub serial_issued: bool,
}

impl LicensedServerSpec {
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.version.is_empty() {
            return Err(SpecValidationError::EmptyField { field: "version" });
        }
        if self.license.issuer.is_empty() {
            return Err(SpecValidationError::EmptyField {
                field: "license.issuer",
            });
        }
        if self.ingress.host.is_empty() {
            return Err(SpecValidationError::EmptyField {
                field: "ingress.host",
            });
        }
        Ok(())
    }
}

impl LicensedServer {
    pub fn new(metadata: ObjectMeta, spec: LicensedServerSpec) -> Self {
        Self {
            metadata,
            spec,
            status: LicensedServerStatus::default(),
        }
    }

    pub fn serial_number(&self) -> Option<SerialNumber> {
        self.metadata
            .annotation(SERIAL_NUMBER_ANNOTATION)
            .filter(|s| !s.is_empty())
            .map(SerialNumber::new)
    }

    pub fn set_serial_number(&mut self, serial: &SerialNumber) {
        self.metadata
            .set_annotation(SERIAL_NUMBER_ANNOTATION, serial.as_str());
    }

    /// `<name>.<ingress.host>`
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.metadata.name, self.spec.ingress.host)
    }
}

impl HasStatus for LicensedServer {
    type Status = LicensedServerStatus;

    fn status(&self) -> &Self::Status {
        &self.status
    }

    fn status_mut(&mut self) -> &mut Self::Status {
        &mut self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> LicensedServer {
        LicensedServer::new(
            ObjectMeta::new("tenants", "acme"),
            LicensedServerSpec {
                version: "23.9.0".into(),
                license: LicenseRef {
                    issuer: "comet".into(),
                    features: LicenseFeatures::new(),
                },
                ingress: IngressHost {
                    host: "backup.example".into(),
                },
            },
        )
    }

    #[test]
    fn test_serial_number_annotation() {
        let mut server = server();
        assert!(server.serial_number().is_none());

        server.set_serial_number(&SerialNumber::new("SN-1"));
        assert_eq!(server.serial_number(), Some(SerialNumber::new("SN-1")));
        assert_eq!(
            server.metadata.annotation(SERIAL_NUMBER_ANNOTATION),
            Some("SN-1")
        );
    }

    #[test]
    fn test_empty_serial_annotation_counts_as_absent() {
        let mut server = server();
        server.metadata.set_annotation(SERIAL_NUMBER_ANNOTATION, "");
        assert!(server.serial_number().is_none());
    }

    #[test]
    fn test_fqdn() {
        assert_eq!(server().fqdn(), "acme.backup.example");
    }

    #[test]
    fn test_validation_requires_issuer() {
        let mut server = server();
        assert!(server.spec.validate().is_ok());
        server.spec.license.issuer.clear();
        assert_eq!(
            server.spec.validate(),
            Err(SpecValidationError::EmptyField {
                field: "license.issuer"
            })
        );
    }

    #[test]
    fn test_features_deserialize_from_manifest() {
        let json = r#"{
            "version": "23.9.0",
            "license": {"issuer": "comet", "features": {"booster": 2, "devices": 50}},
            "ingress": {"host": "backup.example"}
        }"#;
        let spec: LicensedServerSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.license.features.get("devices"), Some(&50));
        assert_eq!(spec.license.features.len(), 2);
    }
}
