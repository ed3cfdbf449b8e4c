//! LicenseIssuer: credentials for the external licensing authority
//!
//! Issuers are only ever read by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{LicenseFeatures, ObjectMeta, ResourceKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseIssuer {
    pub metadata: ObjectMeta,

    pub spec: LicenseIssuerSpec,
}

impl_resource!(LicenseIssuer, ResourceKind::LicenseIssuer);

impl LicenseIssuer {
    pub fn new(metadata: ObjectMeta, spec: LicenseIssuerSpec) -> Self {
        Self { metadata, spec }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseIssuerSpec {
    #[serde(default)]
    pub auth: IssuerAuth,

    /// Features this issuer is allowed to grant
    #[serde(default, skip_serializing_if = "LicenseFeatures::is_empty")]
    pub features: LicenseFeatures,
}

/// Account credentials
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerAuth {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub token: String,
}

impl fmt::Debug for IssuerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerAuth")
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted_from_debug() {
        let auth = IssuerAuth {
            email: "ops@example.com".into(),
            token: "s3cret".into(),
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("ops@example.com"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_deserialize_issuer() {
        let json = r#"{
            "metadata": {"name": "comet", "namespace": "tenants"},
            "spec": {"auth": {"email": "a@b.c", "token": "t"}}
        }"#;
        let issuer: LicenseIssuer = serde_json::from_str(json).unwrap();
        assert_eq!(issuer.spec.auth.token, "t");
        assert!(issuer.spec.features.is_empty());
    }
}
