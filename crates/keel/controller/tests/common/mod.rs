#![allow(dead_code)]

use async_trait::async_trait;
use keel_controller::{LicenseAuthority, LicenseError};
use keel_store::{InMemoryStore, ObjectStore};
use keel_types::{
    ConditionStatus, HostedService, HostedServiceSpec, IngressHost, IssuerAuth, LicenseFeatures,
    LicenseIssuer, LicenseIssuerSpec, LicenseRef, LicensedServer, LicensedServerSpec, Node,
    NodeAddress, NodeCondition, NodeStatus, ObjectMeta, SerialNumber,
};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn stores() -> (Arc<InMemoryStore>, Arc<dyn ObjectStore>) {
    let store = Arc::new(InMemoryStore::default());
    let dyn_store: Arc<dyn ObjectStore> = store.clone();
    (store, dyn_store)
}

pub fn hosted(namespace: &str, name: &str, region: &str, replicas: u32) -> HostedService {
    HostedService::new(
        ObjectMeta::new(namespace, name),
        HostedServiceSpec {
            region: region.into(),
            hosted_zone: "z.example".into(),
            replicas,
        },
    )
}

pub fn node(name: &str, ready: ConditionStatus, external_ip: &str) -> Node {
    Node::new(
        name,
        NodeStatus {
            conditions: vec![NodeCondition::ready(ready)],
            addresses: vec![
                NodeAddress::internal("10.0.0.1"),
                NodeAddress::external(external_ip),
            ],
        },
    )
}

pub fn licensed(namespace: &str, name: &str) -> LicensedServer {
    LicensedServer::new(
        ObjectMeta::new(namespace, name),
        LicensedServerSpec {
            version: "23.9.0".into(),
            license: LicenseRef {
                issuer: "comet".into(),
                features: LicenseFeatures::from([("devices".to_string(), 10)]),
            },
            ingress: IngressHost {
                host: "backup.example".into(),
            },
        },
    )
}

pub fn issuer(namespace: &str) -> LicenseIssuer {
    LicenseIssuer::new(
        ObjectMeta::new(namespace, "comet"),
        LicenseIssuerSpec {
            auth: IssuerAuth {
                email: "ops@example.com".into(),
                token: "tok".into(),
            },
            features: LicenseFeatures::new(),
        },
    )
}

/// Authority that mints `SN-<n>` and counts calls
#[derive(Default)]
pub struct CountingAuthority {
    calls: AtomicUsize,
}

impl CountingAuthority {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LicenseAuthority for CountingAuthority {
    async fn create_license(
        &self,
        _auth: &IssuerAuth,
        _features: &LicenseFeatures,
    ) -> Result<SerialNumber, LicenseError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SerialNumber::new(format!("SN-{n}")))
    }
}

/// Authority that always rejects
pub struct RejectingAuthority;

#[async_trait]
impl LicenseAuthority for RejectingAuthority {
    async fn create_license(
        &self,
        _auth: &IssuerAuth,
        _features: &LicenseFeatures,
    ) -> Result<SerialNumber, LicenseError> {
        Err(LicenseError::Rejected {
            status: 403,
            body: "quota exceeded".into(),
        })
    }
}

/// Poll `check` until it returns true or five seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
