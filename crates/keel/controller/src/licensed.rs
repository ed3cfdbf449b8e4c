//! LicensedServer reconciler

use async_trait::async_trait;
use keel_store::{Api, ListParams, ObjectStore, WatchEvent};
use keel_types::{
    Deployment, Ingress, LicensedServer, LicensedServerStatus, ObjectKey, PersistentVolumeClaim,
    Resource, Service,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::converge::{reconcile_one, ConvergeOutcome};
use crate::error::{ControllerError, Result};
use crate::issuance::{IssuanceOutcome, LicenseIssuance};
use crate::license::LicenseAuthority;
use crate::planner::SubordinatePlanner;
use crate::reconciler::{Action, Reconcile};
use crate::runtime::EventMapper;

pub const LICENSED_SERVER_FINALIZER: &str = "keel.io/licensed-server";

/// Issues the license, then converges service, ingress, claim and
/// deployment in that order
#[derive(Clone)]
pub struct LicensedServerReconciler {
    issuance: LicenseIssuance,
    planner: SubordinatePlanner,
    services: Api<Service>,
    ingresses: Api<Ingress>,
    claims: Api<PersistentVolumeClaim>,
    deployments: Api<Deployment>,
}

impl LicensedServerReconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        authority: Arc<dyn LicenseAuthority>,
        planner: SubordinatePlanner,
    ) -> Self {
        Self {
            issuance: LicenseIssuance::new(Arc::clone(&store), authority),
            planner,
            services: Api::new(Arc::clone(&store)),
            ingresses: Api::new(Arc::clone(&store)),
            claims: Api::new(Arc::clone(&store)),
            deployments: Api::new(store),
        }
    }
}

#[async_trait]
impl Reconcile for LicensedServerReconciler {
    type Resource = LicensedServer;

    fn finalizer(&self) -> &'static str {
        LICENSED_SERVER_FINALIZER
    }

    async fn apply(&self, server: &mut LicensedServer) -> Result<Action> {
        let key = server.key();
        server
            .spec
            .validate()
            .map_err(|source| ControllerError::InvalidSpec {
                key: key.clone(),
                source,
            })?;

        let issuance = self.issuance.ensure_serial(server).await?;
        if let IssuanceOutcome::Issued(serial) = &issuance {
            info!(key = %key, serial = %serial, "Serial number persisted");
        }

        let owner = server
            .owner_ref()
            .ok_or_else(|| ControllerError::Internal(format!("{key} has no uid")))?;
        let plan = self.planner.plan(server);

        let outcomes: [ConvergeOutcome; 4] = [
            reconcile_one(&self.services, &owner, plan.service).await?,
            reconcile_one(&self.ingresses, &owner, plan.ingress).await?,
            reconcile_one(&self.claims, &owner, plan.claim).await?,
            reconcile_one(&self.deployments, &owner, plan.deployment).await?,
        ];
        debug!(key = %key, ?outcomes, "Subordinates converged");

        server.status = LicensedServerStatus {
            observed_generation: Some(server.metadata.generation),
            serial_issued: server.serial_number().is_some(),
        };

        if outcomes.iter().any(ConvergeOutcome::is_created) {
            return Ok(Action::requeue_now());
        }
        Ok(Action::Await)
    }

    async fn cleanup(&self, server: &LicensedServer) -> Result<()> {
        // Owned subordinates are removed by cascade; the serial is never revoked
        info!(key = %server.key(), "Finalizing licensed server");
        Ok(())
    }
}

/// Maps a LicenseIssuer event to the LicensedServers in its namespace that
/// reference it, so servers waiting on a missing issuer resume promptly
#[derive(Clone)]
pub struct IssuerFanOut {
    servers: Api<LicensedServer>,
}

impl IssuerFanOut {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            servers: Api::new(store),
        }
    }
}

#[async_trait]
impl EventMapper for IssuerFanOut {
    async fn map(&self, event: &WatchEvent) -> Vec<ObjectKey> {
        let issuer = &event.object.metadata;
        let params = ListParams::namespaced(issuer.namespace.clone());
        match self.servers.list(&params).await {
            Ok(servers) => servers
                .iter()
                .filter(|s| s.spec.license.issuer == issuer.name)
                .map(Resource::key)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list licensed servers for issuer fan-out");
                Vec::new()
            }
        }
    }
}
