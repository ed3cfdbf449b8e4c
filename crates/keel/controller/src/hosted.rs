//! HostedService reconciler

use async_trait::async_trait;
use keel_store::{Api, ObjectStore, WatchEvent};
use keel_types::{
    DnsEndpoint, HostedService, HostedServiceStatus, ObjectKey, Resource,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::converge::reconcile_one;
use crate::dns::dns_endpoint_for;
use crate::error::{ControllerError, Result};
use crate::nodes::NodeHealthAggregator;
use crate::reconciler::{Action, Reconcile};
use crate::runtime::EventMapper;

pub const HOSTED_SERVICE_FINALIZER: &str = "keel.io/hosted-service";

/// Publishes the DNS record set of each HostedService
#[derive(Clone)]
pub struct HostedServiceReconciler {
    nodes: NodeHealthAggregator,
    endpoints: Api<DnsEndpoint>,
}

impl HostedServiceReconciler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            nodes: NodeHealthAggregator::new(Arc::clone(&store)),
            endpoints: Api::new(store),
        }
    }
}

#[async_trait]
impl Reconcile for HostedServiceReconciler {
    type Resource = HostedService;

    fn finalizer(&self) -> &'static str {
        HOSTED_SERVICE_FINALIZER
    }

    async fn apply(&self, service: &mut HostedService) -> Result<Action> {
        let key = service.key();
        service
            .spec
            .validate()
            .map_err(|source| ControllerError::InvalidSpec {
                key: key.clone(),
                source,
            })?;
        let owner = service
            .owner_ref()
            .ok_or_else(|| ControllerError::Internal(format!("{key} has no uid")))?;

        let targets = self.nodes.ready_targets().await?;
        let endpoint = dns_endpoint_for(service, &targets)
            .map_err(|source| ControllerError::InvalidSpec { key, source })?;
        let records = endpoint.spec.endpoints.len() as u32;

        let outcome = reconcile_one(&self.endpoints, &owner, endpoint).await?;

        service.status = HostedServiceStatus {
            observed_generation: Some(service.metadata.generation),
            ready_targets: targets.into_iter().collect(),
            records,
        };

        if outcome.is_created() {
            return Ok(Action::requeue_now());
        }
        Ok(Action::Await)
    }

    async fn cleanup(&self, service: &HostedService) -> Result<()> {
        // Owned records are removed by cascade
        info!(key = %service.key(), "Finalizing hosted service");
        Ok(())
    }
}

/// Maps every Node event to every HostedService: readiness of any node can
/// change the A record of every region. O(services) per node event.
#[derive(Clone)]
pub struct NodeFanOut {
    services: Api<HostedService>,
}

impl NodeFanOut {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            services: Api::new(store),
        }
    }
}

#[async_trait]
impl EventMapper for NodeFanOut {
    async fn map(&self, _event: &WatchEvent) -> Vec<ObjectKey> {
        match self.services.list_all().await {
            Ok(services) => services.iter().map(Resource::key).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list hosted services for node fan-out");
                Vec::new()
            }
        }
    }
}
