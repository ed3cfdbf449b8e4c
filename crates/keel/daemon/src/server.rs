//! Process wiring and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::manifests;
use keel_controller::{
    Controller, HostedServiceReconciler, HttpLicenseAuthority, IssuerFanOut,
    LicensedServerReconciler, NodeFanOut, SubordinatePlanner,
};
use keel_store::{Api, InMemoryStore, ObjectStore};
use keel_types::{LicensedServer, ResourceKind, ResourceRegistry, SERIAL_NUMBER_ANNOTATION};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Keel daemon: the store, both controllers and the optional REST API
pub struct Daemon {
    config: DaemonConfig,
    store: Arc<dyn ObjectStore>,
    registry: Arc<ResourceRegistry>,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        let registry = Arc::new(ResourceRegistry::standard());
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new(Arc::clone(&registry)));
        Self {
            config,
            store,
            registry,
        }
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Apply the configured manifest directory, if any
    pub async fn load_manifests(&self) -> DaemonResult<usize> {
        match &self.config.manifests.dir {
            Some(dir) => manifests::load_dir(self.store.as_ref(), &self.registry, dir).await,
            None => Ok(0),
        }
    }

    /// LicensedServers that will be issued a new license because no serial
    /// survived in the store or their manifests
    pub async fn unseeded_servers(&self) -> DaemonResult<usize> {
        let servers = Api::<LicensedServer>::new(self.store()).list_all().await?;
        Ok(servers
            .iter()
            .filter(|server| server.serial_number().is_none())
            .count())
    }

    fn spawn_controllers(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> DaemonResult<Vec<JoinHandle<()>>> {
        let authority = HttpLicenseAuthority::new(&self.config.license)
            .map_err(|e| DaemonError::Config(format!("License client: {e}")))?;
        tracing::info!(endpoint = %authority.endpoint(), "License authority configured");

        let hosted = Controller::new(
            HostedServiceReconciler::new(self.store()),
            self.store(),
            self.config.controller.clone(),
        )
        .owns(ResourceKind::DnsEndpoint)
        .watches(ResourceKind::Node, Arc::new(NodeFanOut::new(self.store())));

        let licensed = Controller::new(
            LicensedServerReconciler::new(
                self.store(),
                Arc::new(authority),
                SubordinatePlanner::new(self.config.planner.clone()),
            ),
            self.store(),
            self.config.controller.clone(),
        )
        .owns(ResourceKind::Service)
        .owns(ResourceKind::Ingress)
        .owns(ResourceKind::PersistentVolumeClaim)
        .owns(ResourceKind::Deployment)
        .watches(
            ResourceKind::LicenseIssuer,
            Arc::new(IssuerFanOut::new(self.store())),
        );

        Ok(vec![
            tokio::spawn(hosted.run(shutdown.clone())),
            tokio::spawn(licensed.run(shutdown)),
        ])
    }

    /// Run until ctrl-c or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then stop the API and drain controllers
    pub async fn run_until<F>(self, shutdown: F) -> DaemonResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let loaded = self.load_manifests().await?;
        if loaded > 0 {
            tracing::info!(objects = loaded, "Startup manifests applied");
        }

        let unseeded = self.unseeded_servers().await?;
        tracing::warn!(
            unseeded,
            annotation = SERIAL_NUMBER_ANNOTATION,
            "Object store is in-memory; LicensedServers without a serial annotation in their manifests are issued a new license on every start"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let controllers = self.spawn_controllers(stop_rx)?;

        if self.config.server.api_enabled {
            let addr = self.config.server.listen_addr;
            let listener = TcpListener::bind(addr).await?;
            tracing::info!("Keel daemon listening on {}", addr);

            let app = create_router(AppState::new(self.store(), Arc::clone(&self.registry)));
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
                .map_err(|e| DaemonError::Server(e.to_string()))?;
        } else {
            tracing::info!("REST API disabled");
            shutdown.await;
        }

        tracing::info!("Keel daemon shutting down");
        let _ = stop_tx.send(true);
        for handle in controllers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Controller task failed");
            }
        }
        Ok(())
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
