//! Controller runtime
//!
//! Turns watch events, periodic resyncs and requeues into reconcile requests
//! on a [`WorkQueue`] and runs them on a bounded number of concurrent
//! workers.

use async_trait::async_trait;
use keel_store::{Api, ObjectStore, WatchEvent};
use keel_types::{ObjectKey, Resource, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, Semaphore};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::queue::WorkQueue;
use crate::reconciler::{reconcile_key, Action, Reconcile};

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Interval between full resyncs of every primary object (seconds)
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Maximum number of keys reconciled at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_reconciles: usize,

    /// First retry delay after a failed pass (milliseconds)
    #[serde(default = "default_retry_base")]
    pub retry_base_ms: u64,

    /// Ceiling for the retry delay (milliseconds)
    #[serde(default = "default_retry_max")]
    pub retry_max_ms: u64,
}

fn default_resync_interval() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    4
}

fn default_retry_base() -> u64 {
    500
}

fn default_retry_max() -> u64 {
    60_000
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval(),
            max_concurrent_reconciles: default_max_concurrent(),
            retry_base_ms: default_retry_base(),
            retry_max_ms: default_retry_max(),
        }
    }
}

impl ControllerConfig {
    /// Delay before retrying a key that has failed `failures` times in a row
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32);
        let delay = self
            .retry_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.retry_max_ms);
        Duration::from_millis(delay)
    }
}

/// Maps an event on a secondary kind to primary reconcile keys
#[async_trait]
pub trait EventMapper: Send + Sync {
    async fn map(&self, event: &WatchEvent) -> Vec<ObjectKey>;
}

/// Drives one [`Reconcile`] implementation
pub struct Controller<R: Reconcile> {
    reconciler: Arc<R>,
    api: Api<R::Resource>,
    store: Arc<dyn ObjectStore>,
    config: ControllerConfig,
    queue: Arc<WorkQueue<ObjectKey>>,
    owned: Vec<ResourceKind>,
    mappers: Vec<(ResourceKind, Arc<dyn EventMapper>)>,
    failures: Arc<Mutex<HashMap<ObjectKey, u32>>>,
}

impl<R: Reconcile> Controller<R> {
    pub fn new(reconciler: R, store: Arc<dyn ObjectStore>, config: ControllerConfig) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            api: Api::new(Arc::clone(&store)),
            store,
            config,
            queue: Arc::new(WorkQueue::new()),
            owned: Vec::new(),
            mappers: Vec::new(),
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Route events of `kind` back to the owning primary object
    pub fn owns(mut self, kind: ResourceKind) -> Self {
        self.owned.push(kind);
        self
    }

    /// Route events of `kind` through `mapper`
    pub fn watches(mut self, kind: ResourceKind, mapper: Arc<dyn EventMapper>) -> Self {
        self.mappers.push((kind, mapper));
        self
    }

    pub fn queue(&self) -> Arc<WorkQueue<ObjectKey>> {
        Arc::clone(&self.queue)
    }

    /// Run until `shutdown` flips to true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let kind = <R::Resource as Resource>::KIND;
        let this = Arc::new(self);
        let mut events = this.store.watch();

        info!(kind = %kind, "Controller started");

        let workers = tokio::spawn(Arc::clone(&this).dispatch());

        let mut resync = interval(Duration::from_secs(this.config.resync_interval_secs.max(1)));
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = resync.tick() => {
                    this.resync().await;
                }
                event = events.recv() => match event {
                    Ok(event) => this.route(&event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(kind = %kind, missed, "Watch stream lagged, resyncing");
                        this.resync().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!(kind = %kind, "Watch stream closed");
                        break;
                    }
                },
            }
        }

        this.queue.shutdown().await;
        if let Err(e) = workers.await {
            error!(kind = %kind, error = %e, "Worker dispatcher panicked");
        }
        info!(kind = %kind, "Controller stopped");
    }

    /// Enqueue every primary object
    async fn resync(&self) {
        let kind = <R::Resource as Resource>::KIND;
        match self.api.list_all().await {
            Ok(objects) => {
                debug!(kind = %kind, count = objects.len(), "Resync");
                for object in objects {
                    self.queue.add(object.key()).await;
                }
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Resync list failed");
            }
        }
    }

    async fn route(&self, event: &WatchEvent) {
        let primary = <R::Resource as Resource>::KIND;
        let object = &event.object;

        if object.kind == primary {
            self.queue.add(object.key()).await;
            return;
        }

        if self.owned.contains(&object.kind) {
            for owner in object
                .metadata
                .owner_references
                .iter()
                .filter(|o| o.kind == primary)
            {
                self.queue.add(owner.key()).await;
            }
        }

        for (kind, mapper) in &self.mappers {
            if *kind == object.kind {
                for key in mapper.map(event).await {
                    self.queue.add(key).await;
                }
            }
        }
    }

    /// Pull keys off the queue, one task per key, bounded by the semaphore
    async fn dispatch(self: Arc<Self>) {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_reconciles.max(1)));
        loop {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let Some(key) = self.queue.next().await else {
                break;
            };
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                this.process(key).await;
                drop(permit);
            });
        }

        // Wait for in-flight passes
        let total = self.config.max_concurrent_reconciles.max(1) as u32;
        let _ = permits.acquire_many(total).await;
    }

    async fn process(&self, key: ObjectKey) {
        let result = reconcile_key(&*self.reconciler, &self.api, &key).await;

        match result {
            Ok(action) => {
                self.failures.lock().await.remove(&key);
                if let Action::Requeue(after) = action {
                    self.schedule(key.clone(), after).await;
                }
            }
            Err(e) if e.is_conflict() => {
                debug!(key = %key, error = %e, "Conflict, requeueing");
                self.queue.add(key.clone()).await;
            }
            Err(e) => {
                let failures = {
                    let mut failures = self.failures.lock().await;
                    let count = failures.entry(key.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                let delay = self.config.backoff(failures);
                warn!(
                    key = %key,
                    error = %e,
                    failures,
                    retry_ms = delay.as_millis() as u64,
                    "Reconcile failed"
                );
                self.schedule(key.clone(), delay).await;
            }
        }

        self.queue.done(&key).await;
    }

    async fn schedule(&self, key: ObjectKey, after: Duration) {
        if after.is_zero() {
            self.queue.add(key).await;
            return;
        }
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            queue.add(key).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_ceiling() {
        let config = ControllerConfig {
            retry_base_ms: 100,
            retry_max_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(800));
        assert_eq!(config.backoff(5), Duration::from_millis(1_000));
        assert_eq!(config.backoff(64), Duration::from_millis(1_000));
    }

    #[test]
    fn test_config_defaults() {
        let config: ControllerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.max_concurrent_reconciles, 4);
        assert_eq!(config.resync_interval_secs, 300);
    }
}
