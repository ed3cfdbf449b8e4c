//! Generic reconcile driver
//!
//! One invocation handles one key:
//! 1. fetch the desired object; absent means nothing to do
//! 2. a deleting object only runs finalization, and only while its finalizer
//!    is present; the finalizer is removed once cleanup succeeds
//! 3. a live object without the finalizer gets it before any other work
//! 4. otherwise converge, then persist status if it changed

use async_trait::async_trait;
use keel_store::Api;
use keel_types::{HasStatus, ObjectKey, Resource};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::Result;

/// What the runtime should do after a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Wait for the next event
    Await,
    /// Reconcile again after the delay
    Requeue(Duration),
}

impl Action {
    pub fn requeue(after: Duration) -> Self {
        Action::Requeue(after)
    }

    pub fn requeue_now() -> Self {
        Action::Requeue(Duration::ZERO)
    }
}

/// Per-kind convergence logic
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    type Resource: HasStatus;

    /// Finalizer token guarding deletion of this kind
    fn finalizer(&self) -> &'static str;

    /// Converge a live object. Status changes made here are persisted by the
    /// driver.
    async fn apply(&self, resource: &mut Self::Resource) -> Result<Action>;

    /// Finalization for a deleting object
    async fn cleanup(&self, resource: &Self::Resource) -> Result<()>;
}

/// Run one reconcile pass for `key`
#[instrument(skip_all, fields(key = %key))]
pub async fn reconcile_key<R: Reconcile>(
    reconciler: &R,
    api: &Api<R::Resource>,
    key: &ObjectKey,
) -> Result<Action> {
    let kind = <R::Resource as Resource>::KIND;
    let Some(mut resource) = api.get(key).await? else {
        debug!(kind = %kind, "Object gone, nothing to reconcile");
        return Ok(Action::Await);
    };
    let finalizer = reconciler.finalizer();

    if resource.meta().is_being_deleted() {
        if !resource.meta().has_finalizer(finalizer) {
            return Ok(Action::Await);
        }
        reconciler.cleanup(&resource).await?;
        resource.meta_mut().remove_finalizer(finalizer);
        api.update(&resource).await?;
        info!(kind = %kind, "Finalized");
        return Ok(Action::Await);
    }

    if resource.meta_mut().add_finalizer(finalizer) {
        resource = api.update(&resource).await?;
        debug!(finalizer, "Added finalizer");
    }

    let observed = resource.status().clone();
    let action = reconciler.apply(&mut resource).await?;

    if resource.status() != &observed {
        api.update_status(&resource).await?;
        debug!("Status updated");
    }

    Ok(action)
}
