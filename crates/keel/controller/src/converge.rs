//! Reconcile-one policy for subordinate objects
//!
//! Each subordinate is fetched by its deterministic name. A missing object is
//! created with the owner reference stamped; a present one is compared on its
//! managed fields only and updated in place when they differ. Metadata churn
//! on the actual object (version, labels added by others) never triggers a
//! write.

use keel_store::Api;
use keel_types::{
    Deployment, DnsEndpoint, Ingress, OwnerReference, PersistentVolumeClaim, Resource, Service,
};
use tracing::{debug, info};

use crate::error::Result;

/// A subordinate kind with an explicit comparator over the fields the engine
/// owns
pub trait Subordinate: Resource {
    /// `false` for create-only kinds: once observed, never diffed or updated
    const MUTABLE: bool = true;

    /// True when `self` (actual) already carries every managed field of
    /// `desired`
    fn managed_eq(&self, desired: &Self) -> bool;

    /// Overwrite the managed fields of `self` (actual) from `desired`,
    /// leaving everything else untouched
    fn apply_managed(&mut self, desired: &Self);
}

/// What reconcile-one did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeOutcome {
    Created,
    Updated,
    Unchanged,
    /// Create-only object already present
    Retained,
}

impl ConvergeOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, ConvergeOutcome::Created)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, ConvergeOutcome::Created | ConvergeOutcome::Updated)
    }
}

/// Drive one subordinate to its desired shape
pub async fn reconcile_one<S: Subordinate>(
    api: &Api<S>,
    owner: &OwnerReference,
    mut desired: S,
) -> Result<ConvergeOutcome> {
    let key = desired.key();

    let Some(mut actual) = api.get(&key).await? else {
        desired.meta_mut().set_owner(owner.clone());
        api.create(&desired).await?;
        info!(kind = %S::KIND, key = %key, owner = %owner.key(), "Created subordinate");
        return Ok(ConvergeOutcome::Created);
    };

    if !S::MUTABLE {
        debug!(kind = %S::KIND, key = %key, "Create-only subordinate present, leaving as is");
        return Ok(ConvergeOutcome::Retained);
    }

    let owner_changed = actual.meta_mut().set_owner(owner.clone());
    if !owner_changed && actual.managed_eq(&desired) {
        return Ok(ConvergeOutcome::Unchanged);
    }

    actual.apply_managed(&desired);
    api.update(&actual).await?;
    info!(kind = %S::KIND, key = %key, owner_changed, "Updated subordinate");
    Ok(ConvergeOutcome::Updated)
}

impl Subordinate for Service {
    fn managed_eq(&self, desired: &Self) -> bool {
        self.spec == desired.spec
    }

    fn apply_managed(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl Subordinate for Ingress {
    // Annotations are managed too, but only the keys the planner sets
    fn managed_eq(&self, desired: &Self) -> bool {
        self.spec == desired.spec
            && desired
                .metadata
                .annotations
                .iter()
                .all(|(k, v)| self.metadata.annotations.get(k) == Some(v))
    }

    fn apply_managed(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
        for (k, v) in &desired.metadata.annotations {
            self.metadata.annotations.insert(k.clone(), v.clone());
        }
    }
}

impl Subordinate for PersistentVolumeClaim {
    const MUTABLE: bool = false;

    fn managed_eq(&self, desired: &Self) -> bool {
        self.spec == desired.spec
    }

    fn apply_managed(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl Subordinate for Deployment {
    fn managed_eq(&self, desired: &Self) -> bool {
        self.spec == desired.spec
    }

    fn apply_managed(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl Subordinate for DnsEndpoint {
    // Targets are sets, so ordering inside a record never counts as a diff
    fn managed_eq(&self, desired: &Self) -> bool {
        self.spec.endpoints == desired.spec.endpoints
    }

    fn apply_managed(&mut self, desired: &Self) {
        self.spec.endpoints = desired.spec.endpoints.clone();
    }
}
