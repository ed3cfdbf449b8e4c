//! Keel Controller - Convergence engine
//!
//! Drives the store's actual state toward each desired object's declared
//! state, one reconcile key at a time.
//!
//! ## Key Concepts
//!
//! - **Reconcile**: per-kind convergence with an ordered finalization step,
//!   run by [`reconcile_key`]
//! - **Reconcile-one**: fetch, create, update-managed-fields or leave alone,
//!   per subordinate ([`converge`])
//! - **Node health**: only nodes explicitly Ready contribute DNS targets
//! - **DNS synthesis**: region A record plus per-replica CNAMEs
//! - **License issuance**: one external call per LicensedServer, guarded by
//!   the serial-number annotation
//! - **Controller**: work queue, watch routing, resync and retry backoff

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod converge;
pub mod dns;
pub mod error;
pub mod hosted;
pub mod issuance;
pub mod license;
pub mod licensed;
pub mod nodes;
pub mod planner;
pub mod queue;
pub mod reconciler;
pub mod runtime;

pub use converge::{reconcile_one, ConvergeOutcome, Subordinate};
pub use dns::{dns_endpoint_for, synthesize_endpoints, RECORD_TTL};
pub use error::{ControllerError, Result};
pub use hosted::{HostedServiceReconciler, NodeFanOut, HOSTED_SERVICE_FINALIZER};
pub use issuance::{IssuanceOutcome, LicenseIssuance};
pub use license::{
    HttpLicenseAuthority, LicenseAuthority, LicenseClientConfig, LicenseError, RetryPolicy,
};
pub use licensed::{IssuerFanOut, LicensedServerReconciler, LICENSED_SERVER_FINALIZER};
pub use nodes::{ready_node_targets, NodeHealthAggregator};
pub use planner::{PlannerOptions, SubordinatePlan, SubordinatePlanner};
pub use queue::WorkQueue;
pub use reconciler::{reconcile_key, Action, Reconcile};
pub use runtime::{Controller, ControllerConfig, EventMapper};
