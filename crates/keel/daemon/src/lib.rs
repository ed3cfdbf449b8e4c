//! Keel Daemon - Process wiring for the convergence engine
//!
//! ## Key Concepts
//!
//! - **Configuration**: defaults, optional file, then `KEEL_` environment
//!   variables, then CLI flags
//! - **Manifests**: YAML documents decoded through the resource registry and
//!   applied at startup or via `POST /api/v1/objects`
//! - **Controllers**: one for HostedServices and one for LicensedServers,
//!   sharing the in-memory store
//! - **REST API**: read, apply and delete objects
//!
//! ## Persistence
//!
//! The store lives in memory only. A LicensedServer whose manifest does not
//! carry the `keel.io/serial-number` annotation gets a fresh license from the
//! authority after every restart; seed the annotation in the manifest to
//! keep an issued serial across restarts.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifests;
pub mod server;

pub use api::{create_router, AppState};
pub use config::{DaemonConfig, LoggingConfig, ManifestConfig, ServerConfig};
pub use error::{ApiError, DaemonError, DaemonResult, ErrorResponse};
pub use manifests::{apply_manifest, apply_source, load_dir, parse_documents, ManifestError};
pub use server::{shutdown_signal, Daemon};
