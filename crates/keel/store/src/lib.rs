//! Keel Store - Declarative object store interface
//!
//! The engine reads and writes all state through [`ObjectStore`]. The store
//! owns object identity, optimistic concurrency (every write carries the
//! version token it was computed from), finalizer-aware deletion and owner
//! cascade.
//!
//! ## Key Concepts
//!
//! - **ObjectStore**: async trait over type-erased [`DynamicObject`]s
//! - **Api**: typed facade for one resource kind
//! - **InMemoryStore**: reference implementation with a broadcast watch stream
//!
//! [`DynamicObject`]: keel_types::DynamicObject

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod api;
pub mod error;
pub mod memory;
pub mod store;

pub use api::Api;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, WriteOp, WriteRecord};
pub use store::{merge_stored_metadata, ListParams, ObjectStore, WatchEvent, WatchEventType};
