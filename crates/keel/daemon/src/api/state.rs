use keel_store::ObjectStore;
use keel_types::ResourceRegistry;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub registry: Arc<ResourceRegistry>,
    pub version: String,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, registry: Arc<ResourceRegistry>) -> Self {
        Self {
            store,
            registry,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
