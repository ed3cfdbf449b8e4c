//! Node health aggregation

use keel_store::{Api, ObjectStore};
use keel_types::Node;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;

/// External addresses of every node whose Ready condition is explicitly
/// True. Nodes that are not ready contribute nothing.
pub fn ready_node_targets<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> BTreeSet<String> {
    nodes
        .into_iter()
        .filter(|node| node.is_ready())
        .flat_map(|node| node.external_addresses().map(str::to_string))
        .collect()
}

/// Lists nodes through the store and reduces them to ready targets
#[derive(Clone)]
pub struct NodeHealthAggregator {
    nodes: Api<Node>,
}

impl NodeHealthAggregator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            nodes: Api::new(store),
        }
    }

    pub async fn ready_targets(&self) -> Result<BTreeSet<String>> {
        let nodes = self.nodes.list_all().await?;
        let targets = ready_node_targets(&nodes);
        tracing::debug!(
            nodes = nodes.len(),
            ready_targets = targets.len(),
            "Aggregated node health"
        );
        Ok(targets)
    }
}
