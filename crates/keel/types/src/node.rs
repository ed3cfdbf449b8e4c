//! Observed cluster members
//!
//! Nodes are never written by the engine. Their readiness condition and
//! external addresses decide which targets the region A record carries.

use serde::{Deserialize, Serialize};

use crate::{ObjectMeta, ResourceKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub status: NodeStatus,
}

impl_resource!(Node, ResourceKind::Node);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,

    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub condition_type: String,

    pub status: ConditionStatus,
}

impl NodeCondition {
    pub const READY: &'static str = "Ready";

    pub fn ready(status: ConditionStatus) -> Self {
        Self {
            condition_type: Self::READY.to_string(),
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub address_type: NodeAddressType,

    pub address: String,
}

impl NodeAddress {
    pub fn external(address: impl Into<String>) -> Self {
        Self {
            address_type: NodeAddressType::ExternalIP,
            address: address.into(),
        }
    }

    pub fn internal(address: impl Into<String>) -> Self {
        Self {
            address_type: NodeAddressType::InternalIP,
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAddressType {
    #[serde(rename = "ExternalIP")]
    ExternalIP,
    #[serde(rename = "InternalIP")]
    InternalIP,
    #[serde(rename = "ExternalDNS")]
    ExternalDNS,
    #[serde(rename = "InternalDNS")]
    InternalDNS,
    Hostname,
}

impl Node {
    pub fn new(name: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            metadata: ObjectMeta::new("", name),
            status,
        }
    }

    /// True only when a `Ready` condition is present with status `True`.
    pub fn is_ready(&self) -> bool {
        self.status
            .conditions
            .iter()
            .any(|c| c.condition_type == NodeCondition::READY && c.status == ConditionStatus::True)
    }

    pub fn external_addresses(&self) -> impl Iterator<Item = &str> {
        self.status
            .addresses
            .iter()
            .filter(|a| a.address_type == NodeAddressType::ExternalIP)
            .map(|a| a.address.as_str())
    }
}
