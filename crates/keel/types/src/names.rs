//! Deterministic subordinate names
//!
//! Subordinates are looked up by these names on every pass, so they must
//! never change.

pub fn service_name(owner: &str) -> String {
    format!("{owner}-service")
}

pub fn ingress_name(owner: &str) -> String {
    format!("{owner}-ingress")
}

pub fn claim_name(owner: &str) -> String {
    format!("{owner}-pvc")
}

pub fn deployment_name(owner: &str) -> String {
    owner.to_string()
}

pub fn dns_endpoint_name(owner: &str) -> String {
    owner.to_string()
}
