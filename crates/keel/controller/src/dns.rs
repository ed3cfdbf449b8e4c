//! DNS endpoint synthesis for HostedServices
//!
//! Output order is fixed: the region A record first, then for each replica
//! its host CNAME followed by its wildcard CNAME.

use keel_types::{
    names, DnsEndpoint, DnsEndpointSpec, Endpoint, HostedService, HostedServiceSpec, ObjectMeta,
    RecordType, SpecValidationError,
};
use std::collections::BTreeSet;

/// TTL applied to every synthesized record
pub const RECORD_TTL: u32 = 180;

/// Compute the record set for a hosted service given its ready targets.
pub fn synthesize_endpoints(
    spec: &HostedServiceSpec,
    ready_targets: &BTreeSet<String>,
) -> Result<Vec<Endpoint>, SpecValidationError> {
    spec.validate()?;

    let region = spec.region_fqdn();
    let mut endpoints = Vec::with_capacity(1 + 2 * spec.replicas as usize);
    endpoints.push(Endpoint {
        dns_name: region.clone(),
        record_type: RecordType::A,
        record_ttl: RECORD_TTL,
        targets: ready_targets.clone(),
    });

    for index in 0..spec.replicas {
        let pod = spec
            .pod_fqdn(index)
            .ok_or(SpecValidationError::TooManyReplicas {
                requested: spec.replicas,
                max: keel_types::MAX_REPLICAS,
            })?;
        let alias = BTreeSet::from([region.clone()]);
        endpoints.push(Endpoint {
            dns_name: pod.clone(),
            record_type: RecordType::Cname,
            record_ttl: RECORD_TTL,
            targets: alias.clone(),
        });
        endpoints.push(Endpoint {
            dns_name: format!("*.{pod}"),
            record_type: RecordType::Cname,
            record_ttl: RECORD_TTL,
            targets: alias,
        });
    }

    Ok(endpoints)
}

/// The `DnsEndpoint` subordinate a hosted service should own
pub fn dns_endpoint_for(
    service: &HostedService,
    ready_targets: &BTreeSet<String>,
) -> Result<DnsEndpoint, SpecValidationError> {
    let endpoints = synthesize_endpoints(&service.spec, ready_targets)?;
    let metadata = ObjectMeta::new(
        service.metadata.namespace.clone(),
        names::dns_endpoint_name(&service.metadata.name),
    );
    Ok(DnsEndpoint::new(metadata, DnsEndpointSpec { endpoints }))
}
