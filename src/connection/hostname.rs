// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Hostname resolution for a VM: instance address, then matching Service, then VM name.

use crate::error::{OperatorError, Result};
use crate::types::{VirtualMachine, VirtualMachineInstance};
use k8s_openapi::api::core::v1::Service;
use kube::{api::ListParams, Api, Client, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// Resolve the address Guacamole should connect to. Never retries internally.
#[instrument(skip(client, vm), fields(vm = %vm.display_ref()))]
pub async fn resolve_hostname(client: &Client, vm: &VirtualMachine) -> Result<String> {
    let namespace = vm.namespace().unwrap_or_default();
    let name = vm.name_any();

    let instances: Api<VirtualMachineInstance> = Api::namespaced(client.clone(), &namespace);
    let instance = instances.get_opt(&name).await.map_err(|e| {
        OperatorError::Hostname(format!(
            "Failed to get VirtualMachineInstance {}/{}: {}",
            namespace, name, e
        ))
    })?;

    if let Some(ip) = instance.as_ref().and_then(|i| i.first_ip_address()) {
        debug!("Using instance interface address {}", ip);
        return Ok(ip.to_string());
    }

    let services: Api<Service> = Api::namespaced(client.clone(), &namespace);
    let services = match services.list(&ListParams::default()).await {
        Ok(list) => list.items,
        Err(e) => {
            warn!("Failed to list services in namespace {}: {}", namespace, e);
            Vec::new()
        }
    };

    let hostname = pick_hostname(vm, instance.as_ref(), &services);
    debug!("Resolved hostname {}", hostname);
    Ok(hostname)
}

/// Pick the hostname from already fetched objects, first match wins.
/// Services are considered in name order so the outcome does not depend on list order.
pub fn pick_hostname(
    vm: &VirtualMachine,
    instance: Option<&VirtualMachineInstance>,
    services: &[Service],
) -> String {
    if let Some(ip) = instance.and_then(|i| i.first_ip_address()) {
        return ip.to_string();
    }

    let empty = BTreeMap::new();
    let labels = vm.metadata.labels.as_ref().unwrap_or(&empty);

    let mut candidates: Vec<&Service> = services
        .iter()
        .filter(|svc| service_selects(svc, labels))
        .collect();
    candidates.sort_by_key(|svc| svc.name_any());

    if let Some(svc) = candidates.first() {
        let namespace = svc
            .namespace()
            .or_else(|| vm.namespace())
            .unwrap_or_default();
        return format!("{}.{}.svc.cluster.local", svc.name_any(), namespace);
    }

    vm.name_any()
}

/// A Service selects the VM when its non-empty selector is a subset of the VM labels
pub fn service_selects(service: &Service, labels: &BTreeMap<String, String>) -> bool {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.selector.as_ref())
        .is_some_and(|selector| {
            !selector.is_empty() && selector.iter().all(|(k, v)| labels.get(k) == Some(v))
        })
}
