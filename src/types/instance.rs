// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// The operator reads nothing from the instance spec
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "kubevirt.io", version = "v1", kind = "VirtualMachineInstance")]
#[kube(namespaced)]
#[kube(status = "VirtualMachineInstanceStatus")]
pub struct VirtualMachineInstanceSpec {}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<InterfaceStatus>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_addresses: Option<Vec<String>>,
}

impl VirtualMachineInstance {
    /// First non-empty interface address, in reported order
    pub fn first_ip_address(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.interfaces.as_ref())?
            .iter()
            .filter_map(|i| i.ip_address.as_deref())
            .find(|ip| !ip.is_empty())
    }
}
