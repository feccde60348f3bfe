// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "kubevirt.io", version = "v1", kind = "VirtualMachine")]
#[kube(namespaced)]
#[kube(status = "VirtualMachineStatus")]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_strategy: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printable_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

/// Observed lifecycle phase, as reported by `status.printableStatus`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmPhase {
    Running,
    Stopped,
    /// Any other printable status; empty when the VM reports none
    Other(String),
}

impl VmPhase {
    pub fn parse(status: &str) -> Self {
        match status {
            "Running" => VmPhase::Running,
            "Stopped" => VmPhase::Stopped,
            other => VmPhase::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VmPhase::Running => "Running",
            VmPhase::Stopped => "Stopped",
            VmPhase::Other(s) => s,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, VmPhase::Running)
    }
}

impl fmt::Display for VmPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VirtualMachine {
    /// Printable status string, empty when the VM has no status yet
    pub fn printable_status(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.printable_status.as_deref())
            .unwrap_or("")
    }

    pub fn phase(&self) -> VmPhase {
        VmPhase::parse(self.printable_status())
    }

    /// Deterministic Guacamole connection name: `{namespace}-{name}`
    pub fn connection_name(&self) -> String {
        format!("{}-{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    /// `namespace/name`, used for log fields
    pub fn display_ref(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }
}
