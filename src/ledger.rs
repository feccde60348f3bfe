// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-VM processing ledger, stored in the VirtualMachine's own annotations and finalizers.

use crate::config::AnnotationKeys;
use crate::constants::reconcile::LEDGER_CONFLICT_RETRIES;
use crate::error::Result;
use crate::types::VirtualMachine;
use kube::{
    api::{Patch, PatchParams},
    Api, ResourceExt,
};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// Ledger fields as currently recorded on a VM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    pub processed: bool,
    pub last_observed_phase: Option<String>,
}

impl Ledger {
    pub fn read(vm: &VirtualMachine, keys: &AnnotationKeys) -> Self {
        Self {
            processed: vm.annotation(&keys.processed) == Some("true"),
            last_observed_phase: vm
                .annotation(&keys.last_status)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// Metadata changes for one VM, written back as a single merge patch.
/// The patch carries the observed resourceVersion, so a concurrent edit makes it fail
/// with a conflict instead of overwriting newer state.
#[derive(Debug, Clone)]
pub struct LedgerUpdate {
    resource_version: Option<String>,
    current_finalizers: Vec<String>,
    annotations: BTreeMap<String, String>,
    finalizers: Option<Vec<String>>,
}

impl LedgerUpdate {
    pub fn new(vm: &VirtualMachine) -> Self {
        Self {
            resource_version: vm.resource_version(),
            current_finalizers: vm.finalizers().to_vec(),
            annotations: BTreeMap::new(),
            finalizers: None,
        }
    }

    pub fn attach_guard(mut self, finalizer: &str) -> Self {
        let mut finalizers = self
            .finalizers
            .take()
            .unwrap_or_else(|| self.current_finalizers.clone());
        if !finalizers.iter().any(|f| f == finalizer) {
            finalizers.push(finalizer.to_string());
        }
        self.finalizers = Some(finalizers);
        self
    }

    pub fn remove_guard(mut self, finalizer: &str) -> Self {
        let mut finalizers = self
            .finalizers
            .take()
            .unwrap_or_else(|| self.current_finalizers.clone());
        finalizers.retain(|f| f != finalizer);
        self.finalizers = Some(finalizers);
        self
    }

    /// Drop the resourceVersion precondition. Only for updates that touch nothing but
    /// operator-owned annotations, where the latest write is always the right one.
    pub fn unconditional(mut self) -> Self {
        self.resource_version = None;
        self
    }

    pub fn mark_processed(mut self, keys: &AnnotationKeys, phase: &str) -> Self {
        self.annotations
            .insert(keys.processed.clone(), "true".to_string());
        self.observe_phase(keys, phase)
    }

    pub fn observe_phase(mut self, keys: &AnnotationKeys, phase: &str) -> Self {
        self.annotations
            .insert(keys.last_status.clone(), phase.to_string());
        self
    }

    pub fn to_patch(&self) -> serde_json::Value {
        let mut metadata = serde_json::Map::new();
        if let Some(rv) = &self.resource_version {
            metadata.insert("resourceVersion".to_string(), rv.clone().into());
        }
        if !self.annotations.is_empty() {
            metadata.insert(
                "annotations".to_string(),
                serde_json::to_value(&self.annotations).unwrap_or_default(),
            );
        }
        if let Some(finalizers) = &self.finalizers {
            metadata.insert(
                "finalizers".to_string(),
                serde_json::to_value(finalizers).unwrap_or_default(),
            );
        }
        serde_json::json!({ "metadata": metadata })
    }

    /// Write the update back to the VM
    #[instrument(skip(self, api), fields(vm = %name))]
    pub async fn persist(self, api: &Api<VirtualMachine>, name: &str) -> Result<VirtualMachine> {
        debug!("Persisting ledger patch {}", self.to_patch());
        let vm = api
            .patch(name, &PatchParams::default(), &Patch::Merge(self.to_patch()))
            .await?;
        Ok(vm)
    }

    /// Write the update back, retrying conflicts in place instead of failing the pass
    #[instrument(skip(self, api), fields(vm = %name))]
    pub async fn persist_retrying_conflicts(
        self,
        api: &Api<VirtualMachine>,
        name: &str,
    ) -> Result<VirtualMachine> {
        let patch = Patch::Merge(self.to_patch());
        let mut attempt = 0;
        loop {
            match api.patch(name, &PatchParams::default(), &patch).await {
                Err(kube::Error::Api(err)) if err.code == 409 && attempt < LEDGER_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!("Conflict writing ledger, retrying ({}/{})", attempt, LEDGER_CONFLICT_RETRIES);
                }
                result => return Ok(result?),
            }
        }
    }
}
