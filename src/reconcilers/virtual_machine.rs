// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! VirtualMachine reconciler - keeps one Guacamole connection per running VM and
//! removes it when the VM is deleted.

use crate::config::{AnnotationKeys, Config};
use crate::connection::{resolve_hostname, ConnectionBuilder};
use crate::error::{OperatorError, Result};
use crate::gateway::{DeleteFailurePolicy, GatewayClient};
use crate::ledger::{Ledger, LedgerUpdate};
use crate::reconcilers::admission::{admission_stream, VmAdmission};
use crate::types::{VirtualMachine, VmPhase};
use futures::StreamExt;
use kube::{
    runtime::{
        controller::{self, Action},
        reflector, watcher, Controller, WatchStreamExt,
    },
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Where a VM stands in its connection lifecycle, derived from the object alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No finalizer attached yet
    Unseen,
    AwaitingReady,
    Provisioned,
    Deleting,
}

impl LifecycleState {
    pub fn of(vm: &VirtualMachine, keys: &AnnotationKeys) -> Self {
        if vm.is_being_deleted() {
            LifecycleState::Deleting
        } else if !vm.has_finalizer(&keys.finalizer) {
            LifecycleState::Unseen
        } else if Ledger::read(vm, keys).processed {
            LifecycleState::Provisioned
        } else {
            LifecycleState::AwaitingReady
        }
    }
}

/// The single action a reconciliation pass takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Cleanup,
    AttachGuard,
    AwaitReady { phase: VmPhase },
    Provision { phase: VmPhase },
    RecordPhase { from: String, to: VmPhase },
    Idle,
}

pub fn plan(vm: &VirtualMachine, keys: &AnnotationKeys) -> Step {
    let phase = vm.phase();
    match LifecycleState::of(vm, keys) {
        LifecycleState::Deleting => Step::Cleanup,
        LifecycleState::Unseen => Step::AttachGuard,
        LifecycleState::AwaitingReady if phase.is_running() => Step::Provision { phase },
        LifecycleState::AwaitingReady => Step::AwaitReady { phase },
        LifecycleState::Provisioned => match Ledger::read(vm, keys).last_observed_phase {
            Some(last) if last != phase.as_str() => Step::RecordPhase {
                from: last,
                to: phase,
            },
            _ => Step::Idle,
        },
    }
}

/// Result of a reconciliation pass, as seen by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    RequeueNow,
    RequeueAfter(Duration),
}

impl From<Outcome> for Action {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Action::await_change(),
            Outcome::RequeueNow => Action::requeue(Duration::ZERO),
            Outcome::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

pub struct VirtualMachineReconciler {
    client: Client,
    gateway: GatewayClient,
    config: Config,
    builder: ConnectionBuilder,
    delete_policy: DeleteFailurePolicy,
}

impl VirtualMachineReconciler {
    pub fn new(client: Client, gateway: GatewayClient, config: Config) -> Self {
        let builder = ConnectionBuilder::new(
            config.keys.clone(),
            config.gateway.parent_identifier.clone(),
        );
        Self {
            client,
            gateway,
            config,
            builder,
            delete_policy: DeleteFailurePolicy::Swallow,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let vms: Api<VirtualMachine> = Api::all(self.client.clone());
        let (reader, writer) = reflector::store();

        let events = watcher(vms, WatcherConfig::default())
            .default_backoff()
            .reflect(writer);
        let admitted = admission_stream(events, VmAdmission::new(self.config.keys.clone()));

        let controller_config = controller::Config::default()
            .concurrency(self.config.reconcile.max_concurrent_reconciles);
        let context = Arc::new(self);

        Controller::for_stream(admitted, reader)
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled VM: {:?}", o),
                    Err(e) if is_departed_object(&e) => {
                        debug!("VM no longer in cache, skipping: {}", e)
                    }
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    #[instrument(skip(self, vm), fields(vm = %vm.display_ref()))]
    pub async fn reconcile_vm(&self, vm: &VirtualMachine) -> Result<Outcome> {
        let keys = &self.config.keys;
        let api: Api<VirtualMachine> =
            Api::namespaced(self.client.clone(), &vm.namespace().unwrap_or_default());
        let name = vm.name_any();

        debug!("Reconciling VM in state {:?}", LifecycleState::of(vm, keys));

        match plan(vm, keys) {
            Step::Cleanup => self.cleanup(vm, &api).await,
            Step::AttachGuard => {
                LedgerUpdate::new(vm)
                    .attach_guard(&keys.finalizer)
                    .persist(&api, &name)
                    .await?;
                info!("Attached finalizer to new VM");
                Ok(Outcome::RequeueNow)
            }
            Step::AwaitReady { phase } => {
                info!("VM not yet running (status '{}'), waiting", phase);
                Ok(Outcome::RequeueAfter(self.config.reconcile.not_ready_delay))
            }
            Step::Provision { phase } => self.provision(vm, &api, &phase).await,
            Step::RecordPhase { from, to } => {
                match to {
                    VmPhase::Stopped => {
                        info!("VM stopped (was '{}'), connection may need to be disabled", from)
                    }
                    VmPhase::Running => {
                        info!("VM restarted (was '{}'), connection may need to be updated", from)
                    }
                    VmPhase::Other(ref status) => {
                        info!("VM status changed from '{}' to '{}'", from, status)
                    }
                }
                LedgerUpdate::new(vm)
                    .observe_phase(keys, to.as_str())
                    .persist(&api, &name)
                    .await?;
                Ok(Outcome::Done)
            }
            Step::Idle => Ok(Outcome::Done),
        }
    }

    /// Create the connection for a running VM and record it in the ledger.
    /// Gateway failures leave the ledger untouched and reschedule the attempt.
    async fn provision(
        &self,
        vm: &VirtualMachine,
        api: &Api<VirtualMachine>,
        phase: &VmPhase,
    ) -> Result<Outcome> {
        info!("New running VM detected, creating Guacamole connection");

        if let Err(e) = self.ensure_connection(vm).await {
            if e.is_gateway() {
                error!("Failed to create Guacamole connection: {}", e);
            } else {
                error!("Failed to prepare Guacamole connection: {}", e);
            }
            return Ok(Outcome::RequeueAfter(
                self.config.reconcile.create_retry_delay,
            ));
        }

        // The connection now exists; a conflict here must not send the VM back to creation
        LedgerUpdate::new(vm)
            .unconditional()
            .mark_processed(&self.config.keys, phase.as_str())
            .persist_retrying_conflicts(api, &vm.name_any())
            .await?;

        info!(
            "Successfully created Guacamole connection {}",
            vm.connection_name()
        );
        Ok(Outcome::Done)
    }

    async fn ensure_connection(&self, vm: &VirtualMachine) -> Result<()> {
        let connection_name = vm.connection_name();

        if self.config.reconcile.adopt_existing_connections {
            let existing = self.gateway.find_connections_by_name(&connection_name).await?;
            if let Some(identifier) = existing.first() {
                info!(
                    "Guacamole connection {} already exists ({}), adopting it",
                    connection_name, identifier
                );
                return Ok(());
            }
        }

        let hostname = resolve_hostname(&self.client, vm).await?;
        let spec = self.builder.build(vm, &hostname);
        self.gateway.create_connection(&spec).await?;
        Ok(())
    }

    /// Best-effort connection removal, then release the VM for deletion regardless of outcome
    async fn cleanup(&self, vm: &VirtualMachine, api: &Api<VirtualMachine>) -> Result<Outcome> {
        let connection_name = vm.connection_name();
        info!(
            "VM is being deleted, deleting Guacamole connection {}",
            connection_name
        );

        let result = self.gateway.delete_connection_by_name(&connection_name).await;
        self.delete_policy.apply(&connection_name, result)?;

        let finalizer = &self.config.keys.finalizer;
        if vm.has_finalizer(finalizer) {
            LedgerUpdate::new(vm)
                .remove_guard(finalizer)
                .persist(api, &vm.name_any())
                .await?;
            info!("Removed finalizer");
        }

        info!("Successfully handled VM deletion");
        Ok(Outcome::Done)
    }
}

async fn reconcile(vm: Arc<VirtualMachine>, ctx: Arc<VirtualMachineReconciler>) -> Result<Action> {
    match ctx.reconcile_vm(&vm).await {
        Ok(outcome) => Ok(outcome.into()),
        Err(OperatorError::KubeError(kube::Error::Api(err))) if err.code == 404 => {
            info!("VM {} not found, likely deleted", vm.display_ref());
            Ok(Action::await_change())
        }
        Err(e) => Err(e),
    }
}

/// Delete events arrive after the object has left the reflector store
fn is_departed_object<E1, E2>(error: &controller::Error<E1, E2>) -> bool
where
    E1: std::error::Error + 'static,
    E2: std::error::Error + 'static,
{
    matches!(error, controller::Error::ObjectNotFound(_))
}

fn error_policy(
    vm: Arc<VirtualMachine>,
    error: &OperatorError,
    ctx: Arc<VirtualMachineReconciler>,
) -> Action {
    error!("Reconciliation error for VM {}: {}", vm.display_ref(), error);
    Action::requeue(ctx.config.reconcile.error_delay)
}
