// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod admission;
pub mod virtual_machine;

pub use admission::{admission_stream, Admission, EventTracker, ResourceEvent, VmAdmission};
pub use virtual_machine::{plan, LifecycleState, Outcome, Step, VirtualMachineReconciler};
