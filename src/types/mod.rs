// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! KubeVirt custom resource bindings, limited to the fields the operator reads.

pub mod instance;
pub mod virtual_machine;

pub use instance::VirtualMachineInstance;
pub use virtual_machine::{VirtualMachine, VmPhase};
