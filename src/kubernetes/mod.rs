// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery.

pub mod crd;

pub use crd::wait_for_virtual_machine_crd;
