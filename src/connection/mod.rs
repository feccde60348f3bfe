// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Guacamole connection model, builder and hostname resolution for VMs.

pub mod builder;
pub mod hostname;
pub mod policy;
pub mod spec;

pub use builder::ConnectionBuilder;
pub use hostname::{pick_hostname, resolve_hostname};
pub use policy::{PortPolicy, ProtocolFallbackPolicy};
pub use spec::{ConnectionSpec, Protocol, ProtocolSettings, RdpSettings, VncSettings};
