// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Apache Guacamole REST client: authentication and connection management.

pub mod client;
pub mod transport;
pub mod wire;

pub use client::{DeleteFailurePolicy, GatewayClient};
pub use transport::{https_transport, HttpRequest, HttpResponse, Transport};
pub use wire::{AuthToken, ConnectionHandle, GuacamoleConnection};
