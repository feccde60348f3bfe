// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Correction rules applied to user supplied protocol and port annotations.

use super::spec::Protocol;

/// Outcome of resolving a requested protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolResolution {
    pub protocol: Protocol,
    /// The requested value, when it was not supported and got replaced
    pub rejected: Option<String>,
}

/// Unsupported protocols are replaced by the fallback instead of failing the VM.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolFallbackPolicy {
    pub fallback: Protocol,
}

impl Default for ProtocolFallbackPolicy {
    fn default() -> Self {
        Self {
            fallback: Protocol::Rdp,
        }
    }
}

impl ProtocolFallbackPolicy {
    pub fn resolve(&self, requested: Option<&str>) -> ProtocolResolution {
        let Some(requested) = requested else {
            return ProtocolResolution {
                protocol: self.fallback,
                rejected: None,
            };
        };

        match requested.to_ascii_lowercase().as_str() {
            "rdp" => ProtocolResolution {
                protocol: Protocol::Rdp,
                rejected: None,
            },
            "vnc" => ProtocolResolution {
                protocol: Protocol::Vnc,
                rejected: None,
            },
            _ => ProtocolResolution {
                protocol: self.fallback,
                rejected: Some(requested.to_string()),
            },
        }
    }
}

/// Outcome of resolving a requested port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortResolution {
    pub port: u16,
    /// The requested value, when it was not a valid port number
    pub rejected: Option<String>,
}

/// Port selection: annotation, else protocol default. A port equal to the other
/// protocol's default is treated as stale and replaced by the chosen protocol's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortPolicy;

impl PortPolicy {
    pub fn resolve(&self, protocol: Protocol, requested: Option<&str>) -> PortResolution {
        let (port, rejected) = match requested.map(|p| (p, p.trim().parse::<u16>())) {
            Some((_, Ok(port))) if port != 0 => (port, None),
            Some((raw, _)) => (protocol.default_port(), Some(raw.to_string())),
            None => (protocol.default_port(), None),
        };

        let port = if port == protocol.other().default_port() {
            protocol.default_port()
        } else {
            port
        };

        PortResolution { port, rejected }
    }
}
