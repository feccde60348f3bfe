// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed connection model, flattened to the Guacamole wire shape only at the boundary.

use crate::constants::guacamole::{RDP_DEFAULT_PORT, VNC_DEFAULT_PORT};
use crate::gateway::GuacamoleConnection;
use std::collections::BTreeMap;
use std::fmt;

/// Parameters the Guacamole schema expects to be present, even when unused
const REQUIRED_EMPTY_PARAMETERS: &[&str] = &[
    "recording-path",
    "recording-name",
    "recording-exclude-output",
    "recording-exclude-mouse",
    "recording-include-keys",
    "create-recording-path",
    "dest-host",
    "dest-port",
];

const ATTRIBUTES: &[&str] = &[
    "max-connections",
    "max-connections-per-user",
    "weight",
    "failover-only",
    "guacd-port",
    "guacd-encryption",
    "guacd-hostname",
];

const RDP_TUNING: &[(&str, &str)] = &[
    ("security", "any"),
    ("ignore-cert", "true"),
    ("disable-auth", "false"),
    ("resize-method", "reconnect"),
    ("console-audio", "false"),
    ("disable-audio", "false"),
    ("enable-wallpaper", "false"),
    ("enable-theming", "false"),
    ("enable-font-smoothing", "false"),
];

const VNC_TUNING: &[(&str, &str)] = &[
    ("color-depth", "24"),
    ("cursor", "remote"),
    ("read-only", "false"),
    ("swap-red-blue", "false"),
    ("disable-copy", "false"),
    ("disable-paste", "false"),
    ("enable-audio", "false"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Rdp,
    Vnc,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Rdp => "rdp",
            Protocol::Vnc => "vnc",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Rdp => RDP_DEFAULT_PORT,
            Protocol::Vnc => VNC_DEFAULT_PORT,
        }
    }

    pub fn other(self) -> Protocol {
        match self {
            Protocol::Rdp => Protocol::Vnc,
            Protocol::Vnc => Protocol::Rdp,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdpSettings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VncSettings {
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolSettings {
    Rdp(RdpSettings),
    Vnc(VncSettings),
}

impl ProtocolSettings {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProtocolSettings::Rdp(_) => Protocol::Rdp,
            ProtocolSettings::Vnc(_) => Protocol::Vnc,
        }
    }
}

/// Desired Guacamole connection for one VM. Built fresh on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub parent_identifier: String,
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub settings: ProtocolSettings,
}

impl ConnectionSpec {
    pub fn protocol(&self) -> Protocol {
        self.settings.protocol()
    }

    /// Flatten into the key/value document Guacamole accepts
    pub fn to_wire(&self) -> GuacamoleConnection {
        let mut parameters = BTreeMap::new();
        parameters.insert("hostname".to_string(), self.hostname.clone());
        parameters.insert("port".to_string(), self.port.to_string());

        let (tuning, credentials) = match &self.settings {
            ProtocolSettings::Rdp(rdp) => (
                RDP_TUNING,
                vec![
                    ("username", rdp.username.as_ref()),
                    ("password", rdp.password.as_ref()),
                    ("domain", rdp.domain.as_ref()),
                ],
            ),
            ProtocolSettings::Vnc(vnc) => (VNC_TUNING, vec![("password", vnc.password.as_ref())]),
        };

        for (key, value) in tuning {
            parameters.insert(key.to_string(), value.to_string());
        }
        for (key, value) in credentials {
            if let Some(value) = value {
                parameters.insert(key.to_string(), value.clone());
            }
        }
        for key in REQUIRED_EMPTY_PARAMETERS {
            parameters.entry(key.to_string()).or_default();
        }

        let attributes = ATTRIBUTES
            .iter()
            .map(|key| (key.to_string(), String::new()))
            .collect();

        GuacamoleConnection {
            parent_identifier: self.parent_identifier.clone(),
            name: self.name.clone(),
            protocol: self.protocol().as_str().to_string(),
            parameters,
            attributes,
        }
    }
}
