// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Maps a VirtualMachine and its resolved hostname to a Guacamole connection.

use super::policy::{PortPolicy, ProtocolFallbackPolicy};
use super::spec::{ConnectionSpec, Protocol, ProtocolSettings, RdpSettings, VncSettings};
use crate::config::AnnotationKeys;
use crate::types::VirtualMachine;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    keys: AnnotationKeys,
    parent_identifier: String,
    protocol_policy: ProtocolFallbackPolicy,
    port_policy: PortPolicy,
}

impl ConnectionBuilder {
    pub fn new(keys: AnnotationKeys, parent_identifier: impl Into<String>) -> Self {
        Self {
            keys,
            parent_identifier: parent_identifier.into(),
            protocol_policy: ProtocolFallbackPolicy::default(),
            port_policy: PortPolicy,
        }
    }

    pub fn build(&self, vm: &VirtualMachine, hostname: &str) -> ConnectionSpec {
        let vm_ref = vm.display_ref();

        let protocol = self
            .protocol_policy
            .resolve(vm.annotation(&self.keys.protocol));
        if let Some(requested) = &protocol.rejected {
            warn!(
                "Unsupported protocol '{}' requested for VM {}, defaulting to {} (supported: rdp, vnc)",
                requested, vm_ref, protocol.protocol
            );
        }
        let protocol = protocol.protocol;

        let port = self
            .port_policy
            .resolve(protocol, vm.annotation(&self.keys.port));
        if let Some(requested) = &port.rejected {
            warn!(
                "Invalid port '{}' requested for VM {}, using {}",
                requested, vm_ref, port.port
            );
        }

        let credential = |key: &str| vm.annotation(key).map(str::to_string);
        let settings = match protocol {
            Protocol::Rdp => ProtocolSettings::Rdp(RdpSettings {
                username: credential(&self.keys.username),
                password: credential(&self.keys.password),
                domain: credential(&self.keys.domain),
            }),
            Protocol::Vnc => ProtocolSettings::Vnc(VncSettings {
                password: credential(&self.keys.password),
            }),
        };

        let spec = ConnectionSpec {
            parent_identifier: self.parent_identifier.clone(),
            name: vm.connection_name(),
            hostname: hostname.to_string(),
            port: port.port,
            settings,
        };

        info!(
            "Built Guacamole connection config for VM {}: protocol={} hostname={} port={}",
            vm_ref, protocol, spec.hostname, spec.port
        );

        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::virtual_machine::VirtualMachineSpec;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn make_vm(annotations: &[(&str, &str)]) -> VirtualMachine {
        let keys = AnnotationKeys::default();
        let qualify = |suffix: &str| match suffix {
            "protocol" => keys.protocol.clone(),
            "port" => keys.port.clone(),
            "username" => keys.username.clone(),
            "password" => keys.password.clone(),
            "domain" => keys.domain.clone(),
            other => other.to_string(),
        };
        VirtualMachine {
            metadata: ObjectMeta {
                name: Some("demo".to_string()),
                namespace: Some("team-a".to_string()),
                annotations: Some(
                    annotations
                        .iter()
                        .map(|(k, v)| (qualify(k), v.to_string()))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..Default::default()
            },
            spec: VirtualMachineSpec::default(),
            status: None,
        }
    }

    fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new(AnnotationKeys::default(), "ROOT")
    }

    #[test]
    fn test_build_defaults_to_rdp() {
        let spec = builder().build(&make_vm(&[]), "10.0.0.5");

        assert_eq!(spec.name, "team-a-demo");
        assert_eq!(spec.parent_identifier, "ROOT");
        assert_eq!(spec.protocol(), Protocol::Rdp);

        let wire = spec.to_wire();
        assert_eq!(wire.protocol, "rdp");
        assert_eq!(wire.parameters["hostname"], "10.0.0.5");
        assert_eq!(wire.parameters["port"], "3389");
    }

    #[test]
    fn test_build_unsupported_protocol_falls_back_to_rdp() {
        let spec = builder().build(&make_vm(&[("protocol", "smtp")]), "10.0.0.5");
        assert_eq!(spec.to_wire().protocol, "rdp");
    }

    #[test]
    fn test_build_vnc_corrects_stale_port() {
        let spec = builder().build(&make_vm(&[("protocol", "vnc"), ("port", "3389")]), "10.0.0.5");
        assert_eq!(spec.to_wire().parameters["port"], "5900");

        let spec = builder().build(&make_vm(&[("protocol", "Vnc")]), "10.0.0.5");
        assert_eq!(spec.to_wire().parameters["port"], "5900");
    }

    #[test]
    fn test_build_rdp_credentials() {
        let spec = builder().build(
            &make_vm(&[("username", "admin"), ("password", "pw"), ("domain", "CORP")]),
            "demo",
        );

        assert_eq!(
            spec.settings,
            ProtocolSettings::Rdp(RdpSettings {
                username: Some("admin".to_string()),
                password: Some("pw".to_string()),
                domain: Some("CORP".to_string()),
            })
        );
    }

    #[test]
    fn test_build_vnc_ignores_username() {
        let spec = builder().build(
            &make_vm(&[("protocol", "vnc"), ("username", "admin"), ("password", "pw")]),
            "demo",
        );

        assert_eq!(
            spec.settings,
            ProtocolSettings::Vnc(VncSettings {
                password: Some("pw".to_string()),
            })
        );
        assert!(!spec.to_wire().parameters.contains_key("username"));
    }
}
