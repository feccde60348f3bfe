// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! JSON shapes exchanged with the Guacamole REST API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response of `POST /api/tokens`
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub auth_token: String,
    pub data_source: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub available_data_sources: Vec<String>,
}

/// Flat connection document, as the Guacamole schema expects it
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuacamoleConnection {
    pub parent_identifier: String,
    pub name: String,
    pub protocol: String,
    pub parameters: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
}

/// Connection as returned by create and list; `identifier` is authoritative
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHandle {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub parent_identifier: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_token_from_guacamole() {
        let token: AuthToken = serde_json::from_str(
            r#"{"authToken":"ABC123","username":"guacadmin","dataSource":"postgresql","availableDataSources":["postgresql","postgresql-shared"]}"#,
        )
        .unwrap();
        assert_eq!(token.auth_token, "ABC123");
        assert_eq!(token.data_source, "postgresql");
        assert_eq!(token.available_data_sources.len(), 2);
    }

    #[test]
    fn test_connection_serializes_camel_case() {
        let connection = GuacamoleConnection {
            parent_identifier: "ROOT".to_string(),
            name: "team-a-demo".to_string(),
            protocol: "rdp".to_string(),
            parameters: BTreeMap::from([("hostname".to_string(), "10.0.0.5".to_string())]),
            attributes: BTreeMap::new(),
        };
        let json = serde_json::to_value(&connection).unwrap();
        assert_eq!(json["parentIdentifier"], "ROOT");
        assert_eq!(json["parameters"]["hostname"], "10.0.0.5");
    }

    #[test]
    fn test_list_response_tolerates_extra_fields() {
        let handles: BTreeMap<String, ConnectionHandle> = serde_json::from_str(
            r#"{"42":{"name":"team-a-demo","identifier":"42","parentIdentifier":"ROOT","protocol":"rdp","attributes":{},"activeConnections":0}}"#,
        )
        .unwrap();
        assert_eq!(handles["42"].name, "team-a-demo");
        assert_eq!(handles["42"].parent_identifier.as_deref(), Some("ROOT"));
    }
}
