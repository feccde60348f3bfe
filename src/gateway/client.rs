// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Guacamole REST client. Stateless: every operation authenticates afresh.

use super::transport::{HttpRequest, HttpResponse, Transport};
use super::wire::{AuthToken, ConnectionHandle};
use crate::config::GatewayConfig;
use crate::connection::ConnectionSpec;
use crate::constants::guacamole::MAX_ERROR_BODY_BYTES;
use crate::error::{OperatorError, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode};
use http_body_util::Full;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use url::Url;

/// What to do when cleaning up a connection fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteFailurePolicy {
    /// Log the failure and report success, so VM deletion is never blocked
    #[default]
    Swallow,
    Propagate,
}

impl DeleteFailurePolicy {
    pub fn apply(self, connection_name: &str, result: Result<()>) -> Result<()> {
        match (self, result) {
            (_, Ok(())) => Ok(()),
            (DeleteFailurePolicy::Swallow, Err(e)) => {
                error!(
                    "Failed to delete Guacamole connection {}, continuing: {}",
                    connection_name, e
                );
                Ok(())
            }
            (DeleteFailurePolicy::Propagate, Err(e)) => Err(e),
        }
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    transport: Arc<dyn Transport>,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(transport: impl Transport + 'static, config: GatewayConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
        }
    }

    /// Exchange the admin credentials for a session token and data source
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> Result<AuthToken> {
        let url = self.endpoint(&["api", "tokens"], None)?;
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &self.config.username)
            .append_pair("password", &self.config.password)
            .finish();

        let request = build_request(
            Method::POST,
            &url,
            Some(("application/x-www-form-urlencoded", form.into())),
        )?;
        let response = self.execute(request).await?;

        if response.status() != StatusCode::OK {
            return Err(OperatorError::GatewayAuth(format!(
                "authentication failed with status {}",
                response.status().as_u16()
            )));
        }

        let token: AuthToken = decode(response.body())?;
        debug!("Authenticated against data source {}", token.data_source);
        Ok(token)
    }

    #[instrument(skip(self, spec), fields(connection = %spec.name))]
    pub async fn create_connection(&self, spec: &ConnectionSpec) -> Result<ConnectionHandle> {
        let token = self.authenticate().await?;
        let url = self.connections_url(&token, None)?;
        let body = serde_json::to_vec(&spec.to_wire())
            .map_err(|e| OperatorError::GatewayDecode(e.to_string()))?;

        let request = build_request(Method::POST, &url, Some(("application/json", body.into())))?;
        let response = self.execute(request).await?;

        if !response.status().is_success() {
            return Err(OperatorError::GatewayApi {
                status: response.status().as_u16(),
                message: format!("connection creation failed: {}", body_snippet(response.body())),
            });
        }

        let handle: ConnectionHandle = decode(response.body())?;
        info!(
            "Created Guacamole connection {} with identifier {} ({})",
            spec.name, handle.identifier, handle.protocol
        );
        Ok(handle)
    }

    /// Delete a connection by identifier. A connection that is already gone counts as deleted.
    #[instrument(skip(self))]
    pub async fn delete_connection_by_id(&self, identifier: &str) -> Result<()> {
        let token = self.authenticate().await?;
        let url = self.connections_url(&token, Some(identifier))?;

        let request = build_request(Method::DELETE, &url, None)?;
        let response = self.execute(request).await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                info!("Deleted Guacamole connection {}", identifier);
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                info!("Guacamole connection {} not found, already deleted", identifier);
                Ok(())
            }
            status => Err(OperatorError::GatewayApi {
                status: status.as_u16(),
                message: format!("connection deletion failed: {}", body_snippet(response.body())),
            }),
        }
    }

    /// All connections visible in the data source, keyed by identifier
    #[instrument(skip(self))]
    pub async fn list_connections(&self) -> Result<BTreeMap<String, ConnectionHandle>> {
        let token = self.authenticate().await?;
        let url = self.connections_url(&token, None)?;

        let request = build_request(Method::GET, &url, None)?;
        let response = self.execute(request).await?;

        if response.status() != StatusCode::OK {
            return Err(OperatorError::GatewayApi {
                status: response.status().as_u16(),
                message: format!("listing connections failed: {}", body_snippet(response.body())),
            });
        }

        decode(response.body())
    }

    /// Identifiers of every connection with exactly this name
    pub async fn find_connections_by_name(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .list_connections()
            .await?
            .into_iter()
            .filter(|(_, handle)| handle.name == name)
            .map(|(identifier, _)| identifier)
            .collect())
    }

    /// Delete every connection with this name. Failures on individual matches are
    /// logged and skipped; only authentication or listing failures are returned.
    #[instrument(skip(self))]
    pub async fn delete_connection_by_name(&self, name: &str) -> Result<()> {
        let identifiers = self.find_connections_by_name(name).await?;

        if identifiers.is_empty() {
            info!("No Guacamole connections named {} found, nothing to delete", name);
            return Ok(());
        }

        for identifier in identifiers {
            info!("Deleting Guacamole connection {} ({})", name, identifier);
            if let Err(e) = self.delete_connection_by_id(&identifier).await {
                error!(
                    "Failed to delete Guacamole connection {} ({}): {}",
                    name, identifier, e
                );
            }
        }

        Ok(())
    }

    fn connections_url(&self, token: &AuthToken, identifier: Option<&str>) -> Result<Url> {
        let mut segments = vec!["api", "session", "data", token.data_source.as_str(), "connections"];
        if let Some(identifier) = identifier {
            segments.push(identifier);
        }
        self.endpoint(&segments, Some(&token.auth_token))
    }

    fn endpoint(&self, segments: &[&str], token: Option<&str>) -> Result<Url> {
        let base = self.config.base_url.trim();
        if base.is_empty() {
            return Err(OperatorError::GatewayNotConfigured);
        }

        let mut url = Url::parse(base).map_err(|e| {
            OperatorError::GatewayTransport(format!("invalid base url {}: {}", base, e))
        })?;
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| OperatorError::GatewayTransport(format!("invalid base url {}", base)))?
            .pop_if_empty()
            .extend(segments);

        if let Some(token) = token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method().clone();
        let timeout = self.config.request_timeout;

        tokio::time::timeout(timeout, self.transport.send(request))
            .await
            .map_err(|_| {
                OperatorError::GatewayTransport(format!(
                    "{} request timed out after {:?}",
                    method, timeout
                ))
            })?
            .map_err(|e| OperatorError::GatewayTransport(format!("{} request failed: {}", method, e)))
    }
}

fn build_request(
    method: Method,
    url: &Url,
    body: Option<(&str, Bytes)>,
) -> Result<HttpRequest> {
    let builder = Request::builder().method(method).uri(url.as_str());
    let request = match body {
        Some((content_type, bytes)) => builder
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(bytes)),
        None => builder.body(Full::new(Bytes::new())),
    };
    request.map_err(|e| OperatorError::GatewayTransport(format!("failed to build request: {}", e)))
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| OperatorError::GatewayDecode(e.to_string()))
}

fn body_snippet(body: &Bytes) -> String {
    let end = body.len().min(MAX_ERROR_BODY_BYTES);
    String::from_utf8_lossy(&body[..end]).to_string()
}
