// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Guacamole base url not configured")]
    GatewayNotConfigured,

    #[error("Guacamole authentication failed: {0}")]
    GatewayAuth(String),

    #[error("Guacamole API request failed with status {status}: {message}")]
    GatewayApi { status: u16, message: String },

    #[error("Guacamole request failed: {0}")]
    GatewayTransport(String),

    #[error("Failed to decode Guacamole response: {0}")]
    GatewayDecode(String),

    #[error("Failed to resolve VM hostname: {0}")]
    Hostname(String),
}

impl OperatorError {
    /// True for failures on the Guacamole side of the operator
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            OperatorError::GatewayNotConfigured
                | OperatorError::GatewayAuth(_)
                | OperatorError::GatewayApi { .. }
                | OperatorError::GatewayTransport(_)
                | OperatorError::GatewayDecode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
