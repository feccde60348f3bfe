// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guacamole_operator::config::Config;
use guacamole_operator::gateway::{https_transport, GatewayClient};
use guacamole_operator::kubernetes::wait_for_virtual_machine_crd;
use guacamole_operator::reconcilers::VirtualMachineReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Guacamole operator");

    let config = Config::from_env()?;
    if config.gateway.base_url.is_empty() {
        warn!("GUACAMOLE_BASE_URL not set, connection changes will fail until it is configured");
    }
    info!(
        "Configuration loaded: guacamole={}, parent={}, annotation finalizer={}",
        config.gateway.base_url, config.gateway.parent_identifier, config.keys.finalizer
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for KubeVirt VirtualMachine CRD to become available...");
    wait_for_virtual_machine_crd(&client).await?;

    let transport = https_transport().context("Failed to load TLS root certificates")?;
    let gateway = GatewayClient::new(transport, config.gateway.clone());
    let reconciler = VirtualMachineReconciler::new(client, gateway, config);

    info!("Starting VirtualMachine reconciler...");
    reconciler.run().await?;

    info!("Controller shut down");
    Ok(())
}
