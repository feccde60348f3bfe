// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Startup gate: block until the KubeVirt VirtualMachine kind is served.

use crate::constants::crd::{GROUP, KIND, POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS, VERSION};
use crate::error::Result;
use kube::{discovery::ApiResource, discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for kubevirt.io/v1 VirtualMachine to be discoverable, backing off from
/// POLL_INTERVAL_SECS up to POLL_MAX_INTERVAL_SECS between attempts.
pub async fn wait_for_virtual_machine_crd(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match virtual_machine_crd_exists(client).await {
            Ok(true) => {
                info!("{} CRD ({}/{}) is available", KIND, GROUP, VERSION);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "{} CRD ({}/{}) not yet available, waiting {} seconds...",
                    KIND, GROUP, VERSION, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for {} CRD: {}, retrying in {} seconds...",
                    KIND, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;
        interval = next_interval(interval);
    }
}

fn next_interval(current: u64) -> u64 {
    (current * 2).min(POLL_MAX_INTERVAL_SECS)
}

async fn virtual_machine_crd_exists(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[GROUP])
        .run()
        .await?;

    let found = discovery
        .groups()
        .filter(|group| group.name() == GROUP)
        .any(|group| {
            group
                .recommended_resources()
                .iter()
                .any(|(ar, _)| is_virtual_machine(ar))
        });
    Ok(found)
}

fn is_virtual_machine(ar: &ApiResource) -> bool {
    ar.group == GROUP && ar.version == VERSION && ar.kind == KIND
}
