// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Default domain prefixing every annotation key and the finalizer
pub const DEFAULT_ANNOTATION_DOMAIN: &str = "vm-watcher.setofangdar.polito.it";

/// Annotation key suffixes, joined to the domain as `<domain>/<suffix>`
pub mod annotations {
    /// Ledger: set to "true" once the Guacamole connection was created
    pub const PROCESSED: &str = "processed";
    /// Ledger: printable status observed at the last recorded transition
    pub const LAST_STATUS: &str = "last-status";
    pub const PROTOCOL: &str = "protocol";
    pub const PORT: &str = "port";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const DOMAIN: &str = "domain";
    pub const FINALIZER: &str = "finalizer";
}

/// Guacamole defaults
pub mod guacamole {
    pub const DEFAULT_PARENT_IDENTIFIER: &str = "ROOT";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const RDP_DEFAULT_PORT: u16 = 3389;
    pub const VNC_DEFAULT_PORT: u16 = 5900;
    /// Upper bound on error body bytes carried into a delete failure
    pub const MAX_ERROR_BODY_BYTES: usize = 1024;
}

/// Reconciliation timing defaults
pub mod reconcile {
    pub const NOT_READY_REQUEUE_SECS: u64 = 30;
    pub const CREATE_RETRY_SECS: u64 = 120;
    pub const ERROR_REQUEUE_SECS: u64 = 10;
    pub const MAX_CONCURRENT_RECONCILES: u16 = 2;
    /// In-place retries of an unconditional ledger write that still hits a conflict
    pub const LEDGER_CONFLICT_RETRIES: u32 = 3;
}

/// CRD polling configuration
pub mod crd {
    pub const GROUP: &str = "kubevirt.io";
    pub const VERSION: &str = "v1";
    pub const KIND: &str = "VirtualMachine";
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
