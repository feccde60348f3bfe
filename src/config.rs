// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{annotations, guacamole, reconcile, DEFAULT_ANNOTATION_DOMAIN};
use anyhow::{ensure, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub reconcile: ReconcileConfig,
    pub keys: AnnotationKeys,
}

/// Connection details for the Guacamole REST API
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base address, e.g. https://guacamole.example.com/guacamole. Empty when unset.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub parent_identifier: String,
    pub request_timeout: Duration,
}

// Keeps the admin password out of logs
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("parent_identifier", &self.parent_identifier)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Requeue delay while a VM is not yet running
    pub not_ready_delay: Duration,
    /// Requeue delay after a failed connection creation; longer than `not_ready_delay`
    pub create_retry_delay: Duration,
    /// Requeue delay applied by the controller error policy
    pub error_delay: Duration,
    pub max_concurrent_reconciles: u16,
    /// Look for an existing connection by name before creating one
    pub adopt_existing_connections: bool,
}

/// Fully qualified annotation keys and finalizer, derived from one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationKeys {
    pub processed: String,
    pub last_status: String,
    pub protocol: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub domain: String,
    pub finalizer: String,
}

impl AnnotationKeys {
    pub fn with_domain(domain: &str) -> Self {
        let key = |suffix: &str| format!("{}/{}", domain.trim_end_matches('/'), suffix);
        Self {
            processed: key(annotations::PROCESSED),
            last_status: key(annotations::LAST_STATUS),
            protocol: key(annotations::PROTOCOL),
            port: key(annotations::PORT),
            username: key(annotations::USERNAME),
            password: key(annotations::PASSWORD),
            domain: key(annotations::DOMAIN),
            finalizer: key(annotations::FINALIZER),
        }
    }
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self::with_domain(DEFAULT_ANNOTATION_DOMAIN)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            not_ready_delay: Duration::from_secs(reconcile::NOT_READY_REQUEUE_SECS),
            create_retry_delay: Duration::from_secs(reconcile::CREATE_RETRY_SECS),
            error_delay: Duration::from_secs(reconcile::ERROR_REQUEUE_SECS),
            max_concurrent_reconciles: reconcile::MAX_CONCURRENT_RECONCILES,
            adopt_existing_connections: false,
        }
    }
}

impl ReconcileConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.create_retry_delay > self.not_ready_delay,
            "CREATE_RETRY_SECS ({}s) must be longer than NOT_READY_REQUEUE_SECS ({}s)",
            self.create_retry_delay.as_secs(),
            self.not_ready_delay.as_secs()
        );
        // kube-runtime treats a concurrency of 0 as unbounded
        ensure!(
            self.max_concurrent_reconciles > 0,
            "MAX_CONCURRENT_RECONCILES must be at least 1"
        );
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("GUACAMOLE_BASE_URL").unwrap_or_default();
        let username =
            lookup("GUACAMOLE_USERNAME").context("GUACAMOLE_USERNAME environment variable not set")?;
        let password =
            lookup("GUACAMOLE_PASSWORD").context("GUACAMOLE_PASSWORD environment variable not set")?;
        let parent_identifier = lookup("GUACAMOLE_PARENT_IDENTIFIER")
            .unwrap_or_else(|| guacamole::DEFAULT_PARENT_IDENTIFIER.to_string());
        let timeout_secs: u64 =
            parse_or(&lookup, "GUACAMOLE_TIMEOUT_SECS", guacamole::DEFAULT_TIMEOUT_SECS)?;

        let domain = lookup("ANNOTATION_DOMAIN")
            .unwrap_or_else(|| DEFAULT_ANNOTATION_DOMAIN.to_string());

        let reconcile = ReconcileConfig {
            not_ready_delay: Duration::from_secs(parse_or(
                &lookup,
                "NOT_READY_REQUEUE_SECS",
                reconcile::NOT_READY_REQUEUE_SECS,
            )?),
            create_retry_delay: Duration::from_secs(parse_or(
                &lookup,
                "CREATE_RETRY_SECS",
                reconcile::CREATE_RETRY_SECS,
            )?),
            error_delay: Duration::from_secs(parse_or(
                &lookup,
                "ERROR_REQUEUE_SECS",
                reconcile::ERROR_REQUEUE_SECS,
            )?),
            max_concurrent_reconciles: parse_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILES",
                reconcile::MAX_CONCURRENT_RECONCILES,
            )?,
            adopt_existing_connections: parse_or(&lookup, "ADOPT_EXISTING_CONNECTIONS", false)?,
        };
        reconcile.validate()?;

        Ok(Config {
            gateway: GatewayConfig {
                base_url,
                username,
                password,
                parent_identifier,
                request_timeout: Duration::from_secs(timeout_secs),
            },
            reconcile,
            keys: AnnotationKeys::with_domain(&domain),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("GUACAMOLE_BASE_URL", "https://guac.example.com/guacamole"),
            ("GUACAMOLE_USERNAME", "guacadmin"),
            ("GUACAMOLE_PASSWORD", "guacadmin"),
        ]))
        .unwrap();

        assert_eq!(config.gateway.base_url, "https://guac.example.com/guacamole");
        assert_eq!(config.gateway.parent_identifier, "ROOT");
        assert_eq!(config.gateway.request_timeout, Duration::from_secs(30));
        assert_eq!(config.reconcile.not_ready_delay, Duration::from_secs(30));
        assert_eq!(config.reconcile.create_retry_delay, Duration::from_secs(120));
        assert_eq!(config.reconcile.max_concurrent_reconciles, 2);
        assert!(!config.reconcile.adopt_existing_connections);
        assert_eq!(
            config.keys.finalizer,
            "vm-watcher.setofangdar.polito.it/finalizer"
        );
    }

    #[test]
    fn test_missing_base_url_is_not_fatal() {
        let config = Config::from_lookup(lookup_from(&[
            ("GUACAMOLE_USERNAME", "guacadmin"),
            ("GUACAMOLE_PASSWORD", "guacadmin"),
        ]))
        .unwrap();

        assert!(config.gateway.base_url.is_empty());
    }

    #[test]
    fn test_missing_credentials_is_error() {
        let result = Config::from_lookup(lookup_from(&[("GUACAMOLE_USERNAME", "guacadmin")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_number_is_error() {
        let result = Config::from_lookup(lookup_from(&[
            ("GUACAMOLE_USERNAME", "guacadmin"),
            ("GUACAMOLE_PASSWORD", "guacadmin"),
            ("CREATE_RETRY_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_retry_must_exceed_not_ready_delay() {
        let result = Config::from_lookup(lookup_from(&[
            ("GUACAMOLE_USERNAME", "guacadmin"),
            ("GUACAMOLE_PASSWORD", "guacadmin"),
            ("CREATE_RETRY_SECS", "5"),
        ]));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("CREATE_RETRY_SECS"), "{}", err);

        let result = Config::from_lookup(lookup_from(&[
            ("GUACAMOLE_USERNAME", "guacadmin"),
            ("GUACAMOLE_PASSWORD", "guacadmin"),
            ("CREATE_RETRY_SECS", "30"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_concurrency_is_error() {
        let result = Config::from_lookup(lookup_from(&[
            ("GUACAMOLE_USERNAME", "guacadmin"),
            ("GUACAMOLE_PASSWORD", "guacadmin"),
            ("MAX_CONCURRENT_RECONCILES", "0"),
        ]));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("MAX_CONCURRENT_RECONCILES"), "{}", err);
    }

    #[test]
    fn test_custom_delays_accepted() {
        let config = Config::from_lookup(lookup_from(&[
            ("GUACAMOLE_USERNAME", "guacadmin"),
            ("GUACAMOLE_PASSWORD", "guacadmin"),
            ("NOT_READY_REQUEUE_SECS", "5"),
            ("CREATE_RETRY_SECS", "15"),
            ("MAX_CONCURRENT_RECONCILES", "4"),
        ]))
        .unwrap();
        assert_eq!(config.reconcile.create_retry_delay, Duration::from_secs(15));
        assert_eq!(config.reconcile.max_concurrent_reconciles, 4);
    }

    #[test]
    fn test_custom_domain_keys() {
        let keys = AnnotationKeys::with_domain("guac.example.com/");
        assert_eq!(keys.processed, "guac.example.com/processed");
        assert_eq!(keys.last_status, "guac.example.com/last-status");
        assert_eq!(keys.protocol, "guac.example.com/protocol");
    }

    #[test]
    fn test_debug_hides_password() {
        let config = Config::from_lookup(lookup_from(&[
            ("GUACAMOLE_USERNAME", "guacadmin"),
            ("GUACAMOLE_PASSWORD", "s3cr3t"),
        ]))
        .unwrap();
        assert!(!format!("{:?}", config).contains("s3cr3t"));
    }
}
