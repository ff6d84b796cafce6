//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the controller.
//! All types derive Serde traits for deserialization from the TOML config file.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Root configuration for the ingress synchronizer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    /// Reconciliation loop settings.
    pub controller: ControllerSettings,

    /// HAProxy runtime API socket.
    pub runtime: RuntimeConfig,

    /// HAProxy Data Plane API.
    pub dataplane: DataPlaneConfig,

    /// Backoff for failed passes.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Reconciliation loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Path of the cluster snapshot (JSON) delivered by the watcher.
    pub snapshot_path: String,

    /// Interval between passes in seconds.
    pub sync_period_secs: u64,

    /// Only handle ingresses of this class (all when unset).
    pub ingress_class: Option<String>,

    /// Annotation values used when neither resources nor the ConfigMap set one.
    pub default_annotations: BTreeMap<String, String>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            snapshot_path: "/var/run/ingress-sync/snapshot.json".to_string(),
            sync_period_secs: 5,
            ingress_class: None,
            default_annotations: BTreeMap::from([
                ("scale-server-slots".to_string(), "42".to_string()),
                ("check".to_string(), "true".to_string()),
                ("load-balance".to_string(), "roundrobin".to_string()),
            ]),
        }
    }
}

/// Runtime API socket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Path of the stats socket.
    pub socket_path: String,

    /// Timeout of a single command in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            socket_path: "/var/run/haproxy-runtime-api.sock".to_string(),
            timeout_ms: 1000,
        }
    }
}

/// Data Plane API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataPlaneConfig {
    /// Base URL (e.g., "http://127.0.0.1:5555").
    pub url: String,

    pub username: String,

    pub password: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DataPlaneConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5555".to_string(),
            username: "admin".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            password: "CHANGE_ME_IN_PRODUCTION".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Backoff configuration for failed passes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
