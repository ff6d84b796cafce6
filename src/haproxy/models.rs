//! Proxy-facing configuration models.
//!
//! Field names follow the HAProxy Data Plane API so the same types are used
//! on the wire and by the change detector. Every type compares by value;
//! collections are ordered so equality never depends on insertion order.
//!
//! Sections are read, changed and written back whole, so `Global`, `Defaults`
//! and `Backend` carry every field the controller does not manage in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `enabled` / `disabled` switch used by several server and backend options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Enabled,
    Disabled,
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        if value {
            Toggle::Enabled
        } else {
            Toggle::Disabled
        }
    }
}

/// Administrative state of a server as set through the runtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Ready,
    Maint,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Ready => "ready",
            ServerState::Maint => "maint",
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-global settings. Any change requires a process restart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Global {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbthread: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_snippet: Vec<String>,
    /// Unmanaged fields, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Defaults section. Timeouts are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_timeout: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Balance {
    pub algorithm: String,
}

/// Cookie based session persistence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cookie {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub nocache: bool,
    #[serde(default)]
    pub indirect: bool,
}

impl Cookie {
    /// Insert-mode cookie as configured by the `cookie-persistence` annotation.
    pub fn insert(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "insert".to_string(),
            nocache: true,
            indirect: true,
        }
    }
}

/// A backend section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Backend {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Balance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Cookie>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_snippet: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Backend {
    /// A new HTTP backend with round-robin balancing.
    pub fn http(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: Some("http".to_string()),
            balance: Some(Balance { algorithm: "roundrobin".to_string() }),
            ..Default::default()
        }
    }
}

/// Server options shared by every slot of a backend (the server template).
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<Toggle>,
    /// Health check interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inter: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<Toggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxconn: Option<i64>,
}

/// A backend server: slot identity plus the shared options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Server {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Toggle>,
    #[serde(flatten)]
    pub options: ServerOptions,
}

/// Configuration sections that can be pushed in bulk.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigObject {
    Global(Global),
    Defaults(Defaults),
    Backend(Backend),
}

impl ConfigObject {
    /// Section name used in logs and metrics.
    pub fn class(&self) -> &'static str {
        match self {
            ConfigObject::Global(_) => "global",
            ConfigObject::Defaults(_) => "defaults",
            ConfigObject::Backend(_) => "backend",
        }
    }
}
