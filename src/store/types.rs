//! Lightweight resource snapshots delivered by the watching collaborator.
//!
//! All types derive Serde traits so a snapshot can be loaded from a JSON
//! document, and `PartialEq` so current/desired pairs compare by value.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Empty,
    Added,
    Modified,
    Deleted,
}

/// A resource paired with its watch status.
///
/// Equality of two `Tracked` values is defined by the resource alone.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tracked<T> {
    #[serde(default)]
    pub status: Status,
    #[serde(flatten)]
    pub resource: T,
}

impl<T> Tracked<T> {
    pub fn new(resource: T) -> Self {
        Self {
            status: Status::Empty,
            resource,
        }
    }

    pub fn with_status(resource: T, status: Status) -> Self {
        Self { status, resource }
    }

    /// Whether the resource should take part in a reconciliation pass.
    pub fn is_live(&self) -> bool {
        self.status != Status::Deleted
    }
}

impl<T: PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
    }
}

/// Port of a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServicePort {
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub port: u16,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

/// Useful data about a Kubernetes service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Service {
    pub namespace: String,
    pub name: String,
    pub ports: Vec<ServicePort>,
    /// External name; set for services of type ExternalName.
    pub dns: Option<String>,
    pub annotations: BTreeMap<String, String>,
}

impl Service {
    /// Resolve an ingress port reference against the service ports.
    pub fn resolve_port(&self, port_ref: &ServicePortRef) -> Option<&ServicePort> {
        self.ports.iter().find(|sp| match port_ref {
            ServicePortRef::Name(name) => &sp.name == name,
            ServicePortRef::Number(number) => sp.port == *number,
        })
    }
}

/// Live addresses of one service port.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PortEndpoints {
    /// Target port on the backend pods.
    pub port: u16,
    pub addresses: BTreeSet<String>,
}

/// Endpoints of a service, keyed by service port name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Endpoints {
    pub namespace: String,
    pub service: String,
    pub ports: BTreeMap<String, PortEndpoints>,
}

/// Reference from an ingress path to a service port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ServicePortRef {
    Number(u16),
    Name(String),
}

impl std::fmt::Display for ServicePortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServicePortRef::Number(n) => write!(f, "{}", n),
            ServicePortRef::Name(name) => f.write_str(name),
        }
    }
}

/// A single ingress path pointing at a service port.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IngressPath {
    #[serde(default)]
    pub path: String,
    pub service: String,
    pub port: ServicePortRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IngressRule {
    pub host: String,
    pub paths: Vec<IngressPath>,
}

/// Useful data about a Kubernetes ingress.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Ingress {
    pub namespace: String,
    pub name: String,
    pub class: Option<String>,
    pub annotations: BTreeMap<String, String>,
    pub rules: Vec<IngressRule>,
    pub default_backend: Option<IngressPath>,
}

impl Ingress {
    /// Every service reference of the ingress, default backend included.
    pub fn paths(&self) -> impl Iterator<Item = &IngressPath> {
        self.rules
            .iter()
            .flat_map(|rule| rule.paths.iter())
            .chain(self.default_backend.iter())
    }
}

/// Controller ConfigMap carrying cluster-wide annotations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigMap {
    pub namespace: String,
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

/// Resources of one namespace.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NamespaceSnapshot {
    pub services: BTreeMap<String, Tracked<Service>>,
    /// Keyed by service name.
    pub endpoints: BTreeMap<String, Endpoints>,
    pub ingresses: BTreeMap<String, Tracked<Ingress>>,
}

/// Desired cluster state for one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterSnapshot {
    pub namespaces: BTreeMap<String, NamespaceSnapshot>,
    pub config_map: ConfigMap,
}

impl ClusterSnapshot {
    /// Look up a live service.
    pub fn service(&self, namespace: &str, name: &str) -> Option<&Service> {
        self.namespaces
            .get(namespace)?
            .services
            .get(name)
            .filter(|svc| svc.is_live())
            .map(|svc| &svc.resource)
    }

    /// Look up the endpoints of one service port.
    pub fn port_endpoints(&self, namespace: &str, service: &str, port: &str) -> Option<&PortEndpoints> {
        self.namespaces
            .get(namespace)?
            .endpoints
            .get(service)?
            .ports
            .get(port)
    }
}
