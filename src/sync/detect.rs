//! Change detection over proxy-facing models.
//!
//! # Responsibilities
//! - Answer "did this object change" by deep value equality
//! - Map the kind of a changed object to the corrective action
//! - Render a readable field diff for debug logs
//!
//! # Design Decisions
//! - Equality is `PartialEq` on value types; maps and sets are ordered collections
//!   so two independently built snapshots with the same fields are equal
//! - Fields without proxy effect are kept out of the models, not skipped here

use serde::Serialize;
use serde_json::Value;

use crate::haproxy::models::{Backend, Defaults, Global, ServerOptions};

/// Corrective action required by a reconciliation pass, in increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SyncAction {
    /// Runtime updates only (or nothing at all).
    #[default]
    None,
    /// Configuration changed; reload the proxy.
    Reload,
    /// Process-global settings changed; restart the proxy.
    Restart,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::None => "none",
            SyncAction::Reload => "reload",
            SyncAction::Restart => "restart",
        }
    }

    /// Raise to `other` if it is more severe.
    pub fn escalate(&mut self, other: SyncAction) {
        if other > *self {
            *self = other;
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value copy of one of the compared model kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSnapshot {
    Global(Global),
    Defaults(Defaults),
    Backend(Backend),
    ServerTemplate(ServerOptions),
}

impl ModelSnapshot {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelSnapshot::Global(_) => "global",
            ModelSnapshot::Defaults(_) => "defaults",
            ModelSnapshot::Backend(_) => "backend",
            ModelSnapshot::ServerTemplate(_) => "server-template",
        }
    }

    /// Action needed when an object of this kind changed.
    pub fn severity(&self) -> SyncAction {
        match self {
            ModelSnapshot::Global(_) => SyncAction::Restart,
            _ => SyncAction::Reload,
        }
    }
}

/// Whether `after` differs from `before` in any field.
pub fn changed<T: PartialEq + ?Sized>(before: &T, after: &T) -> bool {
    before != after
}

/// Action required to go from `before` to `after`.
///
/// Snapshots of different kinds are never equal; the more severe action wins.
pub fn classify(before: &ModelSnapshot, after: &ModelSnapshot) -> SyncAction {
    if std::mem::discriminant(before) != std::mem::discriminant(after) {
        return before.severity().max(after.severity());
    }
    if changed(before, after) {
        after.severity()
    } else {
        SyncAction::None
    }
}

/// Field level differences between two serializable values, one line each.
pub fn describe_changes<T: Serialize>(before: &T, after: &T) -> Vec<String> {
    let mut out = Vec::new();
    match (serde_json::to_value(before), serde_json::to_value(after)) {
        (Ok(a), Ok(b)) => diff_values("", &a, &b, &mut out),
        _ => out.push("<unserializable>".to_string()),
    }
    out
}

fn diff_values(path: &str, before: &Value, after: &Value, out: &mut Vec<String>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let child = if path.is_empty() { key.clone() } else { format!("{}.{}", path, key) };
                diff_values(
                    &child,
                    a.get(key).unwrap_or(&Value::Null),
                    b.get(key).unwrap_or(&Value::Null),
                    out,
                );
            }
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                diff_values(&format!("{}[{}]", path, i), x, y, out);
            }
        }
        _ if before != after => {
            let name = if path.is_empty() { "<root>" } else { path };
            out.push(format!("{}: {} != {}", name, before, after));
        }
        _ => {}
    }
}
