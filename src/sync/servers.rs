//! Backend server synchronization.
//!
//! # Responsibilities
//! - Match live addresses against the slot pool, disabling stale slots
//! - Reuse disabled slots for new addresses, then grow the pool for the rest
//! - Push dirty slots through the control plane: runtime API for the running
//!   proxy, configuration write so the change survives the next reload
//! - Re-push every slot when the backend is new or the server template changed
//! - Recover the pool from the proxy's configuration when an existing backend
//!   has no local state (first pass after a controller restart)
//!
//! # Design Decisions
//! - One pass runs in two phases: reconcile existing slots, then `SlotPool::scale`
//!   with the leftovers, so no live address is ever dropped
//! - Previously idle slots are reused before slots freed in this pass
//! - Address is always set before state so a server never turns ready on a stale address
//! - A slot stays `modified` until every call for it succeeded

use std::collections::BTreeMap;

use crate::haproxy::models::{Server, ServerOptions, ServerState, Toggle};
use crate::haproxy::ControlPlane;
use crate::observability::metrics;
use crate::store::BackendSlots;
use crate::sync::detect::{changed, describe_changes};
use crate::sync::errors::{ErrorList, Operation, SyncError};
use crate::sync::slots::{AddressSet, Slot, SlotPool};

/// Slot whose options are read back when no template was applied by this process.
const TEMPLATE_SOURCE_SLOT: &str = "SRV_1";

/// Address pushed for disabled slots.
const DISABLED_ADDRESS: &str = "127.0.0.1";

/// Prefix of slot server names.
const SLOT_PREFIX: &str = "SRV_";

/// Inputs of one backend synchronization.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Proxy-facing backend name.
    pub backend: String,
    /// The backend was created in this pass.
    pub new_backend: bool,
    /// Live addresses of the service port.
    pub addresses: AddressSet,
    /// Server options every slot must carry.
    pub template: ServerOptions,
    /// Minimum pool size; 0 when unset.
    pub min_slots: usize,
}

/// Result of one backend synchronization.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// The pool grew, the server template changed, or servers are missing
    /// from the running proxy.
    pub reload_required: bool,
    pub pool_scaled: bool,
    pub template_changed: bool,
    /// Slots disabled because their address disappeared.
    pub disabled: usize,
    /// Slots pushed to the control plane.
    pub pushed: usize,
    pub error: Option<SyncError>,
}

impl SyncOutcome {
    pub fn into_result(self) -> Result<bool, SyncError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.reload_required),
        }
    }
}

/// Outcome of the runtime half of a slot push. Default means skipped or applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RuntimePush {
    /// The running proxy does not know the server.
    missing: bool,
    failed: bool,
}

/// Counts of the reconcile phase.
struct Reconciled {
    disabled: usize,
    reused: usize,
}

/// Match live addresses against the pool.
///
/// Represented addresses are removed from the set, stale slots are disabled and
/// the remaining addresses are placed into disabled slots: first those that
/// were already idle, then those freed here. Unplaced addresses stay in the set.
fn reconcile(pool: &mut SlotPool, addresses: &mut AddressSet) -> Reconciled {
    let mut idle = Vec::new();
    let mut freed = Vec::new();

    for (index, slot) in pool.iter_mut().enumerate() {
        if slot.is_disabled() {
            idle.push(index);
            continue;
        }
        match addresses.remove(&slot.address) {
            Some(live) => {
                if live.port != slot.port {
                    slot.port = live.port;
                    slot.modified = true;
                }
            }
            None => {
                slot.disable();
                freed.push(index);
            }
        }
    }

    let disabled = freed.len();
    let mut reused = 0;
    for index in idle.into_iter().chain(freed) {
        if addresses.is_empty() {
            break;
        }
        if let (Some(slot), Some(address)) = (pool.slot_mut(index), addresses.pop_first()) {
            slot.assign(address);
            reused += 1;
        }
    }

    Reconciled { disabled, reused }
}

/// 1-based position encoded in a slot name.
fn slot_number(name: &str) -> Option<usize> {
    name.strip_prefix(SLOT_PREFIX)?.parse().ok().filter(|n| *n > 0)
}

/// Rebuild a pool from the servers configured in the proxy.
///
/// Servers parked on the disabled address or in maintenance come back as
/// disabled slots. Numbering gaps become disabled slots too; foreign servers
/// are ignored. Nothing is marked dirty: the proxy already holds this state.
fn recover_pool(servers: Vec<Server>) -> SlotPool {
    let mut by_number: BTreeMap<usize, Server> = servers
        .into_iter()
        .filter_map(|server| slot_number(&server.name).map(|n| (n, server)))
        .collect();
    let size = by_number.keys().next_back().copied().unwrap_or(0);

    SlotPool::from_addresses((1..=size).map(|n| match by_number.remove(&n) {
        Some(server)
            if server.address != DISABLED_ADDRESS && server.maintenance != Some(Toggle::Enabled) =>
        {
            let port = server.port.unwrap_or(0);
            (server.address, port)
        }
        _ => (String::new(), 0),
    }))
}

/// Configuration entry of a slot.
fn desired_server(slot: &Slot, template: &ServerOptions) -> Server {
    let (address, port, maintenance) = if slot.is_disabled() {
        (DISABLED_ADDRESS.to_string(), None, Toggle::Enabled)
    } else {
        (slot.address.clone(), Some(slot.port), Toggle::Disabled)
    };
    Server {
        name: slot.name().to_string(),
        address,
        port,
        maintenance: Some(maintenance),
        options: template.clone(),
    }
}

/// Synchronizes slot pools with the proxy through a control plane.
pub struct Synchronizer<'a, C> {
    client: &'a C,
}

impl<'a, C: ControlPlane> Synchronizer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Bring one backend's servers in line with its live addresses.
    pub async fn synchronize(&self, state: &mut BackendSlots, request: SyncRequest) -> SyncOutcome {
        let SyncRequest {
            backend,
            new_backend,
            mut addresses,
            template,
            min_slots,
        } = request;

        if !new_backend && state.pool.is_empty() {
            let listed = self.client.list_servers(&backend).await;
            metrics::record_control_plane_call(Operation::ListServers.as_str(), listed.is_ok());
            match listed {
                Ok(servers) => {
                    state.pool = recover_pool(servers);
                    tracing::debug!(backend = %backend, slots = state.pool.len(), "Slot pool recovered from proxy configuration");
                }
                Err(err) => {
                    let mut errors = ErrorList::new();
                    errors.add(&backend, "*", Operation::ListServers, err);
                    return SyncOutcome {
                        error: errors.into_result().err(),
                        ..Default::default()
                    };
                }
            }
        }

        let known_slots = state.pool.len();
        let reconciled = reconcile(&mut state.pool, &mut addresses);
        let pool_scaled = state.pool.scale(&mut addresses, min_slots);

        let template_changed = !new_backend && self.template_changed(&backend, state.applied_template.as_ref(), &template).await;
        let push_all = new_backend || template_changed;

        tracing::debug!(
            backend = %backend,
            slots = state.pool.len(),
            disabled = reconciled.disabled,
            reused = reconciled.reused,
            pool_scaled,
            template_changed,
            "Slot pool reconciled"
        );

        let mut errors = ErrorList::new();
        let mut pushed = 0;
        let mut missing = false;
        let mut config_failed = false;

        for (index, slot) in state.pool.iter_mut().enumerate() {
            if !slot.modified && !push_all {
                continue;
            }
            tracing::debug!(backend = %backend, server = slot.name(), address = %slot.address, port = slot.port, "Updating server");

            // Slots minted in this pass are not known to the running proxy yet.
            let live = !new_backend && index < known_slots;
            let runtime = if live {
                self.push_runtime(&backend, slot, &mut errors).await
            } else {
                RuntimePush::default()
            };
            missing |= runtime.missing;

            let written = self.push_config(&backend, slot, &template, &mut errors).await;
            config_failed |= !written;

            pushed += 1;
            if written && !runtime.failed {
                slot.modified = false;
            }
        }

        if !config_failed {
            state.applied_template = Some(template);
        }
        if missing {
            tracing::debug!(backend = %backend, "Servers missing from the running proxy, reload required");
        }

        metrics::record_slot_pool(&backend, state.pool.len(), state.pool.active_count(), state.pool.dirty_count());

        SyncOutcome {
            reload_required: pool_scaled || template_changed || missing,
            pool_scaled,
            template_changed,
            disabled: reconciled.disabled,
            pushed,
            error: errors.into_result().err(),
        }
    }

    /// Compare the requested template with the one last applied.
    async fn template_changed(&self, backend: &str, applied: Option<&ServerOptions>, template: &ServerOptions) -> bool {
        let previous = match applied {
            Some(previous) => previous.clone(),
            None => match self.client.get_server(backend, TEMPLATE_SOURCE_SLOT).await {
                Ok(server) => server.options,
                Err(err) => {
                    tracing::debug!(backend = %backend, error = %err, "Could not read current server options, re-pushing all servers");
                    return true;
                }
            },
        };

        if changed(&previous, template) {
            tracing::debug!(
                backend = %backend,
                changes = ?describe_changes(&previous, template),
                "Server options were updated, reload required"
            );
            true
        } else {
            false
        }
    }

    /// Live address/state update, address first.
    async fn push_runtime(&self, backend: &str, slot: &Slot, errors: &mut ErrorList) -> RuntimePush {
        let (ip, port, state) = if slot.is_disabled() {
            (DISABLED_ADDRESS, 0, ServerState::Maint)
        } else {
            (slot.address.as_str(), slot.port, ServerState::Ready)
        };

        let addr_result = self.client.set_server_address(backend, slot.name(), ip, port).await;
        metrics::record_control_plane_call(Operation::SetAddress.as_str(), addr_result.is_ok());
        let state_result = self.client.set_server_state(backend, slot.name(), state).await;
        metrics::record_control_plane_call(Operation::SetState.as_str(), state_result.is_ok());

        let mut outcome = RuntimePush::default();
        for (operation, result) in [(Operation::SetAddress, addr_result), (Operation::SetState, state_result)] {
            match result {
                Ok(()) => {}
                // The configuration write that follows materializes it on reload.
                Err(err) if err.is_not_found() => outcome.missing = true,
                Err(err) => {
                    errors.add(backend, slot.name(), operation, err);
                    outcome.failed = true;
                }
            }
        }
        outcome
    }

    /// Write the server into the configuration, creating it when the edit
    /// reports that it does not exist.
    async fn push_config(&self, backend: &str, slot: &Slot, template: &ServerOptions, errors: &mut ErrorList) -> bool {
        let desired = desired_server(slot, template);

        let err = match self.client.edit_server(backend, &desired).await {
            Ok(()) => {
                metrics::record_control_plane_call(Operation::EditServer.as_str(), true);
                tracing::trace!(backend = %backend, server = %desired.name, "Server updated");
                return true;
            }
            Err(err) => err,
        };

        if !err.is_not_found() {
            metrics::record_control_plane_call(Operation::EditServer.as_str(), false);
            errors.add(backend, slot.name(), Operation::EditServer, err);
            return false;
        }

        tracing::trace!(backend = %backend, server = %desired.name, "Creating server");
        match self.client.create_server(backend, &desired).await {
            Ok(()) => {
                metrics::record_control_plane_call(Operation::CreateServer.as_str(), true);
                true
            }
            Err(err) => {
                metrics::record_control_plane_call(Operation::CreateServer.as_str(), false);
                errors.add(backend, slot.name(), Operation::CreateServer, err);
                false
            }
        }
    }
}
