//! Slot pool management.
//!
//! # Responsibilities
//! - Keep an ordered, position-stable list of named server slots per backend
//! - Grow the pool to the configured minimum and to fit unplaced addresses
//! - Recycle slots created by the minimum-size step before minting new ones
//!
//! # Design Decisions
//! - Slots are never removed: removing one would shift the others' identities
//! - A slot name is assigned once at creation (`SRV_<n>`, 1-based) and is immutable
//! - An empty address marks a disabled slot

use std::collections::{BTreeMap, VecDeque};

use crate::store::PortEndpoints;

/// One live backend address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub address: String,
    pub port: u16,
}

impl Address {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

/// Live addresses of one service port, keyed by address.
///
/// Consumed during a reconciliation pass: every address that ends up owned by
/// a slot is removed from the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    entries: BTreeMap<String, Address>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the set from the endpoints of a service port.
    pub fn from_endpoints(endpoints: &PortEndpoints) -> Self {
        endpoints
            .addresses
            .iter()
            .map(|ip| Address::new(ip.clone(), endpoints.port))
            .collect()
    }

    /// Add an address. Blank addresses are dropped, since an empty slot
    /// address marks a disabled slot.
    pub fn insert(&mut self, address: Address) {
        if address.address.trim().is_empty() {
            tracing::warn!(port = address.port, "Ignoring endpoint with an empty address");
            return;
        }
        self.entries.insert(address.address.clone(), address);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    pub fn remove(&mut self, address: &str) -> Option<Address> {
        self.entries.remove(address)
    }

    /// Take the lowest address out of the set.
    pub fn pop_first(&mut self) -> Option<Address> {
        self.entries.pop_first().map(|(_, address)| address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Address> for AddressSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut set = AddressSet::new();
        for address in iter {
            set.insert(address);
        }
        set
    }
}

/// A named server placeholder in a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    name: String,
    /// Empty when the slot is disabled.
    pub address: String,
    pub port: u16,
    /// Set when the proxy has not yet seen the slot's current state.
    pub modified: bool,
}

impl Slot {
    /// A fresh disabled slot that still has to be pushed.
    fn disabled(name: String) -> Self {
        Self {
            name,
            address: String::new(),
            port: 0,
            modified: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_disabled(&self) -> bool {
        self.address.is_empty()
    }

    /// Put an address into the slot.
    pub(crate) fn assign(&mut self, address: Address) {
        self.address = address.address;
        self.port = address.port;
        self.modified = true;
    }

    /// Take the slot out of rotation.
    pub(crate) fn disable(&mut self) {
        self.address.clear();
        self.port = 0;
        self.modified = true;
    }
}

/// Ordered slots of one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPool {
    slots: Vec<Slot>,
}

impl SlotPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pool whose slots are already known to the proxy.
    ///
    /// Slots are named in order; an empty address yields a disabled slot.
    pub fn from_addresses<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u16)>,
        S: Into<String>,
    {
        let mut pool = SlotPool::new();
        for (address, port) in entries {
            let name = pool.next_name();
            pool.slots.push(Slot {
                name,
                address: address.into(),
                port,
                modified: false,
            });
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Slot> {
        self.slots.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Slot> {
        self.slots.iter_mut()
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    /// Number of slots holding an address.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_disabled()).count()
    }

    /// Number of slots waiting to be pushed.
    pub fn dirty_count(&self) -> usize {
        self.slots.iter().filter(|s| s.modified).count()
    }

    fn next_name(&self) -> String {
        format!("SRV_{}", self.slots.len() + 1)
    }

    /// Grow the pool to `min_slots` and place every address of the set.
    ///
    /// Slots created to reach the minimum are filled first; any address left
    /// over gets a brand-new slot at the end. All placed addresses are removed
    /// from `addresses`. Returns true when the pool grew, which needs a reload.
    pub fn scale(&mut self, addresses: &mut AddressSet, min_slots: usize) -> bool {
        let mut reload = false;
        let mut recyclable = VecDeque::new();

        while self.slots.len() < min_slots {
            let name = self.next_name();
            self.slots.push(Slot::disabled(name));
            recyclable.push_back(self.slots.len() - 1);
        }
        if !recyclable.is_empty() {
            reload = true;
            tracing::debug!(slots = min_slots, "Server slots scaled to configured minimum, reload required");
        }

        let mut minted = 0usize;
        while let Some(address) = addresses.pop_first() {
            match recyclable.pop_front() {
                Some(index) => self.slots[index].assign(address),
                None => {
                    let mut slot = Slot::disabled(self.next_name());
                    slot.assign(address);
                    self.slots.push(slot);
                    minted += 1;
                }
            }
        }
        if minted > 0 {
            reload = true;
            tracing::debug!(minted, slots = self.slots.len(), "Server slots scaled to match available endpoints, reload required");
        }

        reload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(list: &[(&str, u16)]) -> AddressSet {
        list.iter().map(|(a, p)| Address::new(*a, *p)).collect()
    }

    #[test]
    fn test_scale_to_minimum_then_fill() {
        let mut pool = SlotPool::new();
        let mut set = addresses(&[("10.0.0.1", 80)]);

        assert!(pool.scale(&mut set, 2));
        assert!(set.is_empty());
        assert_eq!(pool.len(), 2);

        let s0 = pool.get(0).unwrap();
        assert_eq!((s0.name(), s0.address.as_str(), s0.port, s0.modified), ("SRV_1", "10.0.0.1", 80, true));
        let s1 = pool.get(1).unwrap();
        assert_eq!(s1.name(), "SRV_2");
        assert!(s1.is_disabled());
        assert!(s1.modified);
    }

    #[test]
    fn test_scale_mints_beyond_minimum() {
        let mut pool = SlotPool::new();
        let mut set = addresses(&[("10.0.0.1", 80), ("10.0.0.2", 80), ("10.0.0.3", 80)]);

        assert!(pool.scale(&mut set, 1));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.active_count(), 3);
        let names: Vec<&str> = pool.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["SRV_1", "SRV_2", "SRV_3"]);
    }

    #[test]
    fn test_scale_never_shrinks() {
        let mut pool = SlotPool::from_addresses([("10.0.0.1", 80), ("", 0), ("", 0)]);
        assert!(!pool.scale(&mut AddressSet::new(), 1));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.dirty_count(), 0);
    }

    #[test]
    fn test_scale_does_not_recycle_existing_disabled_slots() {
        // Only slots created by the minimum-size step are recyclable here;
        // existing disabled slots are reused by the synchronizer.
        let mut pool = SlotPool::from_addresses([("", 0)]);
        let mut set = addresses(&[("10.0.0.9", 80)]);
        assert!(pool.scale(&mut set, 1));
        assert_eq!(pool.len(), 2);
        assert!(pool.get(0).unwrap().is_disabled());
        assert_eq!(pool.get(1).unwrap().address, "10.0.0.9");
    }

    #[test]
    fn test_blank_addresses_are_dropped() {
        let set = addresses(&[("", 80), ("  ", 80), ("10.0.0.1", 80)]);
        assert_eq!(set.len(), 1);
        assert!(set.contains("10.0.0.1"));

        let eps = PortEndpoints {
            port: 80,
            addresses: ["".to_string()].into(),
        };
        assert!(AddressSet::from_endpoints(&eps).is_empty());
    }

    #[test]
    fn test_address_set_from_endpoints() {
        let eps = PortEndpoints {
            port: 8080,
            addresses: ["10.0.0.2".to_string(), "10.0.0.1".to_string()].into(),
        };
        let mut set = AddressSet::from_endpoints(&eps);
        assert_eq!(set.len(), 2);
        assert_eq!(set.pop_first(), Some(Address::new("10.0.0.1", 8080)));
        assert!(set.contains("10.0.0.2"));
    }
}
