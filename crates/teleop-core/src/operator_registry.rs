//! [`OperatorRegistry`] – connected operators and their vehicle bindings.
//!
//! A binding is a weak reference: the bound [`VehicleId`] is only a lookup
//! key and may outlive the vehicle it names.  Exclusivity (one operator per
//! vehicle) is checked by the Router through [`OperatorRegistry::bound_to`]
//! before it calls [`OperatorRegistry::bind`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use teleop_types::{ConnectionId, OperatorId, VehicleId};

use crate::channel::Channel;

/// A registered operator.
pub struct OperatorEntry {
    id: OperatorId,
    bound_vehicle: Option<VehicleId>,
    channel: Arc<dyn Channel>,
    connected_at: DateTime<Utc>,
}

impl OperatorEntry {
    /// New, unbound operator.
    pub fn new(id: OperatorId, channel: Arc<dyn Channel>) -> Self {
        Self {
            id,
            bound_vehicle: None,
            channel,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &OperatorId {
        &self.id
    }

    pub fn bound_vehicle(&self) -> Option<&VehicleId> {
        self.bound_vehicle.as_ref()
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.channel.id()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

/// Registry of connected operators.
#[derive(Default)]
pub struct OperatorRegistry {
    operators: HashMap<OperatorId, OperatorEntry>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry`, returning the entry it replaced.  The replacement
    /// starts unbound, so re-registering releases any previous binding.
    pub fn register(&mut self, entry: OperatorEntry) -> Option<OperatorEntry> {
        self.operators.insert(entry.id.clone(), entry)
    }

    pub fn get(&self, id: &OperatorId) -> Option<&OperatorEntry> {
        self.operators.get(id)
    }

    pub fn contains(&self, id: &OperatorId) -> bool {
        self.operators.contains_key(id)
    }

    /// The operator currently bound to `vehicle`, if any.
    ///
    /// Linear scan; always reflects the registry at the moment of the call.
    pub fn bound_to(&self, vehicle: &VehicleId) -> Option<&OperatorEntry> {
        self.operators
            .values()
            .find(|op| op.bound_vehicle.as_ref() == Some(vehicle))
    }

    /// Bind `operator` to `vehicle`, replacing any earlier binding it held.
    ///
    /// Returns `false` when `operator` is not registered.  Does not check
    /// exclusivity; see [`OperatorRegistry::bound_to`].
    pub fn bind(&mut self, operator: &OperatorId, vehicle: VehicleId) -> bool {
        match self.operators.get_mut(operator) {
            Some(entry) => {
                entry.bound_vehicle = Some(vehicle);
                true
            }
            None => false,
        }
    }

    /// Remove `id` only if its entry was registered by `connection`.
    pub fn remove_owned(&mut self, id: &OperatorId, connection: ConnectionId) -> Option<OperatorEntry> {
        match self.operators.get(id) {
            Some(entry) if entry.connection_id() == connection => self.operators.remove(id),
            _ => None,
        }
    }

    /// Number of operators holding a binding (dangling ones included).
    pub fn bound_count(&self) -> usize {
        self.operators
            .values()
            .filter(|op| op.bound_vehicle.is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MpscChannel;

    fn channel() -> Arc<dyn Channel> {
        let (channel, _rx) = MpscChannel::new();
        Arc::new(channel)
    }

    #[test]
    fn new_operator_is_unbound() {
        let mut registry = OperatorRegistry::new();
        registry.register(OperatorEntry::new("u1".into(), channel()));

        let entry = registry.get(&"u1".into()).unwrap();
        assert!(entry.bound_vehicle().is_none());
        assert_eq!(registry.bound_count(), 0);
    }

    #[test]
    fn bind_and_find_by_vehicle() {
        let mut registry = OperatorRegistry::new();
        registry.register(OperatorEntry::new("u1".into(), channel()));
        registry.register(OperatorEntry::new("u2".into(), channel()));

        assert!(registry.bind(&"u1".into(), "car1".into()));

        let holder = registry.bound_to(&"car1".into()).unwrap();
        assert_eq!(holder.id().as_str(), "u1");
        assert!(registry.bound_to(&"car2".into()).is_none());
        assert_eq!(registry.bound_count(), 1);
    }

    #[test]
    fn bind_unknown_operator_is_rejected() {
        let mut registry = OperatorRegistry::new();
        assert!(!registry.bind(&"ghost".into(), "car1".into()));
        assert!(registry.bound_to(&"car1".into()).is_none());
    }

    #[test]
    fn rebinding_moves_the_binding() {
        let mut registry = OperatorRegistry::new();
        registry.register(OperatorEntry::new("u1".into(), channel()));
        registry.bind(&"u1".into(), "car1".into());
        registry.bind(&"u1".into(), "car2".into());

        assert!(registry.bound_to(&"car1".into()).is_none());
        assert_eq!(registry.bound_to(&"car2".into()).unwrap().id().as_str(), "u1");
    }

    #[test]
    fn re_registering_clears_binding() {
        let mut registry = OperatorRegistry::new();
        registry.register(OperatorEntry::new("u1".into(), channel()));
        registry.bind(&"u1".into(), "car1".into());

        let previous = registry
            .register(OperatorEntry::new("u1".into(), channel()))
            .unwrap();
        assert_eq!(previous.bound_vehicle().map(VehicleId::as_str), Some("car1"));
        assert!(registry.get(&"u1".into()).unwrap().bound_vehicle().is_none());
        assert!(registry.bound_to(&"car1".into()).is_none());
    }

    #[test]
    fn remove_owned_frees_the_vehicle() {
        let mut registry = OperatorRegistry::new();
        let ch = channel();
        registry.register(OperatorEntry::new("u1".into(), Arc::clone(&ch)));
        registry.bind(&"u1".into(), "car1".into());

        assert!(registry.remove_owned(&"u1".into(), ConnectionId::new()).is_none());
        assert!(registry.remove_owned(&"u1".into(), ch.id()).is_some());
        assert!(registry.bound_to(&"car1".into()).is_none());
        assert!(registry.is_empty());
    }
}
