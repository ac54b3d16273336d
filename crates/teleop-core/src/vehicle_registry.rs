//! [`VehicleRegistry`] – connected vehicles keyed by [`VehicleId`].
//!
//! Each entry owns the vehicle's channel and the stream locator it advertised
//! at registration.  Registering an id that is already present replaces the
//! old entry outright.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use teleop_types::{ConnectionId, VehicleId, VehicleSummary};

use crate::channel::Channel;

/// A registered vehicle.
pub struct VehicleEntry {
    id: VehicleId,
    stream_url: String,
    channel: Arc<dyn Channel>,
    connected_at: DateTime<Utc>,
}

impl VehicleEntry {
    pub fn new(id: VehicleId, stream_url: impl Into<String>, channel: Arc<dyn Channel>) -> Self {
        Self {
            id,
            stream_url: stream_url.into(),
            channel,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &VehicleId {
        &self.id
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Connection that registered this entry.
    pub fn connection_id(&self) -> ConnectionId {
        self.channel.id()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    fn summary(&self) -> VehicleSummary {
        VehicleSummary {
            car_id: self.id.clone(),
            stream_url: self.stream_url.clone(),
        }
    }
}

/// Registry of connected vehicles.
///
/// Not synchronised on its own; the [`Router`][crate::router::Router] holds it
/// behind the same lock as the [`OperatorRegistry`][crate::operator_registry::OperatorRegistry].
#[derive(Default)]
pub struct VehicleRegistry {
    vehicles: HashMap<VehicleId, VehicleEntry>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry`, returning the entry it replaced (if any).
    pub fn register(&mut self, entry: VehicleEntry) -> Option<VehicleEntry> {
        self.vehicles.insert(entry.id.clone(), entry)
    }

    pub fn get(&self, id: &VehicleId) -> Option<&VehicleEntry> {
        self.vehicles.get(id)
    }

    pub fn contains(&self, id: &VehicleId) -> bool {
        self.vehicles.contains_key(id)
    }

    /// Remove `id` only if its entry was registered by `connection`.
    ///
    /// A connection closing after someone else re-registered the same id must
    /// not evict the newer vehicle.
    pub fn remove_owned(&mut self, id: &VehicleId, connection: ConnectionId) -> Option<VehicleEntry> {
        match self.vehicles.get(id) {
            Some(entry) if entry.connection_id() == connection => self.vehicles.remove(id),
            _ => None,
        }
    }

    /// Id and stream locator of every registered vehicle, sorted by id.
    pub fn snapshot(&self) -> Vec<VehicleSummary> {
        let mut cars: Vec<VehicleSummary> = self.vehicles.values().map(VehicleEntry::summary).collect();
        cars.sort_by(|a, b| a.car_id.cmp(&b.car_id));
        cars
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
