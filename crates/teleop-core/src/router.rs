//! [`Router`] – the relay state machine.
//!
//! Interprets every decoded [`InboundMessage`], mutates the vehicle and
//! operator registries, and forwards frames to the right peer:
//!
//! | Inbound | Effect | Reply |
//! |---|---|---|
//! | `register_car` | insert/overwrite vehicle | `registered` to sender |
//! | `register_user` | insert/overwrite operator (unbound) | `registered` + vehicle list to sender |
//! | `select_car` | bind operator if vehicle exists and is free | `car_selected` or `error` to sender |
//! | `command` / `analog_command` | forward to the operator's bound vehicle | `error` to operator if the vehicle is gone |
//! | `status` | forward to the operator bound to the vehicle | none |
//!
//! Both registries live behind one mutex, so every message is handled as a
//! single atomic step.  In particular the "is anyone bound to this vehicle"
//! scan and the bind in `select_car` cannot interleave with another
//! selection.
//!
//! Operators bound to a vehicle that disconnects are left bound.  They learn
//! about it from the `error` reply to their next command.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use teleop_types::{InboundMessage, OperatorId, OutboundMessage, Registration, VehicleId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::channel::{Channel, Connection};
use crate::operator_registry::{OperatorEntry, OperatorRegistry};
use crate::vehicle_registry::{VehicleEntry, VehicleRegistry};

/// Recoverable rejections reported to operators as `error` frames.
///
/// The `Display` text is exactly what goes on the wire.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("car unavailable")]
    CarUnavailable,

    #[error("car already in use")]
    CarInUse,

    #[error("vehicle disconnected")]
    VehicleDisconnected,
}

/// Point-in-time counts, for logging and health output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterStats {
    pub vehicles: usize,
    pub operators: usize,
    /// Operators holding a binding, including bindings whose vehicle is gone.
    pub bindings: usize,
}

struct Registries {
    vehicles: VehicleRegistry,
    operators: OperatorRegistry,
}

/// Routes messages between vehicles and operators.
///
/// Shared between connection tasks as `Arc<Router>`.
pub struct Router {
    registries: Mutex<Registries>,
}

impl Router {
    /// Build a router over the given registries.
    pub fn new(vehicles: VehicleRegistry, operators: OperatorRegistry) -> Self {
        Self {
            registries: Mutex::new(Registries {
                vehicles,
                operators,
            }),
        }
    }

    /// Handle one decoded message received on `connection`.
    ///
    /// Never fails: every rejection is either replied to the peer or logged.
    pub fn handle_message(&self, connection: &mut Connection, message: InboundMessage) {
        let mut guard = self.lock();
        let registries = &mut *guard;

        match message {
            InboundMessage::RegisterCar { car_id, stream_url } => {
                registries.register_car(connection, car_id, stream_url)
            }
            InboundMessage::RegisterUser { user_id } => registries.register_user(connection, user_id),
            InboundMessage::SelectCar { user_id, car_id } => {
                registries.select_car(connection, user_id, car_id)
            }
            InboundMessage::Command { user_id, command } => {
                info!(user_id = %user_id, command = %command, "drive command");
                registries.forward_to_vehicle(&user_id, OutboundMessage::Command { command })
            }
            InboundMessage::AnalogCommand { user_id, x, y } => {
                debug!(user_id = %user_id, x, y, "analog command");
                registries.forward_to_vehicle(&user_id, OutboundMessage::AnalogCommand { x, y })
            }
            InboundMessage::Status { car_id, status } => {
                match registries.operators.bound_to(&car_id) {
                    Some(operator) => deliver(
                        operator.channel(),
                        OutboundMessage::Status { car_id, status },
                    ),
                    None => debug!(car_id = %car_id, "status for vehicle without operator dropped"),
                }
            }
        }
    }

    /// Tear down whatever `connection` registered.
    ///
    /// Takes the connection by value: a channel closes once.  Operators bound
    /// to a departing vehicle are neither notified nor unbound here.
    pub fn handle_close(&self, connection: Connection) {
        let mut guard = self.lock();
        let registries = &mut *guard;
        let connection_id = connection.id();

        if let Some(car_id) = connection.vehicle_id()
            && let Some(entry) = registries.vehicles.remove_owned(car_id, connection_id)
        {
            info!(
                car_id = %car_id,
                connected_secs = (Utc::now() - entry.connected_at()).num_seconds(),
                remaining = registries.vehicles.len(),
                "vehicle disconnected"
            );
        }

        if let Some(user_id) = connection.operator_id()
            && let Some(entry) = registries.operators.remove_owned(user_id, connection_id)
        {
            info!(
                user_id = %user_id,
                released = ?entry.bound_vehicle().map(VehicleId::as_str),
                connected_secs = (Utc::now() - entry.connected_at()).num_seconds(),
                remaining = registries.operators.len(),
                "operator disconnected"
            );
        }

        if connection.vehicle_id().is_none() && connection.operator_id().is_none() {
            debug!(connection = %connection_id, "unregistered connection closed");
        }
    }

    /// Current registry counts.
    pub fn stats(&self) -> RouterStats {
        let guard = self.lock();
        RouterStats {
            vehicles: guard.vehicles.len(),
            operators: guard.operators.len(),
            bindings: guard.operators.bound_count(),
        }
    }

    /// The vehicle `operator` is bound to, if it is registered and bound.
    pub fn binding_of(&self, operator: &OperatorId) -> Option<VehicleId> {
        self.lock()
            .operators
            .get(operator)
            .and_then(|entry| entry.bound_vehicle().cloned())
    }

    fn lock(&self) -> MutexGuard<'_, Registries> {
        // Every critical section leaves the registries consistent.
        self.registries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(VehicleRegistry::new(), OperatorRegistry::new())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-message handlers (run with the lock held)
// ─────────────────────────────────────────────────────────────────────────────

impl Registries {
    fn register_car(&mut self, connection: &mut Connection, car_id: VehicleId, stream_url: String) {
        let connection_id = connection.id();

        if let Some(previous) = connection.vehicle_id.take()
            && previous != car_id
            && self.vehicles.remove_owned(&previous, connection_id).is_some()
        {
            info!(old = %previous, new = %car_id, "vehicle re-registered under a new id");
        }

        info!(car_id = %car_id, stream_url = %stream_url, "vehicle registered");
        let entry = VehicleEntry::new(car_id.clone(), stream_url, Arc::clone(connection.channel()));
        if let Some(replaced) = self.vehicles.register(entry)
            && replaced.connection_id() != connection_id
        {
            warn!(car_id = %car_id, "vehicle id taken over by a new connection");
        }
        info!(total = self.vehicles.len(), "vehicles connected");

        connection.vehicle_id = Some(car_id.clone());
        deliver(
            connection.channel(),
            OutboundMessage::Registered(Registration::Vehicle { car_id }),
        );
    }

    fn register_user(&mut self, connection: &mut Connection, user_id: OperatorId) {
        let connection_id = connection.id();

        if let Some(previous) = connection.operator_id.take()
            && previous != user_id
            && self.operators.remove_owned(&previous, connection_id).is_some()
        {
            info!(old = %previous, new = %user_id, "operator re-registered under a new id");
        }

        let entry = OperatorEntry::new(user_id.clone(), Arc::clone(connection.channel()));
        if let Some(replaced) = self.operators.register(entry)
            && replaced.connection_id() != connection_id
        {
            warn!(user_id = %user_id, "operator id taken over by a new connection");
        }
        info!(user_id = %user_id, total = self.operators.len(), "operator registered");

        connection.operator_id = Some(user_id.clone());
        deliver(
            connection.channel(),
            OutboundMessage::Registered(Registration::Operator {
                user_id,
                cars: self.vehicles.snapshot(),
            }),
        );
    }

    fn select_car(&mut self, connection: &Connection, user_id: OperatorId, car_id: VehicleId) {
        if !self.vehicles.contains(&car_id) {
            warn!(user_id = %user_id, car_id = %car_id, "selection rejected: car unavailable");
            deliver(connection.channel(), OutboundMessage::error(RejectReason::CarUnavailable));
            return;
        }

        if let Some(holder) = self.operators.bound_to(&car_id) {
            warn!(
                user_id = %user_id,
                car_id = %car_id,
                holder = %holder.id(),
                "selection rejected: car already in use"
            );
            deliver(connection.channel(), OutboundMessage::error(RejectReason::CarInUse));
            return;
        }

        if !self.operators.bind(&user_id, car_id.clone()) {
            warn!(user_id = %user_id, car_id = %car_id, "selection from unregistered operator dropped");
            return;
        }

        info!(user_id = %user_id, car_id = %car_id, "operator bound to vehicle");
        deliver(connection.channel(), OutboundMessage::CarSelected { car_id });
    }

    fn forward_to_vehicle(&self, user_id: &OperatorId, payload: OutboundMessage) {
        let Some(operator) = self.operators.get(user_id) else {
            warn!(user_id = %user_id, "command from unregistered operator dropped");
            return;
        };
        let Some(car_id) = operator.bound_vehicle() else {
            warn!(user_id = %user_id, "command from operator without a vehicle dropped");
            return;
        };

        match self.vehicles.get(car_id) {
            Some(vehicle) => deliver(vehicle.channel(), payload),
            None => {
                warn!(user_id = %user_id, car_id = %car_id, "bound vehicle is no longer connected");
                deliver(
                    operator.channel(),
                    OutboundMessage::error(RejectReason::VehicleDisconnected),
                );
            }
        }
    }
}

/// Best-effort send.  A closed channel just loses the frame.
fn deliver(channel: &Arc<dyn Channel>, message: OutboundMessage) {
    if let Err(e) = channel.send(message) {
        debug!(connection = %channel.id(), error = %e, "frame dropped");
    }
}
