//! Connection channels – the Router's only view of a remote peer.
//!
//! A [`Channel`] accepts outbound messages without blocking and reports
//! whether the peer is gone.  [`MpscChannel`] is the implementation the
//! WebSocket transport uses: the Router pushes into an unbounded tokio
//! channel and the connection task drains it onto the socket.
//!
//! [`Connection`] pairs a channel with the ids it registered.  The transport
//! owns it for the lifetime of the socket and hands it to
//! [`Router::handle_close`][crate::router::Router::handle_close] by value, so
//! the close path runs at most once per connection.

use std::sync::Arc;

use teleop_types::{ConnectionId, OperatorId, OutboundMessage, RelayError, VehicleId};
use tokio::sync::mpsc;

/// Outbound half of a connection to one vehicle or operator.
pub trait Channel: Send + Sync {
    /// Identity of the underlying connection.
    fn id(&self) -> ConnectionId;

    /// Queue `message` for delivery.  Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] once the peer has gone away.
    /// Callers treat this as a dropped frame, never as a fault.
    fn send(&self, message: OutboundMessage) -> Result<(), RelayError>;

    /// `true` once no further message can be delivered.
    fn is_closed(&self) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// MpscChannel
// ─────────────────────────────────────────────────────────────────────────────

/// [`Channel`] backed by a tokio unbounded mpsc sender.
#[derive(Debug, Clone)]
pub struct MpscChannel {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl MpscChannel {
    /// Create a channel with a fresh [`ConnectionId`] and return the receiver
    /// the transport should drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }
}

impl Channel for MpscChannel {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: OutboundMessage) -> Result<(), RelayError> {
        self.tx
            .send(message)
            .map_err(|_| RelayError::ChannelClosed(self.id))
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection
// ─────────────────────────────────────────────────────────────────────────────

/// A live peer as seen by the Router: its channel plus whatever it has
/// registered as so far.
///
/// One connection can register as a vehicle, as an operator, or (oddly, but
/// allowed) as both.
pub struct Connection {
    channel: Arc<dyn Channel>,
    pub(crate) vehicle_id: Option<VehicleId>,
    pub(crate) operator_id: Option<OperatorId>,
}

impl Connection {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            vehicle_id: None,
            operator_id: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.channel.id()
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Vehicle id this connection registered, if any.
    pub fn vehicle_id(&self) -> Option<&VehicleId> {
        self.vehicle_id.as_ref()
    }

    /// Operator id this connection registered, if any.
    pub fn operator_id(&self) -> Option<&OperatorId> {
        self.operator_id.as_ref()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("vehicle_id", &self.vehicle_id)
            .field("operator_id", &self.operator_id)
            .finish()
    }
}
