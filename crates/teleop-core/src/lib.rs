//! `teleop-core` – Connection registry and message routing
//!
//! Tracks which vehicles and operators are connected, enforces the
//! one-operator-per-vehicle rule, and forwards drive commands and telemetry
//! between the two populations.  No I/O happens here: peers are reached
//! through the [`Channel`] abstraction and the transport feeds decoded
//! messages in.
//!
//! # Modules
//!
//! - [`channel`] – [`Channel`] trait, the tokio-backed [`MpscChannel`], and
//!   the per-socket [`Connection`] state.
//! - [`vehicle_registry`] – [`VehicleRegistry`]: vehicle id → channel +
//!   stream locator.
//! - [`operator_registry`] – [`OperatorRegistry`]: operator id → channel +
//!   optional bound vehicle.
//! - [`router`] – [`Router`]: the state machine tying it together.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use teleop_core::{Connection, MpscChannel, Router};
//! use teleop_types::{InboundMessage, OutboundMessage, Registration};
//!
//! let router = Router::default();
//! let (channel, mut rx) = MpscChannel::new();
//! let mut car = Connection::new(Arc::new(channel));
//!
//! router.handle_message(
//!     &mut car,
//!     InboundMessage::RegisterCar { car_id: "car1".into(), stream_url: "rtsp://x".into() },
//! );
//! assert!(matches!(
//!     rx.try_recv(),
//!     Ok(OutboundMessage::Registered(Registration::Vehicle { .. }))
//! ));
//!
//! router.handle_close(car);
//! assert_eq!(router.stats().vehicles, 0);
//! ```

pub mod channel;
pub mod operator_registry;
pub mod router;
pub mod vehicle_registry;

pub use channel::{Channel, Connection, MpscChannel};
pub use operator_registry::{OperatorEntry, OperatorRegistry};
pub use router::{RejectReason, Router, RouterStats};
pub use vehicle_registry::{VehicleEntry, VehicleRegistry};
