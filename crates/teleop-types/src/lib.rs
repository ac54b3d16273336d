//! `teleop-types` – shared vocabulary of the teleop relay.
//!
//! Identifiers, the closed set of wire messages exchanged with vehicles and
//! operators, the JSON codec at the transport boundary, and the workspace-wide
//! [`RelayError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Server-side identity of one accepted connection.
///
/// Generated when the transport accepts a peer; never sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new random connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier a vehicle announces in `register_car` (e.g. `"car1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier an operator announces in `register_user`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(String);

impl OperatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperatorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound messages (peer → relay)
// ─────────────────────────────────────────────────────────────────────────────

/// Every message a vehicle or operator may send to the relay.
///
/// Anything that does not decode into one of these variants is rejected by
/// [`decode`] before it reaches routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// A vehicle announces itself and the locator of its video stream.
    #[serde(rename_all = "camelCase")]
    RegisterCar { car_id: VehicleId, stream_url: String },
    /// A browser operator announces itself.
    #[serde(rename_all = "camelCase")]
    RegisterUser { user_id: OperatorId },
    /// An operator asks for exclusive control of a vehicle.
    #[serde(rename_all = "camelCase")]
    SelectCar { user_id: OperatorId, car_id: VehicleId },
    /// Discrete drive command (e.g. `"forward"`, `"stop"`).
    #[serde(rename_all = "camelCase")]
    Command { user_id: OperatorId, command: String },
    /// Joystick axes, passed through unclamped.
    #[serde(rename_all = "camelCase")]
    AnalogCommand { user_id: OperatorId, x: f64, y: f64 },
    /// Vehicle telemetry; `status` is opaque to the relay.
    #[serde(rename_all = "camelCase")]
    Status {
        car_id: VehicleId,
        #[serde(default)]
        status: Value,
    },
}

impl InboundMessage {
    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::RegisterCar { .. } => "register_car",
            InboundMessage::RegisterUser { .. } => "register_user",
            InboundMessage::SelectCar { .. } => "select_car",
            InboundMessage::Command { .. } => "command",
            InboundMessage::AnalogCommand { .. } => "analog_command",
            InboundMessage::Status { .. } => "status",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound messages (relay → peer)
// ─────────────────────────────────────────────────────────────────────────────

/// One row of the vehicle list sent to a freshly registered operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary {
    pub car_id: VehicleId,
    pub stream_url: String,
}

/// Body of a `registered` reply. Vehicles and operators get different shapes
/// under the same `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Registration {
    #[serde(rename_all = "camelCase")]
    Operator {
        user_id: OperatorId,
        cars: Vec<VehicleSummary>,
    },
    #[serde(rename_all = "camelCase")]
    Vehicle { car_id: VehicleId },
}

/// Every message the relay sends to a vehicle or operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Registered(Registration),
    #[serde(rename_all = "camelCase")]
    CarSelected { car_id: VehicleId },
    Error { message: String },
    #[serde(rename_all = "camelCase")]
    Status { car_id: VehicleId, status: Value },
    Command { command: String },
    AnalogCommand { x: f64, y: f64 },
}

impl OutboundMessage {
    /// Build an `error` reply from anything displayable.
    pub fn error(reason: impl fmt::Display) -> Self {
        OutboundMessage::Error {
            message: reason.to_string(),
        }
    }

    /// Encode as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Serialization`] if `serde_json` rejects the value.
    pub fn to_json(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::Serialization(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────────────────

/// Decode a JSON text frame into an [`InboundMessage`].
///
/// # Errors
///
/// Returns [`RelayError::MalformedMessage`] for invalid JSON, an unknown
/// `type`, or missing/mistyped fields.
pub fn decode(text: &str) -> Result<InboundMessage, RelayError> {
    serde_json::from_str(text).map_err(|e| RelayError::MalformedMessage(e.to_string()))
}

/// Decode a binary frame. Microcontroller clients sometimes send JSON as
/// binary frames; the payload must still be UTF-8.
pub fn decode_bytes(bytes: &[u8]) -> Result<InboundMessage, RelayError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| RelayError::MalformedMessage(format!("binary frame is not UTF-8: {e}")))?;
    decode(text)
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error type shared by every teleop crate.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Channel {0} is closed")]
    ChannelClosed(ConnectionId),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Credential store error: {0}")]
    Credentials(String),
}
