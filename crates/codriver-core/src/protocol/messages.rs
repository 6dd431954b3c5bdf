//! All codriver agent protocol message types.
//!
//! Requests flow from the driver to the agent embedded in the automated
//! process; [`AgentMessage::HelloAck`] and [`AgentMessage::Reply`] flow back.
//! Every frame carries the originating command id in its header, so replies
//! are correlated by id rather than by arrival order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::geometry::CoordinateConversion;
use crate::keys::KeyCode;
use crate::marshal::Value;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the common message header in bytes.
///
/// ```text
/// [version:1][msg_type:1][reserved:2][payload_len:4][command_id:8]
/// ```
pub const HEADER_SIZE: usize = 16;

// ── Message type codes ────────────────────────────────────────────────────────

/// All message type codes understood by the driver and the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Session channel (0x00–0x1F)
    Hello = 0x01,
    HelloAck = 0x02,
    Reply = 0x03,
    EnableHooks = 0x10,
    DisableHooks = 0x11,
    LoadScene = 0x12,
    Disconnect = 0x13,
    // Object queries (0x20–0x3F)
    ObjectExists = 0x20,
    GetField = 0x21,
    CallMethod = 0x22,
    GetObjectPosition = 0x23,
    // Input channel (0x40–0x7F)
    ClickObject = 0x40,
    PointerMove = 0x41,
    PointerButton = 0x42,
    PointerLocation = 0x43,
    KeysDown = 0x44,
    KeysUp = 0x45,
    InputIdle = 0x46,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::Hello),
            0x02 => Ok(MessageType::HelloAck),
            0x03 => Ok(MessageType::Reply),
            0x10 => Ok(MessageType::EnableHooks),
            0x11 => Ok(MessageType::DisableHooks),
            0x12 => Ok(MessageType::LoadScene),
            0x13 => Ok(MessageType::Disconnect),
            0x20 => Ok(MessageType::ObjectExists),
            0x21 => Ok(MessageType::GetField),
            0x22 => Ok(MessageType::CallMethod),
            0x23 => Ok(MessageType::GetObjectPosition),
            0x40 => Ok(MessageType::ClickObject),
            0x41 => Ok(MessageType::PointerMove),
            0x42 => Ok(MessageType::PointerButton),
            0x43 => Ok(MessageType::PointerLocation),
            0x44 => Ok(MessageType::KeysDown),
            0x45 => Ok(MessageType::KeysUp),
            0x46 => Ok(MessageType::InputIdle),
            _ => Err(()),
        }
    }
}

// ── Hook mask ─────────────────────────────────────────────────────────────────

/// Bitmask of input-device classes the agent intercepts for simulated input.
///
/// While a class is hooked, real user input for that class is suppressed on
/// the remote side and only driver-simulated events reach the application.
///
/// Bit layout:
/// - Bit 0: Mouse
/// - Bit 1: Keyboard
/// - Bit 2: Gamepad
/// - Bit 3: Touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HookMask(pub u8);

impl HookMask {
    pub const MOUSE: HookMask = HookMask(1 << 0);
    pub const KEYBOARD: HookMask = HookMask(1 << 1);
    pub const GAMEPAD: HookMask = HookMask(1 << 2);
    pub const TOUCH: HookMask = HookMask(1 << 3);

    /// All device classes at once.
    pub const ALL: HookMask = HookMask(0x0F);

    /// No device classes.
    pub const NONE: HookMask = HookMask(0x00);

    /// Returns `true` if every class in `other` is present in `self`.
    pub fn contains(self, other: HookMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no device class is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the union of the two masks.
    pub fn with(self, other: HookMask) -> HookMask {
        HookMask(self.0 | other.0)
    }

    /// Returns `self` with every class in `other` removed.
    pub fn without(self, other: HookMask) -> HookMask {
        HookMask(self.0 & !other.0)
    }
}

impl std::ops::BitOr for HookMask {
    type Output = HookMask;

    fn bitor(self, rhs: HookMask) -> HookMask {
        self.with(rhs)
    }
}

// ── Mouse buttons and actions ─────────────────────────────────────────────────

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0x01,
    Right = 0x02,
    Middle = 0x03,
}

impl TryFrom<u8> for MouseButton {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MouseButton::Left),
            0x02 => Ok(MouseButton::Right),
            0x03 => Ok(MouseButton::Middle),
            _ => Err(()),
        }
    }
}

/// Pointer button transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ButtonAction {
    Press = 0x01,
    Release = 0x02,
}

impl TryFrom<u8> for ButtonAction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ButtonAction::Press),
            0x02 => Ok(ButtonAction::Release),
            _ => Err(()),
        }
    }
}

// ── Disconnect reasons ────────────────────────────────────────────────────────

/// Reason for a graceful disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DisconnectReason {
    DriverShutdown = 0x01,
    AgentShutdown = 0x02,
    ProtocolFault = 0x03,
}

impl TryFrom<u8> for DisconnectReason {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(DisconnectReason::DriverShutdown),
            0x02 => Ok(DisconnectReason::AgentShutdown),
            0x03 => Ok(DisconnectReason::ProtocolFault),
            _ => Err(()),
        }
    }
}

// ── Agent failure codes ───────────────────────────────────────────────────────

/// Error codes the agent reports inside a failed [`ReplyMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AgentErrorCode {
    SceneNotFound = 0x01,
    ObjectNotFound = 0x02,
    MethodNotFound = 0x03,
    FieldNotFound = 0x04,
    InvalidArgument = 0x05,
    HookFailure = 0x06,
    ClickNotDelivered = 0x07,
    HandshakeRejected = 0x08,
    InternalError = 0x09,
}

impl TryFrom<u8> for AgentErrorCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(AgentErrorCode::SceneNotFound),
            0x02 => Ok(AgentErrorCode::ObjectNotFound),
            0x03 => Ok(AgentErrorCode::MethodNotFound),
            0x04 => Ok(AgentErrorCode::FieldNotFound),
            0x05 => Ok(AgentErrorCode::InvalidArgument),
            0x06 => Ok(AgentErrorCode::HookFailure),
            0x07 => Ok(AgentErrorCode::ClickNotDelivered),
            0x08 => Ok(AgentErrorCode::HandshakeRejected),
            0x09 => Ok(AgentErrorCode::InternalError),
            _ => Err(()),
        }
    }
}

/// A failure reported by the agent for a specific command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailure {
    /// Machine-readable failure class.
    pub code: AgentErrorCode,
    /// Human-readable description, for logging only.
    pub message: String,
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// HELLO (0x01): first frame after the TCP connection is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloMessage {
    /// UUID v4 identifying this driver instance.
    pub client_id: Uuid,
    /// Protocol version the driver speaks.
    pub protocol_version: u8,
    /// Human-readable driver name shown in agent diagnostics.
    pub client_name: String,
}

/// HELLO_ACK (0x02): agent response completing the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloAckMessage {
    /// Whether the agent accepted the session.
    pub accepted: bool,
    /// Protocol version the agent speaks.
    pub agent_version: u8,
    /// Reason code when rejected (0x00 if accepted).
    pub reject_reason: u8,
}

/// REPLY (0x03): the agent's response to any command, matched by command id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyMessage {
    /// The resolved value, or the agent-side failure.
    pub outcome: Result<Value, AgentFailure>,
}

/// CALL_METHOD (0x22): invoke a method on the object the selector resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMethodMessage {
    /// Canonical selector text identifying the target object.
    pub selector: String,
    /// Method name on the resolved object.
    pub method: String,
    /// Typed arguments, marshaled in declaration order.
    pub args: Vec<Value>,
}

/// GET_OBJECT_POSITION (0x23): read an object's position, optionally converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetObjectPositionMessage {
    /// Canonical selector text identifying the target object.
    pub selector: String,
    /// Coordinate conversion the agent applies before replying.
    pub conversion: CoordinateConversion,
}

/// CLICK_OBJECT (0x40): resolve the selector and click its screen centroid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickObjectMessage {
    /// Button to press and release.
    pub button: MouseButton,
    /// Canonical selector text identifying the target object.
    pub selector: String,
}

/// POINTER_BUTTON (0x42): press or release a button at a screen position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerButtonMessage {
    pub button: MouseButton,
    pub action: ButtonAction,
    /// Screen-space X position at the time of the transition.
    pub x: f32,
    /// Screen-space Y position at the time of the transition.
    pub y: f32,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All valid codriver protocol messages, discriminated by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentMessage {
    Hello(HelloMessage),
    HelloAck(HelloAckMessage),
    Reply(ReplyMessage),
    EnableHooks { mask: HookMask },
    DisableHooks { mask: HookMask },
    LoadScene { scene: String },
    Disconnect { reason: DisconnectReason },
    ObjectExists { selector: String },
    GetField { selector: String },
    CallMethod(CallMethodMessage),
    GetObjectPosition(GetObjectPositionMessage),
    ClickObject(ClickObjectMessage),
    PointerMove { x: f32, y: f32 },
    PointerButton(PointerButtonMessage),
    PointerLocation,
    KeysDown { keys: Vec<KeyCode> },
    KeysUp { keys: Vec<KeyCode> },
    InputIdle,
}

impl AgentMessage {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            AgentMessage::Hello(_) => MessageType::Hello,
            AgentMessage::HelloAck(_) => MessageType::HelloAck,
            AgentMessage::Reply(_) => MessageType::Reply,
            AgentMessage::EnableHooks { .. } => MessageType::EnableHooks,
            AgentMessage::DisableHooks { .. } => MessageType::DisableHooks,
            AgentMessage::LoadScene { .. } => MessageType::LoadScene,
            AgentMessage::Disconnect { .. } => MessageType::Disconnect,
            AgentMessage::ObjectExists { .. } => MessageType::ObjectExists,
            AgentMessage::GetField { .. } => MessageType::GetField,
            AgentMessage::CallMethod(_) => MessageType::CallMethod,
            AgentMessage::GetObjectPosition(_) => MessageType::GetObjectPosition,
            AgentMessage::ClickObject(_) => MessageType::ClickObject,
            AgentMessage::PointerMove { .. } => MessageType::PointerMove,
            AgentMessage::PointerButton(_) => MessageType::PointerButton,
            AgentMessage::PointerLocation => MessageType::PointerLocation,
            AgentMessage::KeysDown { .. } => MessageType::KeysDown,
            AgentMessage::KeysUp { .. } => MessageType::KeysUp,
            AgentMessage::InputIdle => MessageType::InputIdle,
        }
    }

    /// Returns `true` for the two message kinds the agent sends to the driver.
    pub fn is_response(&self) -> bool {
        matches!(self, AgentMessage::HelloAck(_) | AgentMessage::Reply(_))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
