//! Binary codec for encoding and decoding codriver protocol messages.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][reserved:2][payload_len:4][command_id:8][payload:N]
//! ```
//! Total header size: 16 bytes. All multi-byte integers are big-endian.
//! The command id in the header correlates a Reply/HelloAck with the request
//! that caused it; replies may arrive in any order.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::geometry::CoordinateConversion;
use crate::keys::KeyCode;
use crate::marshal::{decode_value, encode_value, MarshalError, Value};
use crate::protocol::messages::{
    AgentErrorCode, AgentFailure, AgentMessage, ButtonAction, CallMethodMessage,
    ClickObjectMessage, DisconnectReason, GetObjectPositionMessage, HelloAckMessage, HelloMessage,
    HookMask, MessageType, MouseButton, PointerButtonMessage, ReplyMessage, HEADER_SIZE,
    PROTOCOL_VERSION,
};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed (field value out of range, UTF-8
    /// error, bad value tag, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The encoded payload length field does not match the data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },
}

impl From<MarshalError> for ProtocolError {
    fn from(e: MarshalError) -> Self {
        ProtocolError::MalformedPayload(e.to_string())
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`AgentMessage`] into a byte vector including the 16-byte header.
///
/// `command_id` is the correlation key — pass a fresh value from a
/// [`crate::protocol::CommandIdAllocator`] for requests, or echo the
/// request's id when encoding a reply.
///
/// # Errors
///
/// Returns [`ProtocolError`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use codriver_core::protocol::{decode_message, encode_message};
/// use codriver_core::protocol::messages::AgentMessage;
///
/// let msg = AgentMessage::PointerLocation;
/// let bytes = encode_message(&msg, 42).unwrap();
/// let (decoded, command_id, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(command_id, 42);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &AgentMessage, command_id: u64) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg)?;
    let payload_len = payload.len() as u32;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());

    // Header: version (1) + msg_type (1) + reserved (2) + payload_len (4) +
    //         command_id (8) = 16 bytes
    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&command_id.to_be_bytes());

    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one [`AgentMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message, its command id, and the total number of
/// bytes consumed (header + payload) so the caller can advance their read
/// cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn decode_message(bytes: &[u8]) -> Result<(AgentMessage, u64, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let msg_type_byte = bytes[1];
    let msg_type = MessageType::try_from(msg_type_byte)
        .map_err(|_| ProtocolError::UnknownMessageType(msg_type_byte))?;

    // bytes[2..4] are reserved – ignored on decode

    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let command_id = u64::from_be_bytes(bytes[8..16].try_into().unwrap());

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let payload = &bytes[HEADER_SIZE..total_needed];
    let msg = decode_payload(msg_type, payload)?;
    Ok((msg, command_id, total_needed))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &AgentMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match msg {
        AgentMessage::Hello(m) => encode_hello(&mut buf, m),
        AgentMessage::HelloAck(m) => encode_hello_ack(&mut buf, m),
        AgentMessage::Reply(m) => encode_reply(&mut buf, m),
        AgentMessage::EnableHooks { mask } | AgentMessage::DisableHooks { mask } => {
            buf.push(mask.0);
        }
        AgentMessage::LoadScene { scene } => write_length_prefixed_string(&mut buf, scene),
        AgentMessage::Disconnect { reason } => buf.push(*reason as u8),
        AgentMessage::ObjectExists { selector } | AgentMessage::GetField { selector } => {
            write_length_prefixed_string(&mut buf, selector);
        }
        AgentMessage::CallMethod(m) => encode_call_method(&mut buf, m),
        AgentMessage::GetObjectPosition(m) => {
            write_length_prefixed_string(&mut buf, &m.selector);
            buf.push(m.conversion as u8);
        }
        AgentMessage::ClickObject(m) => {
            buf.push(m.button as u8);
            write_length_prefixed_string(&mut buf, &m.selector);
        }
        AgentMessage::PointerMove { x, y } => {
            buf.extend_from_slice(&x.to_be_bytes());
            buf.extend_from_slice(&y.to_be_bytes());
        }
        AgentMessage::PointerButton(m) => {
            buf.push(m.button as u8);
            buf.push(m.action as u8);
            buf.extend_from_slice(&m.x.to_be_bytes());
            buf.extend_from_slice(&m.y.to_be_bytes());
        }
        AgentMessage::PointerLocation | AgentMessage::InputIdle => {} // empty payload
        AgentMessage::KeysDown { keys } | AgentMessage::KeysUp { keys } => {
            encode_keys(&mut buf, keys);
        }
    }
    Ok(buf)
}

fn encode_hello(buf: &mut Vec<u8>, m: &HelloMessage) {
    buf.extend_from_slice(m.client_id.as_bytes());
    buf.push(m.protocol_version);
    write_length_prefixed_string(buf, &m.client_name);
}

fn encode_hello_ack(buf: &mut Vec<u8>, m: &HelloAckMessage) {
    buf.push(u8::from(m.accepted));
    buf.push(m.agent_version);
    buf.push(m.reject_reason);
}

fn encode_reply(buf: &mut Vec<u8>, m: &ReplyMessage) {
    match &m.outcome {
        Ok(value) => {
            buf.push(0x01);
            encode_value(buf, value);
        }
        Err(failure) => {
            buf.push(0x00);
            buf.push(failure.code as u8);
            write_length_prefixed_string(buf, &failure.message);
        }
    }
}

fn encode_call_method(buf: &mut Vec<u8>, m: &CallMethodMessage) {
    write_length_prefixed_string(buf, &m.selector);
    write_length_prefixed_string(buf, &m.method);
    buf.extend_from_slice(&(m.args.len() as u16).to_be_bytes());
    for arg in &m.args {
        encode_value(buf, arg);
    }
}

fn encode_keys(buf: &mut Vec<u8>, keys: &[KeyCode]) {
    buf.extend_from_slice(&(keys.len() as u16).to_be_bytes());
    for key in keys {
        buf.extend_from_slice(&key.as_u16().to_be_bytes());
    }
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(msg_type: MessageType, payload: &[u8]) -> Result<AgentMessage, ProtocolError> {
    match msg_type {
        MessageType::Hello => decode_hello(payload).map(AgentMessage::Hello),
        MessageType::HelloAck => decode_hello_ack(payload).map(AgentMessage::HelloAck),
        MessageType::Reply => decode_reply(payload).map(AgentMessage::Reply),
        MessageType::EnableHooks => {
            require_len(payload, 1, "EnableHooks")?;
            Ok(AgentMessage::EnableHooks {
                mask: HookMask(payload[0]),
            })
        }
        MessageType::DisableHooks => {
            require_len(payload, 1, "DisableHooks")?;
            Ok(AgentMessage::DisableHooks {
                mask: HookMask(payload[0]),
            })
        }
        MessageType::LoadScene => {
            let (scene, _) = read_length_prefixed_string(payload, 0)?;
            Ok(AgentMessage::LoadScene { scene })
        }
        MessageType::Disconnect => {
            require_len(payload, 1, "Disconnect")?;
            let reason = DisconnectReason::try_from(payload[0]).map_err(|_| {
                ProtocolError::MalformedPayload(format!(
                    "unknown disconnect reason: {}",
                    payload[0]
                ))
            })?;
            Ok(AgentMessage::Disconnect { reason })
        }
        MessageType::ObjectExists => {
            let (selector, _) = read_length_prefixed_string(payload, 0)?;
            Ok(AgentMessage::ObjectExists { selector })
        }
        MessageType::GetField => {
            let (selector, _) = read_length_prefixed_string(payload, 0)?;
            Ok(AgentMessage::GetField { selector })
        }
        MessageType::CallMethod => decode_call_method(payload).map(AgentMessage::CallMethod),
        MessageType::GetObjectPosition => {
            let (selector, off) = read_length_prefixed_string(payload, 0)?;
            require_len(payload, off + 1, "GetObjectPosition.conversion")?;
            let conversion = CoordinateConversion::try_from(payload[off]).map_err(|_| {
                ProtocolError::MalformedPayload(format!(
                    "unknown coordinate conversion: {}",
                    payload[off]
                ))
            })?;
            Ok(AgentMessage::GetObjectPosition(GetObjectPositionMessage {
                selector,
                conversion,
            }))
        }
        MessageType::ClickObject => {
            require_len(payload, 1, "ClickObject")?;
            let button = MouseButton::try_from(payload[0]).map_err(|_| {
                ProtocolError::MalformedPayload(format!("unknown mouse button: {}", payload[0]))
            })?;
            let (selector, _) = read_length_prefixed_string(payload, 1)?;
            Ok(AgentMessage::ClickObject(ClickObjectMessage {
                button,
                selector,
            }))
        }
        MessageType::PointerMove => {
            require_len(payload, 8, "PointerMove")?;
            Ok(AgentMessage::PointerMove {
                x: read_f32(payload, 0),
                y: read_f32(payload, 4),
            })
        }
        MessageType::PointerButton => {
            require_len(payload, 10, "PointerButton")?;
            let button = MouseButton::try_from(payload[0]).map_err(|_| {
                ProtocolError::MalformedPayload(format!("unknown mouse button: {}", payload[0]))
            })?;
            let action = ButtonAction::try_from(payload[1]).map_err(|_| {
                ProtocolError::MalformedPayload(format!("unknown button action: {}", payload[1]))
            })?;
            Ok(AgentMessage::PointerButton(PointerButtonMessage {
                button,
                action,
                x: read_f32(payload, 2),
                y: read_f32(payload, 6),
            }))
        }
        MessageType::PointerLocation => Ok(AgentMessage::PointerLocation),
        MessageType::KeysDown => decode_keys(payload).map(|keys| AgentMessage::KeysDown { keys }),
        MessageType::KeysUp => decode_keys(payload).map(|keys| AgentMessage::KeysUp { keys }),
        MessageType::InputIdle => Ok(AgentMessage::InputIdle),
    }
}

fn decode_hello(p: &[u8]) -> Result<HelloMessage, ProtocolError> {
    // 16 (uuid) + 1 (proto ver) + 2 (name_len) = 19 minimum
    require_len(p, 19, "Hello")?;
    let client_id = read_uuid(p, 0)?;
    let protocol_version = p[16];
    let (client_name, _) = read_length_prefixed_string(p, 17)?;
    Ok(HelloMessage {
        client_id,
        protocol_version,
        client_name,
    })
}

fn decode_hello_ack(p: &[u8]) -> Result<HelloAckMessage, ProtocolError> {
    require_len(p, 3, "HelloAck")?;
    Ok(HelloAckMessage {
        accepted: p[0] != 0,
        agent_version: p[1],
        reject_reason: p[2],
    })
}

fn decode_reply(p: &[u8]) -> Result<ReplyMessage, ProtocolError> {
    require_len(p, 1, "Reply")?;
    let outcome = if p[0] != 0 {
        let (value, _) = decode_value(p, 1)?;
        Ok(value)
    } else {
        require_len(p, 2, "Reply.error_code")?;
        let code = AgentErrorCode::try_from(p[1]).map_err(|_| {
            ProtocolError::MalformedPayload(format!("unknown agent error code: {}", p[1]))
        })?;
        let (message, _) = read_length_prefixed_string(p, 2)?;
        Err(AgentFailure { code, message })
    };
    Ok(ReplyMessage { outcome })
}

fn decode_call_method(p: &[u8]) -> Result<CallMethodMessage, ProtocolError> {
    let (selector, off) = read_length_prefixed_string(p, 0)?;
    let (method, off) = read_length_prefixed_string(p, off)?;
    require_len(p, off + 2, "CallMethod.arg_count")?;
    let count = u16::from_be_bytes([p[off], p[off + 1]]) as usize;
    let mut args = Vec::with_capacity(count);
    let mut cursor = off + 2;
    for _ in 0..count {
        let (value, next) = decode_value(p, cursor)?;
        args.push(value);
        cursor = next;
    }
    Ok(CallMethodMessage {
        selector,
        method,
        args,
    })
}

fn decode_keys(p: &[u8]) -> Result<Vec<KeyCode>, ProtocolError> {
    require_len(p, 2, "Keys")?;
    let count = u16::from_be_bytes([p[0], p[1]]) as usize;
    require_len(p, 2 + count * 2, "Keys list")?;
    let mut keys = Vec::with_capacity(count);
    for i in 0..count {
        let off = 2 + i * 2;
        keys.push(KeyCode::from_u16(u16::from_be_bytes([p[off], p[off + 1]])));
    }
    Ok(keys)
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn read_uuid(buf: &[u8], offset: usize) -> Result<Uuid, ProtocolError> {
    if buf.len() < offset + 16 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 16 bytes for UUID at offset {offset}, got {}",
            buf.len().saturating_sub(offset)
        )));
    }
    Ok(Uuid::from_bytes(
        buf[offset..offset + 16].try_into().unwrap(),
    ))
}

/// Writes a 2-byte length prefix followed by the UTF-8 string bytes.
fn write_length_prefixed_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let len = bytes.len().min(u16::MAX as usize) as u16;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&bytes[..len as usize]);
}

/// Reads a 2-byte length prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after it.
fn read_length_prefixed_string(
    buf: &[u8],
    offset: usize,
) -> Result<(String, usize), ProtocolError> {
    if buf.len() < offset + 2 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 2 bytes for string length at offset {offset}"
        )));
    }
    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as usize;
    let start = offset + 2;
    if buf.len() < start + len {
        return Err(ProtocolError::MalformedPayload(format!(
            "string of length {len} at offset {start} exceeds buffer"
        )));
    }
    let s = std::str::from_utf8(&buf[start..start + len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, start + len))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
