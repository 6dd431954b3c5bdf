//! Cross-process value marshaling.
//!
//! Method arguments, field values, and command results cross the process
//! boundary as [`Value`]s: a tagged union of the primitive and structured
//! types the agent understands. On the wire each value is a type-tag byte
//! followed by a fixed per-type encoding; positions additionally carry their
//! coordinate-space tag.
//!
//! Decoding is strict: the caller declares the expected return type via
//! [`FromValue`], and a payload of any other type is a
//! [`MarshalError::TypeMismatch`], never a silent coercion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::geometry::{Color, CoordinateSpace, Position};

/// Errors raised while encoding, decoding, or extracting typed values.
#[derive(Debug, Error, PartialEq)]
pub enum MarshalError {
    /// The decoded value's type disagrees with the caller's requested type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The type-tag byte is not a recognized value.
    #[error("unknown value type tag: 0x{0:02X}")]
    UnknownTypeTag(u8),

    /// A position's coordinate-space byte is not a recognized value.
    #[error("unknown coordinate space tag: 0x{0:02X}")]
    UnknownSpaceTag(u8),

    /// The buffer ended before the value's encoding was complete.
    #[error("truncated value: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// A string payload was not valid UTF-8.
    #[error("invalid UTF-8 in string value: {0}")]
    InvalidUtf8(String),

    /// An argument literal carried a tag with an unparseable body,
    /// e.g. `"int:abc"`.
    #[error("invalid {tag} literal: {literal:?}")]
    InvalidLiteral { tag: &'static str, literal: String },

    /// An argument literal was neither tagged nor a recognizable
    /// numeric/boolean literal.
    #[error("untagged argument literal {0:?}; prefix it with string:/int:/float:/bool:")]
    UntaggedLiteral(String),
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// Type-tag byte for each [`Value`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    Unit = 0x00,
    Bool = 0x01,
    Int = 0x02,
    Float = 0x03,
    Str = 0x04,
    Position = 0x05,
    Color = 0x06,
}

impl TryFrom<u8> for TypeTag {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(TypeTag::Unit),
            0x01 => Ok(TypeTag::Bool),
            0x02 => Ok(TypeTag::Int),
            0x03 => Ok(TypeTag::Float),
            0x04 => Ok(TypeTag::Str),
            0x05 => Ok(TypeTag::Position),
            0x06 => Ok(TypeTag::Color),
            _ => Err(()),
        }
    }
}

/// A marshaled value: the union of types that cross the process boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    Position(Position),
    Color(Color),
}

impl Value {
    /// Returns the wire type tag for this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Unit => TypeTag::Unit,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::Position(_) => TypeTag::Position,
            Value::Color(_) => TypeTag::Color,
        }
    }

    /// Human-readable type name, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Position(_) => "position",
            Value::Color(_) => "color",
        }
    }

    /// Parses an explicitly-tagged argument literal.
    ///
    /// Supported tags: `string:`, `int:`, `float:`, `bool:`. Bare integer,
    /// float, and boolean literals are accepted untagged; any other bare
    /// text is an error, so a forgotten `string:` prefix fails loudly
    /// instead of sending the wrong type.
    pub fn from_literal(literal: &str) -> Result<Value, MarshalError> {
        if let Some(rest) = literal.strip_prefix("string:") {
            return Ok(Value::Str(rest.to_string()));
        }
        if let Some(rest) = literal.strip_prefix("int:") {
            return rest.parse::<i32>().map(Value::Int).map_err(|_| {
                MarshalError::InvalidLiteral {
                    tag: "int",
                    literal: rest.to_string(),
                }
            });
        }
        if let Some(rest) = literal.strip_prefix("float:") {
            return rest.parse::<f32>().map(Value::Float).map_err(|_| {
                MarshalError::InvalidLiteral {
                    tag: "float",
                    literal: rest.to_string(),
                }
            });
        }
        if let Some(rest) = literal.strip_prefix("bool:") {
            return match rest {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(MarshalError::InvalidLiteral {
                    tag: "bool",
                    literal: rest.to_string(),
                }),
            };
        }
        match literal {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }
        if let Ok(n) = literal.parse::<i32>() {
            return Ok(Value::Int(n));
        }
        if let Ok(f) = literal.parse::<f32>() {
            return Ok(Value::Float(f));
        }
        Err(MarshalError::UntaggedLiteral(literal.to_string()))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Position> for Value {
    fn from(v: Position) -> Self {
        Value::Position(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

// ── Typed extraction ──────────────────────────────────────────────────────────

/// Conversion from a marshaled [`Value`] into the caller's requested type.
///
/// Implementations are strict: only the exactly matching variant converts.
pub trait FromValue: Sized {
    /// Name used in [`MarshalError::TypeMismatch`] diagnostics.
    fn expected() -> &'static str;

    fn from_value(value: Value) -> Result<Self, MarshalError>;
}

impl FromValue for () {
    fn expected() -> &'static str {
        "unit"
    }

    fn from_value(value: Value) -> Result<Self, MarshalError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(MarshalError::TypeMismatch {
                expected: Self::expected(),
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for bool {
    fn expected() -> &'static str {
        "bool"
    }

    fn from_value(value: Value) -> Result<Self, MarshalError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(MarshalError::TypeMismatch {
                expected: Self::expected(),
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for i32 {
    fn expected() -> &'static str {
        "int"
    }

    fn from_value(value: Value) -> Result<Self, MarshalError> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(MarshalError::TypeMismatch {
                expected: Self::expected(),
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for f32 {
    fn expected() -> &'static str {
        "float"
    }

    fn from_value(value: Value) -> Result<Self, MarshalError> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(MarshalError::TypeMismatch {
                expected: Self::expected(),
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for String {
    fn expected() -> &'static str {
        "string"
    }

    fn from_value(value: Value) -> Result<Self, MarshalError> {
        match value {
            Value::Str(v) => Ok(v),
            other => Err(MarshalError::TypeMismatch {
                expected: Self::expected(),
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Position {
    fn expected() -> &'static str {
        "position"
    }

    fn from_value(value: Value) -> Result<Self, MarshalError> {
        match value {
            Value::Position(v) => Ok(v),
            other => Err(MarshalError::TypeMismatch {
                expected: Self::expected(),
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Color {
    fn expected() -> &'static str {
        "color"
    }

    fn from_value(value: Value) -> Result<Self, MarshalError> {
        match value {
            Value::Color(v) => Ok(v),
            other => Err(MarshalError::TypeMismatch {
                expected: Self::expected(),
                actual: other.type_name(),
            }),
        }
    }
}

/// Pass-through impl for callers that inspect the value dynamically.
impl FromValue for Value {
    fn expected() -> &'static str {
        "value"
    }

    fn from_value(value: Value) -> Result<Self, MarshalError> {
        Ok(value)
    }
}

// ── Wire encoding ─────────────────────────────────────────────────────────────

/// Appends the wire encoding of `value` to `buf`.
pub fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    buf.push(value.type_tag() as u8);
    match value {
        Value::Unit => {}
        Value::Bool(v) => buf.push(u8::from(*v)),
        Value::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Str(v) => {
            let bytes = v.as_bytes();
            let len = bytes.len().min(u16::MAX as usize) as u16;
            buf.extend_from_slice(&len.to_be_bytes());
            buf.extend_from_slice(&bytes[..len as usize]);
        }
        Value::Position(p) => {
            buf.extend_from_slice(&p.x.to_be_bytes());
            buf.extend_from_slice(&p.y.to_be_bytes());
            buf.extend_from_slice(&p.z.to_be_bytes());
            buf.push(p.space as u8);
        }
        Value::Color(c) => {
            buf.extend_from_slice(&c.r.to_be_bytes());
            buf.extend_from_slice(&c.g.to_be_bytes());
            buf.extend_from_slice(&c.b.to_be_bytes());
            buf.extend_from_slice(&c.a.to_be_bytes());
        }
    }
}

/// Decodes one value starting at `offset`.
///
/// Returns the value and the offset of the byte after it, so callers can
/// advance their read cursor through argument lists.
pub fn decode_value(p: &[u8], offset: usize) -> Result<(Value, usize), MarshalError> {
    let tag_byte = *p.get(offset).ok_or(MarshalError::Truncated {
        needed: offset + 1,
        available: p.len(),
    })?;
    let tag = TypeTag::try_from(tag_byte).map_err(|_| MarshalError::UnknownTypeTag(tag_byte))?;
    let body = offset + 1;
    match tag {
        TypeTag::Unit => Ok((Value::Unit, body)),
        TypeTag::Bool => {
            require(p, body + 1)?;
            Ok((Value::Bool(p[body] != 0), body + 1))
        }
        TypeTag::Int => {
            require(p, body + 4)?;
            let v = i32::from_be_bytes([p[body], p[body + 1], p[body + 2], p[body + 3]]);
            Ok((Value::Int(v), body + 4))
        }
        TypeTag::Float => {
            require(p, body + 4)?;
            Ok((Value::Float(read_f32(p, body)), body + 4))
        }
        TypeTag::Str => {
            require(p, body + 2)?;
            let len = u16::from_be_bytes([p[body], p[body + 1]]) as usize;
            let start = body + 2;
            require(p, start + len)?;
            let s = std::str::from_utf8(&p[start..start + len])
                .map_err(|e| MarshalError::InvalidUtf8(e.to_string()))?
                .to_string();
            Ok((Value::Str(s), start + len))
        }
        TypeTag::Position => {
            require(p, body + 13)?;
            let x = read_f32(p, body);
            let y = read_f32(p, body + 4);
            let z = read_f32(p, body + 8);
            let space = CoordinateSpace::try_from(p[body + 12])
                .map_err(|_| MarshalError::UnknownSpaceTag(p[body + 12]))?;
            Ok((Value::Position(Position { x, y, z, space }), body + 13))
        }
        TypeTag::Color => {
            require(p, body + 16)?;
            let c = Color {
                r: read_f32(p, body),
                g: read_f32(p, body + 4),
                b: read_f32(p, body + 8),
                a: read_f32(p, body + 12),
            };
            Ok((Value::Color(c), body + 16))
        }
    }
}

fn require(p: &[u8], needed: usize) -> Result<(), MarshalError> {
    if p.len() < needed {
        Err(MarshalError::Truncated {
            needed,
            available: p.len(),
        })
    } else {
        Ok(())
    }
}

fn read_f32(p: &[u8], offset: usize) -> f32 {
    f32::from_be_bytes([p[offset], p[offset + 1], p[offset + 2], p[offset + 3]])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
