//! # codriver-core
//!
//! Shared library for the codriver automation driver containing the agent
//! protocol codec, the selector language, value marshaling, spatial domain
//! types, and key code tables.
//!
//! This crate is pure: it has zero dependencies on sockets, OS APIs, or an
//! async runtime, so every piece of it is testable without a live agent.
//!
//! The crate defines:
//!
//! - **`protocol`** – How bytes travel over the network. Messages are encoded
//!   into a compact binary format (16-byte header + payload) and decoded back
//!   into typed Rust structs on the other end. The header carries a command
//!   id that correlates each Reply with the request that caused it.
//!
//! - **`selector`** – The path language that identifies remote objects
//!   (`//*[@name='Cylinder']/fn:component('Light')/@color`). Parsing and
//!   canonicalization happen driver-side; evaluation happens agent-side.
//!
//! - **`marshal`** – Typed values crossing the process boundary, with strict
//!   decoding into the caller's requested type.
//!
//! - **`domain`** – Pure spatial logic: tagged positions, colors, and
//!   pointer-path interpolation for drags and smooth moves.
//!
//! - **`keys`** – The canonical key representation sent on the wire:
//!   USB HID Usage IDs (page 0x07).

pub mod domain;
pub mod keys;
pub mod marshal;
pub mod protocol;
pub mod selector;

// Re-export the most-used types at the crate root so callers can write
// `codriver_core::Selector` instead of `codriver_core::selector::Selector`.
pub use domain::geometry::{
    pointer_path, Color, CoordinateConversion, CoordinateSpace, Position,
};
pub use keys::KeyCode;
pub use marshal::{FromValue, MarshalError, Value};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::command_id::CommandIdAllocator;
pub use protocol::messages::{
    AgentErrorCode, AgentFailure, AgentMessage, HookMask, MouseButton,
};
pub use selector::{Selector, SelectorError};
