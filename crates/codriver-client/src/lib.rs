//! # codriver-client
//!
//! The driver side of codriver: a client that remote-controls a live
//! game/UI process through the agent embedded in it.
//!
//! A driver session works like this:
//!
//! 1. [`CoClient::connect`] establishes the TCP transport and performs the
//!    Hello/HelloAck handshake.
//! 2. [`CoClient::enable_hooks`] asks the agent to intercept real input
//!    devices so simulated input can substitute for them.
//! 3. Object queries ([`CoClient::call_method`],
//!    [`CoClient::get_object_field_value`], [`CoClient::get_object_position`])
//!    address remote objects with selector expressions and marshal typed
//!    values across the process boundary.
//! 4. Input simulation ([`CoClient::click_object`], [`CoClient::mouse_drag`],
//!    [`CoClient::key_press`], …) composes primitive pointer/key commands
//!    into human-like sequences.
//! 5. Every call returns an [`OperationHandle`]; resolving it yields exactly
//!    one [`CommandOutcome`]: Success, Failure, TimedOut, or Cancelled.
//!
//! Only one command should be outstanding per session at a time — await each
//! handle before the next call. The receive loop runs independently to
//! demultiplex replies by command id, so closing the session (or losing the
//! transport) cancels every pending handle instead of leaving it unresolved.

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod handle;
pub mod input;
pub mod session;

pub use channel::ProtocolEvent;
pub use client::CoClient;
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use handle::{CommandOutcome, OperationHandle};
pub use session::SessionState;

// Re-export the core vocabulary callers need at every call site.
pub use codriver_core::domain::geometry::{Color, CoordinateConversion, CoordinateSpace, Position};
pub use codriver_core::keys::KeyCode;
pub use codriver_core::marshal::Value;
pub use codriver_core::protocol::messages::{AgentErrorCode, HookMask, MouseButton};
