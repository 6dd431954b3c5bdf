//! Error taxonomy for the driver client.
//!
//! Two delivery paths, by design:
//!
//! - Usage errors a caller can fix before any network traffic — bad selector
//!   syntax, wrong session state — are returned synchronously as `Err` from
//!   the public method.
//! - Everything that depends on the agent or the transport surfaces through
//!   the resolved [`CommandOutcome`](crate::handle::CommandOutcome) of the
//!   operation handle, never as a side-channel error after the call returned.

use std::io;

use thiserror::Error;

use codriver_core::marshal::MarshalError;
use codriver_core::protocol::messages::AgentErrorCode;
use codriver_core::protocol::ProtocolError;
use codriver_core::selector::SelectorError;

use crate::session::SessionState;

/// All failures the driver client can report.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The TCP transport to the agent could not be established.
    #[error("failed to connect to agent at {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The TCP connect did not complete within the caller's timeout.
    #[error("connection to agent at {addr} timed out after {seconds}s")]
    ConnectTimeout { addr: String, seconds: f32 },

    /// The operation is not valid in the session's current state.
    #[error("operation requires a {required} session, but session is {actual}")]
    InvalidState {
        required: &'static str,
        actual: SessionState,
    },

    /// A selector failed syntactic validation before transmission.
    #[error("selector syntax error: {0}")]
    Selector(#[from] SelectorError),

    /// An inbound frame was malformed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A reply value did not match the caller's requested type.
    #[error("marshaling error: {0}")]
    Marshal(#[from] MarshalError),

    /// The agent reported a failure for this command.
    #[error("agent error ({code:?}): {message}")]
    Agent {
        code: AgentErrorCode,
        message: String,
    },

    /// The connection dropped or the write path failed mid-flight.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ClientError {
    /// Returns the agent error code if this is an agent-reported failure.
    pub fn agent_code(&self) -> Option<AgentErrorCode> {
        match self {
            ClientError::Agent { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_error_converts_via_from() {
        let err: ClientError = SelectorError::Empty.into();
        assert!(matches!(err, ClientError::Selector(SelectorError::Empty)));
    }

    #[test]
    fn test_marshal_error_converts_via_from() {
        let err: ClientError = MarshalError::UnknownTypeTag(0xEE).into();
        assert!(matches!(err, ClientError::Marshal(_)));
    }

    #[test]
    fn test_agent_code_accessor() {
        let err = ClientError::Agent {
            code: AgentErrorCode::SceneNotFound,
            message: "no such scene".to_string(),
        };
        assert_eq!(err.agent_code(), Some(AgentErrorCode::SceneNotFound));

        let other: ClientError = SelectorError::Empty.into();
        assert_eq!(other.agent_code(), None);
    }

    #[test]
    fn test_invalid_state_message_names_both_states() {
        let err = ClientError::InvalidState {
            required: "Connected",
            actual: SessionState::Disconnected,
        };
        let text = err.to_string();
        assert!(text.contains("Connected"));
        assert!(text.contains("Disconnected"));
    }
}
