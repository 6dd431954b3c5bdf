//! Session state machine.
//!
//! The session tracks the driver's logical connection to the agent:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──HelloAck──▶ Connected
//!       ▲                        │                      │  ▲
//!       │                     failure             enable│  │disable (last class)
//!       │                        │                 hooks▼  │
//!       └────── disconnect / ────┴──────────────── HooksEnabled
//!               transport loss
//! ```
//!
//! State lives behind an `Arc<Mutex<_>>` because two flows observe it: the
//! caller's submit path (state checks before a command is built) and the
//! receive loop (forcing `Disconnected` when the transport drops). Confirmed
//! transitions — not submissions — move the state: an `EnableHooks` command
//! only flips the mask once its reply resolves successfully.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use codriver_core::protocol::messages::HookMask;

use crate::error::ClientError;

/// The session's connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport; only `connect` is valid.
    Disconnected,
    /// TCP established (or in progress), handshake not yet confirmed.
    Connecting,
    /// Handshake confirmed; commands may be submitted.
    Connected,
    /// Connected, with at least one input-device class hooked.
    HooksEnabled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::HooksEnabled => "HooksEnabled",
        };
        f.write_str(name)
    }
}

/// A state transition applied when an operation handle resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateEffect {
    /// Handshake confirmed: Connecting → Connected.
    Connected,
    /// Teardown: any state → Disconnected, hook mask cleared.
    Disconnected,
    /// Add the given classes to the hook mask; state becomes HooksEnabled.
    HooksEnabled(HookMask),
    /// Remove the given classes; state falls back to Connected once the
    /// mask is empty.
    HooksDisabled(HookMask),
}

#[derive(Debug)]
struct SessionShared {
    state: SessionState,
    hooks: HookMask,
}

/// Cheaply cloneable handle to the shared session state.
#[derive(Debug, Clone)]
pub(crate) struct SessionHandle {
    inner: Arc<Mutex<SessionShared>>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionShared {
                state: SessionState::Disconnected,
                hooks: HookMask::NONE,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionShared> {
        // A poisoned lock only means another thread panicked mid-update;
        // the state itself is a pair of Copy fields and stays coherent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn state(&self) -> SessionState {
        self.lock().state
    }

    pub(crate) fn hooks(&self) -> HookMask {
        self.lock().hooks
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.lock().state = state;
    }

    /// Applies a confirmed transition.
    pub(crate) fn apply(&self, effect: StateEffect) {
        let mut shared = self.lock();
        match effect {
            StateEffect::Connected => {
                shared.state = SessionState::Connected;
            }
            StateEffect::Disconnected => {
                shared.state = SessionState::Disconnected;
                shared.hooks = HookMask::NONE;
            }
            StateEffect::HooksEnabled(mask) => {
                shared.hooks = shared.hooks.with(mask);
                shared.state = SessionState::HooksEnabled;
            }
            StateEffect::HooksDisabled(mask) => {
                shared.hooks = shared.hooks.without(mask);
                shared.state = if shared.hooks.is_empty() {
                    SessionState::Connected
                } else {
                    SessionState::HooksEnabled
                };
            }
        }
    }

    /// Transport loss: the receive loop forces the session down.
    pub(crate) fn force_disconnected(&self) {
        self.apply(StateEffect::Disconnected);
    }

    /// Checks that commands may be submitted right now.
    ///
    /// Fails synchronously with [`ClientError::InvalidState`] before any
    /// transport contact, per the propagation policy.
    pub(crate) fn require_command_ready(&self) -> Result<(), ClientError> {
        let state = self.state();
        match state {
            SessionState::Connected | SessionState::HooksEnabled => Ok(()),
            _ => Err(ClientError::InvalidState {
                required: "Connected",
                actual: state,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_disconnected_with_no_hooks() {
        let session = SessionHandle::new();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.hooks().is_empty());
    }

    #[test]
    fn test_connected_effect_moves_state_forward() {
        // Arrange
        let session = SessionHandle::new();
        session.set_state(SessionState::Connecting);

        // Act
        session.apply(StateEffect::Connected);

        // Assert
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_enabling_hooks_accumulates_mask() {
        let session = SessionHandle::new();
        session.set_state(SessionState::Connected);

        session.apply(StateEffect::HooksEnabled(HookMask::MOUSE));
        session.apply(StateEffect::HooksEnabled(HookMask::KEYBOARD));

        assert_eq!(session.state(), SessionState::HooksEnabled);
        assert!(session.hooks().contains(HookMask::MOUSE | HookMask::KEYBOARD));
    }

    #[test]
    fn test_disabling_last_hook_class_returns_to_connected() {
        // Arrange
        let session = SessionHandle::new();
        session.set_state(SessionState::Connected);
        session.apply(StateEffect::HooksEnabled(HookMask::ALL));

        // Act — clear a subset first, then the rest
        session.apply(StateEffect::HooksDisabled(HookMask::MOUSE));
        assert_eq!(session.state(), SessionState::HooksEnabled);

        session.apply(StateEffect::HooksDisabled(HookMask::ALL));

        // Assert
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.hooks().is_empty());
    }

    #[test]
    fn test_force_disconnected_clears_hooks() {
        let session = SessionHandle::new();
        session.set_state(SessionState::Connected);
        session.apply(StateEffect::HooksEnabled(HookMask::ALL));

        session.force_disconnected();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.hooks().is_empty());
    }

    #[test]
    fn test_require_command_ready_in_each_state() {
        let session = SessionHandle::new();

        // Disconnected and Connecting refuse commands synchronously.
        for state in [SessionState::Disconnected, SessionState::Connecting] {
            session.set_state(state);
            let err = session.require_command_ready().unwrap_err();
            assert!(matches!(err, ClientError::InvalidState { .. }));
        }

        // Connected and HooksEnabled accept them.
        for state in [SessionState::Connected, SessionState::HooksEnabled] {
            session.set_state(state);
            assert!(session.require_command_ready().is_ok());
        }
    }

    #[test]
    fn test_clones_share_state() {
        let session = SessionHandle::new();
        let observer = session.clone();

        session.set_state(SessionState::Connected);

        assert_eq!(observer.state(), SessionState::Connected);
    }
}
