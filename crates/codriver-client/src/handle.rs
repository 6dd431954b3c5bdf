//! Asynchronous operation handles.
//!
//! Every public driver call returns an [`OperationHandle`] wrapping the
//! command's eventual outcome. The handle is consumed by [`resolve`], which
//! guarantees the exactly-once property: one of Success, Failure, TimedOut,
//! or Cancelled is observed, never zero and never two.
//!
//! The caller declares the expected result type as the handle's type
//! parameter; a reply of any other type resolves as a
//! [`ClientError::Marshal`] failure rather than coercing.
//!
//! [`resolve`]: OperationHandle::resolve

use std::marker::PhantomData;

use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use codriver_core::marshal::{FromValue, Value};
use codriver_core::protocol::messages::AgentFailure;

use crate::channel::PendingCommands;
use crate::error::ClientError;
use crate::session::{SessionHandle, StateEffect};

/// What the receive loop (or a compound-input task) reports for a command.
#[derive(Debug)]
pub(crate) enum RawOutcome {
    /// The agent replied: a value or an agent-side failure.
    Reply(Result<Value, AgentFailure>),
    /// A driver-side fault (malformed frame, failed sub-step, …).
    Fault(ClientError),
    /// A compound task exhausted its own deadline.
    TimedOut,
    /// The session was torn down while the command was pending.
    Cancelled,
}

/// The resolved result of a command. Exactly one variant is ever observed
/// per handle.
#[derive(Debug)]
pub enum CommandOutcome<T> {
    /// The agent confirmed the command; the typed result is attached.
    Success(T),
    /// The command failed — agent-reported, transport, or type mismatch.
    Failure(ClientError),
    /// No reply arrived before the command's deadline. A reply arriving
    /// later is discarded; it can never overwrite this outcome.
    TimedOut,
    /// The session was closed while the command was in flight.
    Cancelled,
}

impl<T> CommandOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, CommandOutcome::TimedOut)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CommandOutcome::Cancelled)
    }

    /// Extracts the success value, if any.
    pub fn success(self) -> Option<T> {
        match self {
            CommandOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Extracts the failure, if any.
    pub fn failure(self) -> Option<ClientError> {
        match self {
            CommandOutcome::Failure(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum HandleInner {
    /// Outcome known at construction time (local waits, pre-flight failures).
    Ready(CommandOutcome<Value>),
    /// A command registered with the channel's pending registry.
    Pending {
        rx: oneshot::Receiver<RawOutcome>,
        deadline: Instant,
        command_id: u64,
        pending: PendingCommands,
    },
    /// A compound-input task reporting through its own oneshot.
    Task {
        rx: oneshot::Receiver<RawOutcome>,
        deadline: Instant,
    },
}

/// A cancellable, timeout-bounded asynchronous result.
///
/// One handle per command, 1:1; resolving consumes the handle.
#[derive(Debug)]
pub struct OperationHandle<T> {
    inner: HandleInner,
    session: Option<SessionHandle>,
    on_success: Option<StateEffect>,
    on_failure: Option<StateEffect>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromValue> OperationHandle<T> {
    /// A handle whose outcome is already known.
    pub(crate) fn ready(outcome: CommandOutcome<Value>) -> Self {
        Self {
            inner: HandleInner::Ready(outcome),
            session: None,
            on_success: None,
            on_failure: None,
            _marker: PhantomData,
        }
    }

    /// A handle for a command registered in the pending registry.
    ///
    /// If the deadline passes first, the entry is removed so a late reply
    /// for this id is discarded by the receive loop.
    pub(crate) fn pending(
        rx: oneshot::Receiver<RawOutcome>,
        deadline: Instant,
        command_id: u64,
        pending: PendingCommands,
    ) -> Self {
        Self {
            inner: HandleInner::Pending {
                rx,
                deadline,
                command_id,
                pending,
            },
            session: None,
            on_success: None,
            on_failure: None,
            _marker: PhantomData,
        }
    }

    /// A handle backed by a spawned compound-input task.
    pub(crate) fn task(rx: oneshot::Receiver<RawOutcome>, deadline: Instant) -> Self {
        Self {
            inner: HandleInner::Task { rx, deadline },
            session: None,
            on_success: None,
            on_failure: None,
            _marker: PhantomData,
        }
    }

    /// Attaches session-state transitions applied at resolution time.
    pub(crate) fn with_session_effects(
        mut self,
        session: SessionHandle,
        on_success: Option<StateEffect>,
        on_failure: Option<StateEffect>,
    ) -> Self {
        self.session = Some(session);
        self.on_success = on_success;
        self.on_failure = on_failure;
        self
    }

    /// The wire command id, if this handle corresponds to a single command.
    pub fn command_id(&self) -> Option<u64> {
        match &self.inner {
            HandleInner::Pending { command_id, .. } => Some(*command_id),
            _ => None,
        }
    }

    /// Awaits the outcome, consuming the handle.
    ///
    /// Resolution is exactly-once by construction: the underlying oneshot
    /// can deliver at most one message, and a timeout removes the pending
    /// entry before reporting, so a late reply cannot race the outcome.
    pub async fn resolve(self) -> CommandOutcome<T> {
        let raw = match self.inner {
            HandleInner::Ready(outcome) => outcome,
            HandleInner::Pending {
                rx,
                deadline,
                command_id,
                pending,
            } => match timeout_at(deadline, rx).await {
                Err(_elapsed) => {
                    // Deregister first so the receive loop discards any
                    // reply that arrives after this point.
                    pending.discard(command_id);
                    debug!(command_id, "command deadline elapsed");
                    CommandOutcome::TimedOut
                }
                Ok(received) => Self::from_raw(received),
            },
            HandleInner::Task { rx, deadline } => match timeout_at(deadline, rx).await {
                Err(_elapsed) => CommandOutcome::TimedOut,
                Ok(received) => Self::from_raw(received),
            },
        };

        let outcome = match raw {
            CommandOutcome::Success(value) => match T::from_value(value) {
                Ok(typed) => CommandOutcome::Success(typed),
                Err(mismatch) => CommandOutcome::Failure(mismatch.into()),
            },
            CommandOutcome::Failure(err) => CommandOutcome::Failure(err),
            CommandOutcome::TimedOut => CommandOutcome::TimedOut,
            CommandOutcome::Cancelled => CommandOutcome::Cancelled,
        };

        if let Some(session) = &self.session {
            let effect = match &outcome {
                CommandOutcome::Success(_) => self.on_success,
                _ => self.on_failure,
            };
            if let Some(effect) = effect {
                session.apply(effect);
            }
        }

        outcome
    }

    fn from_raw(received: Result<RawOutcome, oneshot::error::RecvError>) -> CommandOutcome<Value> {
        match received {
            // Sender dropped without a message: the channel was torn down.
            Err(_closed) => CommandOutcome::Cancelled,
            Ok(RawOutcome::Reply(Ok(value))) => CommandOutcome::Success(value),
            Ok(RawOutcome::Reply(Err(failure))) => CommandOutcome::Failure(ClientError::Agent {
                code: failure.code,
                message: failure.message,
            }),
            Ok(RawOutcome::Fault(err)) => CommandOutcome::Failure(err),
            Ok(RawOutcome::TimedOut) => CommandOutcome::TimedOut,
            Ok(RawOutcome::Cancelled) => CommandOutcome::Cancelled,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
