//! The driver client: public operation surface over the command channel.
//!
//! One [`CoClient`] per automated application instance, owned by whatever
//! orchestrates the run and passed explicitly — never a global. Every
//! operation returns an [`OperationHandle`] the caller awaits; only one
//! command should be outstanding at a time (awaiting each handle before the
//! next call is the intended usage; the channel tolerates more so that
//! teardown can cancel several pending commands at once).
//!
//! Error delivery follows the propagation policy: selector-syntax and
//! session-state problems return `Err` synchronously, before any transport
//! contact; everything else arrives through the resolved handle.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use codriver_core::domain::geometry::{CoordinateConversion, Position};
use codriver_core::marshal::{FromValue, Value};
use codriver_core::protocol::messages::{
    AgentMessage, CallMethodMessage, GetObjectPositionMessage, HelloMessage, HookMask,
    PROTOCOL_VERSION,
};
use codriver_core::selector::{Selector, SelectorError};

use crate::channel::{CommandChannel, ProtocolEvent};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::handle::{CommandOutcome, OperationHandle, RawOutcome};
use crate::input;
use crate::session::{SessionHandle, SessionState, StateEffect};

/// A client session driving a live application through its embedded agent.
pub struct CoClient {
    pub(crate) config: ClientConfig,
    client_id: Uuid,
    pub(crate) session: SessionHandle,
    pub(crate) channel: Option<CommandChannel>,
    events: Option<mpsc::UnboundedReceiver<ProtocolEvent>>,
}

impl CoClient {
    /// Creates a disconnected client with default configuration.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a disconnected client with the given configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            client_id: Uuid::new_v4(),
            session: SessionHandle::new(),
            channel: None,
            events: None,
        }
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The input-device classes currently hooked on the agent side.
    pub fn hooks(&self) -> HookMask {
        self.session.hooks()
    }

    /// This driver instance's id, as sent in the handshake.
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Takes the diagnostic event receiver. Available once per connection;
    /// events accumulate unread until taken or the session closes.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ProtocolEvent>> {
        self.events.take()
    }

    // ── Session lifecycle ─────────────────────────────────────────────────────

    /// Connects to the agent at `host:port` and performs the handshake.
    ///
    /// The returned handle resolves `Success(true)` once the agent accepts
    /// the session, `Failure` if the transport cannot be established or the
    /// agent rejects, and `TimedOut` if no handshake reply arrives in time.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidState`] synchronously when the session is not
    /// `Disconnected` — connecting twice is a usage error, not a no-op.
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout_secs: f32,
    ) -> Result<OperationHandle<bool>, ClientError> {
        let state = self.session.state();
        if state != SessionState::Disconnected {
            return Err(ClientError::InvalidState {
                required: "Disconnected",
                actual: state,
            });
        }

        let timeout = Duration::from_secs_f32(timeout_secs.max(0.0));
        let addr = format!("{host}:{port}");
        info!("connecting to agent at {addr}");
        self.session.set_state(SessionState::Connecting);

        let (channel, events) =
            match CommandChannel::open(addr, timeout, self.session.clone()).await {
                Ok(pair) => pair,
                Err(e) => {
                    // Transport establishment failures surface through the
                    // handle, not as a synchronous error.
                    warn!("connection failed: {e}");
                    self.session.set_state(SessionState::Disconnected);
                    return Ok(OperationHandle::ready(CommandOutcome::Failure(e)));
                }
            };

        let hello = AgentMessage::Hello(HelloMessage {
            client_id: self.client_id,
            protocol_version: PROTOCOL_VERSION,
            client_name: self.config.client_name.clone(),
        });
        let handle = match channel.submit::<bool>(&hello, timeout).await {
            Ok(handle) => handle,
            Err(e) => {
                self.session.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        self.channel = Some(channel);
        self.events = Some(events);

        Ok(handle.with_session_effects(
            self.session.clone(),
            Some(StateEffect::Connected),
            Some(StateEffect::Disconnected),
        ))
    }

    /// Closes the session: sends a best-effort goodbye, releases the
    /// transport, and resolves every pending handle as `Cancelled`.
    pub async fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            info!("disconnecting from agent");
            channel.shutdown().await;
        }
        self.events = None;
        self.session.force_disconnected();
    }

    /// Asks the agent to intercept the given input-device classes.
    ///
    /// Requires `Connected` or `HooksEnabled`. The hook mask (and the
    /// `HooksEnabled` state) updates when the handle resolves successfully,
    /// not at submission.
    pub async fn enable_hooks(
        &self,
        mask: HookMask,
    ) -> Result<OperationHandle<bool>, ClientError> {
        let channel = self.command_channel()?;
        let handle = channel
            .submit::<bool>(
                &AgentMessage::EnableHooks { mask },
                self.config.command_timeout(),
            )
            .await?;
        Ok(handle.with_session_effects(
            self.session.clone(),
            Some(StateEffect::HooksEnabled(mask)),
            None,
        ))
    }

    /// Releases previously hooked input-device classes. Clearing the last
    /// class returns the session to `Connected`.
    pub async fn disable_hooks(
        &self,
        mask: HookMask,
    ) -> Result<OperationHandle<bool>, ClientError> {
        let channel = self.command_channel()?;
        let handle = channel
            .submit::<bool>(
                &AgentMessage::DisableHooks { mask },
                self.config.command_timeout(),
            )
            .await?;
        Ok(handle.with_session_effects(
            self.session.clone(),
            Some(StateEffect::HooksDisabled(mask)),
            None,
        ))
    }

    /// Requests the remote process switch its active scene.
    ///
    /// An unknown scene resolves as `Failure` with the
    /// [`SceneNotFound`](codriver_core::AgentErrorCode::SceneNotFound) code.
    pub async fn load_scene(&self, scene: &str) -> Result<OperationHandle<bool>, ClientError> {
        let channel = self.command_channel()?;
        channel
            .submit(
                &AgentMessage::LoadScene {
                    scene: scene.to_string(),
                },
                self.config.command_timeout(),
            )
            .await
    }

    // ── Local operations ──────────────────────────────────────────────────────

    /// A purely local timed wait, resolving `Success(())` after `seconds`.
    ///
    /// No network round trip; exists so scripted sequences can pace
    /// themselves through the same handle type as every other operation.
    pub async fn wait(&self, seconds: f32) -> OperationHandle<()> {
        let duration = Duration::from_secs_f32(seconds.max(0.0));
        let deadline = Instant::now() + duration + Duration::from_secs(1);
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(RawOutcome::Reply(Ok(Value::Unit)));
        });
        OperationHandle::task(rx, deadline)
    }

    // ── Object queries ────────────────────────────────────────────────────────

    /// Invokes `method` on the object `selector` resolves to, with the
    /// caller's statically requested return type `T`.
    ///
    /// A reply whose type is not `T` resolves as a marshaling failure.
    pub async fn call_method<T: FromValue>(
        &self,
        selector: &str,
        method: &str,
        args: &[Value],
    ) -> Result<OperationHandle<T>, ClientError> {
        let selector = Selector::parse(selector)?;
        let channel = self.command_channel()?;
        channel
            .submit(
                &AgentMessage::CallMethod(CallMethodMessage {
                    selector: selector.canonical(),
                    method: method.to_string(),
                    args: args.to_vec(),
                }),
                self.config.command_timeout(),
            )
            .await
    }

    /// Reads the field named by the selector's trailing `/@field` segment.
    pub async fn get_object_field_value<T: FromValue>(
        &self,
        selector: &str,
    ) -> Result<OperationHandle<T>, ClientError> {
        let parsed = Selector::parse(selector)?;
        if parsed.attribute().is_none() {
            return Err(SelectorError::MissingAttribute.into());
        }
        let channel = self.command_channel()?;
        channel
            .submit(
                &AgentMessage::GetField {
                    selector: parsed.canonical(),
                },
                self.config.command_timeout(),
            )
            .await
    }

    /// Reads an object's position, converted as requested.
    ///
    /// The resolved [`Position`] carries the coordinate-space tag the
    /// conversion produced; check it before comparing two positions.
    pub async fn get_object_position(
        &self,
        selector: &str,
        conversion: CoordinateConversion,
    ) -> Result<OperationHandle<Position>, ClientError> {
        let parsed = Selector::parse(selector)?;
        let channel = self.command_channel()?;
        channel
            .submit(
                &AgentMessage::GetObjectPosition(GetObjectPositionMessage {
                    selector: parsed.canonical(),
                    conversion,
                }),
                self.config.command_timeout(),
            )
            .await
    }

    // ── Poll-until-condition operations ───────────────────────────────────────

    /// Repeatedly re-evaluates the selector until an object matches or the
    /// timeout elapses.
    ///
    /// The retry loop is the visible contract: one `ObjectExists` command
    /// per poll interval, no hidden recovery. Resolves `Success(true)` when
    /// a match appears and `TimedOut` when the deadline passes first.
    pub async fn wait_for_object(
        &self,
        selector: &str,
        timeout_secs: f32,
    ) -> Result<OperationHandle<bool>, ClientError> {
        let parsed = Selector::parse(selector)?;
        let channel = self.command_channel()?.clone();
        Ok(input::spawn_condition_poll(
            channel,
            AgentMessage::ObjectExists {
                selector: parsed.canonical(),
            },
            Duration::from_secs_f32(timeout_secs.max(0.0)),
            self.config.poll_interval(),
            self.config.command_timeout(),
        ))
    }

    /// Polls until the agent reports no input events left in its queue,
    /// bounded by the default command timeout.
    pub async fn wait_for_empty_input(&self) -> Result<OperationHandle<bool>, ClientError> {
        let channel = self.command_channel()?.clone();
        Ok(input::spawn_condition_poll(
            channel,
            AgentMessage::InputIdle,
            self.config.command_timeout(),
            self.config.poll_interval(),
            self.config.command_timeout(),
        ))
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    /// State-checked access to the command channel.
    pub(crate) fn command_channel(&self) -> Result<&CommandChannel, ClientError> {
        self.session.require_command_ready()?;
        self.channel.as_ref().ok_or_else(|| {
            ClientError::Transport("session reports connected but transport is gone".to_string())
        })
    }
}

impl Default for CoClient {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_starts_disconnected() {
        let client = CoClient::new();
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(client.hooks().is_empty());
    }

    #[tokio::test]
    async fn test_submitting_while_disconnected_is_a_synchronous_state_error() {
        // No agent anywhere; the error must come back without any transport
        // contact (there is no channel to contact).
        let client = CoClient::new();

        let err = client.load_scene("Menu").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidState { .. }));

        let err = client.enable_hooks(HookMask::ALL).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_bad_selector_fails_before_state_check() {
        // Selector syntax is validated first, so even a disconnected client
        // reports the syntax problem.
        let client = CoClient::new();

        let err = client
            .call_method::<i32>("//*[@name='x'", "DoMath", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Selector(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_field_read_requires_trailing_attribute() {
        let client = CoClient::new();

        let err = client
            .get_object_field_value::<i32>("//*[@name='Cylinder']")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Selector(SelectorError::MissingAttribute)
        ));
    }

    #[tokio::test]
    async fn test_wait_resolves_success_after_delay() {
        let client = CoClient::new();

        let handle = client.wait(0.05).await;
        let outcome = handle.resolve().await;

        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_connect_refused_resolves_failure_and_resets_state() {
        // Port 1 on loopback refuses immediately on any sane test host.
        let mut client = CoClient::new();

        let handle = client.connect("127.0.0.1", 1, 1.0).await.unwrap();
        let outcome = handle.resolve().await;

        match outcome {
            CommandOutcome::Failure(ClientError::Connection { .. }) => {}
            other => panic!("expected connection failure, got {other:?}"),
        }
        assert_eq!(client.state(), SessionState::Disconnected);
    }
}
