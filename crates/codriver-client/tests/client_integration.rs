//! Integration tests for the session lifecycle and command channel.
//!
//! # Purpose
//!
//! These tests drive `CoClient` through its *public* API against a real TCP
//! connection to an in-process fake agent (see `support`), so the transport,
//! codec, pending-command registry, and timeout machinery are all exercised
//! for real. They verify:
//!
//! - The happy path: connect/handshake, typed method calls, field reads.
//! - The propagation policy: selector and state errors are synchronous and
//!   never touch the transport; everything else arrives via the handle.
//! - Timeout semantics: a late reply cannot overwrite a `TimedOut` outcome,
//!   and the channel keeps serving commands afterwards.
//! - Teardown: disconnecting (or losing the transport) resolves every
//!   pending handle as `Cancelled` and forces the session down.

mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use codriver_client::{
    ClientConfig, ClientError, CoClient, CommandOutcome, CoordinateConversion, CoordinateSpace,
    HookMask, ProtocolEvent, SessionState, Value,
};
use codriver_core::protocol::messages::{AgentErrorCode, MessageType};

use support::{Action, FakeAgent};

/// Config tuned for test pacing: fast polls, sub-second command timeouts.
fn test_config() -> ClientConfig {
    ClientConfig {
        command_timeout_secs: 2.0,
        poll_interval_ms: 50,
        ..ClientConfig::default()
    }
}

async fn connected_client(agent: &FakeAgent) -> CoClient {
    connected_client_with(agent, test_config()).await
}

async fn connected_client_with(agent: &FakeAgent, config: ClientConfig) -> CoClient {
    let mut client = CoClient::with_config(config);
    let handle = client
        .connect(&agent.host(), agent.port(), 5.0)
        .await
        .expect("connect must be accepted from Disconnected");
    assert!(
        handle.resolve().await.is_success(),
        "handshake must succeed"
    );
    client
}

// ── Connection lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_handshake_succeeds_and_transitions_state() {
    let agent = FakeAgent::spawn().await;
    let mut client = CoClient::with_config(test_config());
    assert_eq!(client.state(), SessionState::Disconnected);

    let handle = client
        .connect(&agent.host(), agent.port(), 5.0)
        .await
        .unwrap();

    let outcome = handle.resolve().await;
    assert_eq!(outcome.success(), Some(true));
    assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_connect_while_connected_is_a_synchronous_usage_error() {
    let agent = FakeAgent::spawn().await;
    let mut client = connected_client(&agent).await;

    let err = client
        .connect(&agent.host(), agent.port(), 5.0)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidState { .. }));
    assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_connect_with_no_listener_fails_fast() {
    // Bind a port, then free it: nothing listens there afterwards.
    let vacated = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = vacated.local_addr().unwrap().port();
    drop(vacated);

    let mut client = CoClient::with_config(test_config());
    let started = Instant::now();
    let handle = client.connect("127.0.0.1", port, 30.0).await.unwrap();
    let outcome = handle.resolve().await;

    match outcome {
        CommandOutcome::Failure(ClientError::Connection { .. }) => {}
        other => panic!("expected connection failure, got {other:?}"),
    }
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "a refused connection must not burn the full 30s timeout"
    );
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_handshake_rejection_resolves_failure() {
    let agent = FakeAgent::spawn().await;
    agent.state.lock().unwrap().accept_hello = false;

    let mut client = CoClient::with_config(test_config());
    let handle = client
        .connect(&agent.host(), agent.port(), 5.0)
        .await
        .unwrap();
    let outcome = handle.resolve().await;

    match outcome {
        CommandOutcome::Failure(err) => {
            assert_eq!(err.agent_code(), Some(AgentErrorCode::HandshakeRejected));
        }
        other => panic!("expected handshake rejection, got {other:?}"),
    }
    assert_eq!(client.state(), SessionState::Disconnected);
}

// ── Typed calls and marshaling ────────────────────────────────────────────────

#[tokio::test]
async fn test_call_method_resolves_typed_int() {
    let agent = FakeAgent::spawn().await;
    let client = connected_client(&agent).await;

    // DoMath(1, 2) on the remote object returns 1 + 2.
    let handle = client
        .call_method::<i32>(
            "//*[@name='Canvas']/fn:component('ProjectManager')",
            "DoMath",
            &[Value::Int(1), Value::Int(2)],
        )
        .await
        .unwrap();

    assert_eq!(handle.resolve().await.success(), Some(3));
}

#[tokio::test]
async fn test_call_method_type_mismatch_is_a_failure_not_a_coercion() {
    let agent = FakeAgent::spawn().await;
    let client = connected_client(&agent).await;

    // DoMath replies with an int; requesting a String must fail.
    let handle = client
        .call_method::<String>(
            "//*[@name='Canvas']/fn:component('ProjectManager')",
            "DoMath",
            &[Value::Int(1), Value::Int(2)],
        )
        .await
        .unwrap();

    match handle.resolve().await {
        CommandOutcome::Failure(ClientError::Marshal(_)) => {}
        other => panic!("expected marshal failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_call_method_with_tagged_string_literal() {
    let agent = FakeAgent::spawn().await;
    let client = connected_client(&agent).await;

    let arg = Value::from_literal("string:The Test was run today").unwrap();
    let handle = client
        .call_method::<String>(
            "//*[@name='Canvas']/fn:component('ProjectManager')",
            "LoadDetails",
            &[arg],
        )
        .await
        .unwrap();

    let text = handle.resolve().await.success().expect("string reply");
    assert_eq!(text, "Details: The Test was run today");
}

#[tokio::test]
async fn test_get_object_field_value_returns_structured_color() {
    let agent = FakeAgent::spawn().await;
    let client = connected_client(&agent).await;

    let handle = client
        .get_object_field_value::<codriver_client::Color>(
            "//*[@name='Cylinder']/fn:component('UnityEngine.Light')/@color",
        )
        .await
        .unwrap();

    let color = handle.resolve().await.success().expect("color reply");
    assert_eq!(color, codriver_client::Color::new(0.2, 0.4, 0.6, 1.0));
}

#[tokio::test]
async fn test_get_object_position_carries_the_requested_space_tag() {
    let agent = FakeAgent::spawn().await;
    let client = connected_client(&agent).await;

    let screen = client
        .get_object_position("//*[@name='Cylinder']", CoordinateConversion::WorldToScreen)
        .await
        .unwrap()
        .resolve()
        .await
        .success()
        .expect("screen position");
    assert_eq!(screen.space, CoordinateSpace::Screen);

    let world = client
        .get_object_position("//*[@name='Cylinder']", CoordinateConversion::None)
        .await
        .unwrap()
        .resolve()
        .await
        .success()
        .expect("world position");
    assert_eq!(world.space, CoordinateSpace::World);
}

#[tokio::test]
async fn test_unknown_scene_fails_with_scene_not_found() {
    let agent = FakeAgent::spawn().await;
    let client = connected_client(&agent).await;

    let handle = client.load_scene("NoSuchScene").await.unwrap();

    let err = handle.resolve().await.failure().expect("failure expected");
    assert_eq!(err.agent_code(), Some(AgentErrorCode::SceneNotFound));
}

// ── Selector pre-flight ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_selector_never_reaches_the_channel() {
    let agent = FakeAgent::spawn().await;
    let client = connected_client(&agent).await;

    // Unbalanced predicate bracket.
    let err = client
        .wait_for_object("//*[@name='Cylinder'", 5.0)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Selector(_)), "got {err:?}");
    assert_eq!(
        agent.count_of(MessageType::ObjectExists),
        0,
        "no ObjectExists command may have been transmitted"
    );
}

// ── Timeouts and late replies ─────────────────────────────────────────────────

#[tokio::test]
async fn test_timed_out_command_discards_late_reply_and_channel_survives() {
    // The agent answers LoadScene only after 750ms; the driver allows 250ms.
    let agent = FakeAgent::spawn_with(Arc::new(|msg| {
        if let codriver_core::protocol::messages::AgentMessage::LoadScene { .. } = msg {
            Some(Action::DelayedReply(
                Duration::from_millis(750),
                Ok(Value::Bool(true)),
            ))
        } else {
            None
        }
    }))
    .await;

    let config = ClientConfig {
        command_timeout_secs: 0.25,
        ..test_config()
    };
    let client = connected_client_with(&agent, config).await;

    // 1. The slow command times out.
    let handle = client.load_scene("Menu").await.unwrap();
    assert!(handle.resolve().await.is_timed_out());

    // 2. The channel still serves commands while the late reply is in flight.
    let sum = client
        .call_method::<i32>("//*[@name='Canvas']", "DoMath", &[Value::Int(2), Value::Int(2)])
        .await
        .unwrap()
        .resolve()
        .await
        .success();
    assert_eq!(sum, Some(4));

    // 3. Let the late reply actually arrive, then prove the session is
    // still healthy — the discarded reply corrupted nothing.
    tokio::time::sleep(Duration::from_millis(800)).await;
    let sum = client
        .call_method::<i32>("//*[@name='Canvas']", "DoMath", &[Value::Int(3), Value::Int(4)])
        .await
        .unwrap()
        .resolve()
        .await
        .success();
    assert_eq!(sum, Some(7));
}

// ── Teardown ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_cancels_all_pending_and_blocks_further_submits() {
    // The agent never answers LoadScene, so both commands stay pending.
    let agent = FakeAgent::spawn_with(Arc::new(|msg| {
        if let codriver_core::protocol::messages::AgentMessage::LoadScene { .. } = msg {
            Some(Action::NoReply)
        } else {
            None
        }
    }))
    .await;
    let mut client = connected_client(&agent).await;

    let first = client.load_scene("Menu").await.unwrap();
    let second = client.load_scene("UISample").await.unwrap();

    client.disconnect().await;

    assert!(first.resolve().await.is_cancelled());
    assert!(second.resolve().await.is_cancelled());
    assert_eq!(client.state(), SessionState::Disconnected);

    let err = client.load_scene("Menu").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState { .. }));
}

#[tokio::test]
async fn test_transport_drop_cancels_pending_and_forces_disconnected() {
    // The agent hangs up instead of replying.
    let agent = FakeAgent::spawn_with(Arc::new(|msg| {
        if let codriver_core::protocol::messages::AgentMessage::LoadScene { .. } = msg {
            Some(Action::CloseConnection)
        } else {
            None
        }
    }))
    .await;
    let client = connected_client(&agent).await;

    let handle = client.load_scene("Menu").await.unwrap();

    assert!(handle.resolve().await.is_cancelled());

    // The receive loop noticed EOF and forced the session down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.state(), SessionState::Disconnected);
}

// ── Hooks ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_hook_lifecycle_transitions_session_state() {
    let agent = FakeAgent::spawn().await;
    let client = connected_client(&agent).await;

    // Enable everything.
    let handle = client.enable_hooks(HookMask::ALL).await.unwrap();
    assert_eq!(handle.resolve().await.success(), Some(true));
    assert_eq!(client.state(), SessionState::HooksEnabled);
    assert!(client.hooks().contains(HookMask::KEYBOARD));

    // Dropping one class keeps the state while others remain hooked.
    let handle = client.disable_hooks(HookMask::MOUSE).await.unwrap();
    assert!(handle.resolve().await.is_success());
    assert_eq!(client.state(), SessionState::HooksEnabled);

    // Dropping the rest returns to plain Connected.
    let handle = client.disable_hooks(HookMask::ALL).await.unwrap();
    assert!(handle.resolve().await.is_success());
    assert_eq!(client.state(), SessionState::Connected);
    assert!(client.hooks().is_empty());
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_diagnostic_events_trace_every_protocol_message() {
    let agent = FakeAgent::spawn().await;
    let mut client = connected_client(&agent).await;
    let mut events = client
        .take_event_receiver()
        .expect("event receiver available after connect");

    client
        .load_scene("Menu")
        .await
        .unwrap()
        .resolve()
        .await
        .success()
        .expect("scene loads");

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert!(
        seen.contains(&ProtocolEvent::Sent {
            command_id: 0,
            kind: MessageType::Hello
        }),
        "handshake send must be traced: {seen:?}"
    );
    assert!(
        seen.iter().any(|e| matches!(
            e,
            ProtocolEvent::Sent {
                kind: MessageType::LoadScene,
                ..
            }
        )),
        "LoadScene send must be traced"
    );
    assert!(
        seen.iter().any(|e| matches!(
            e,
            ProtocolEvent::Received {
                kind: MessageType::Reply,
                ..
            }
        )),
        "reply receipt must be traced"
    );
}
