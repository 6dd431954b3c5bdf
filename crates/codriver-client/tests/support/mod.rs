//! In-process fake agent for integration tests.
//!
//! Binds a real TCP listener on a loopback port and speaks the codriver
//! wire protocol, so the client under test exercises its actual transport,
//! codec, and demultiplexing paths. Behavior is the sum of:
//!
//! - a default model: a hookable scene list, one draggable object that
//!   follows the pointer while a button is held, and method/field fixtures
//!   for typed calls, field reads, and position queries;
//! - an optional per-test override that can delay, drop, or replace replies
//!   to simulate slow agents, lost replies, and dropped connections.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

use codriver_core::domain::geometry::{Color, CoordinateConversion, Position};
use codriver_core::marshal::Value;
use codriver_core::protocol::messages::{
    AgentErrorCode, AgentFailure, AgentMessage, ButtonAction, HelloAckMessage, MessageType,
    ReplyMessage, HEADER_SIZE, PROTOCOL_VERSION,
};
use codriver_core::protocol::{decode_message, encode_message};

/// Installs the test tracing subscriber once per process. `RUST_LOG`
/// controls verbosity when debugging a failing test.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// What the fake agent does with one request.
pub enum Action {
    Reply(Result<Value, AgentFailure>),
    DelayedReply(Duration, Result<Value, AgentFailure>),
    NoReply,
    CloseConnection,
}

/// Per-test override, consulted before the default model.
pub type Override = Arc<dyn Fn(&AgentMessage) -> Option<Action> + Send + Sync>;

/// Mutable world model behind the fake agent.
pub struct AgentState {
    /// Current simulated pointer position (screen space).
    pub pointer: (f32, f32),
    /// Whether a pointer button is currently held.
    pub button_down: bool,
    /// Screen position of the single draggable object; follows the pointer
    /// while a button is held, like a physics-dragged prop.
    pub object: (f32, f32),
    /// ObjectExists replies `false` this many times before turning `true`.
    pub exists_after: u32,
    pub exists_calls: u32,
    /// Whether the handshake is accepted.
    pub accept_hello: bool,
    /// Scenes the agent knows; anything else is SceneNotFound.
    pub scenes: Vec<String>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            pointer: (0.0, 0.0),
            button_down: false,
            object: (100.0, 100.0),
            exists_after: 0,
            exists_calls: 0,
            accept_hello: true,
            scenes: vec![
                "Menu".to_string(),
                "UISample".to_string(),
                "MouseMoveObject".to_string(),
                "MoveObjectScene".to_string(),
            ],
        }
    }
}

pub struct FakeAgent {
    pub addr: SocketAddr,
    pub seen: Arc<Mutex<Vec<MessageType>>>,
    pub state: Arc<Mutex<AgentState>>,
}

impl FakeAgent {
    /// Spawns an agent with default behavior only.
    pub async fn spawn() -> Self {
        Self::spawn_with(Arc::new(|_| None)).await
    }

    /// Spawns an agent whose replies may be overridden per message.
    pub async fn spawn_with(over: Override) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(Mutex::new(AgentState::default()));

        let accept_seen = Arc::clone(&seen);
        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(serve(
                    stream,
                    Arc::clone(&over),
                    Arc::clone(&accept_seen),
                    Arc::clone(&accept_state),
                ));
            }
        });

        Self { addr, seen, state }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Snapshot of every request kind received so far, in arrival order.
    pub fn seen_kinds(&self) -> Vec<MessageType> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count_of(&self, kind: MessageType) -> usize {
        self.seen.lock().unwrap().iter().filter(|k| **k == kind).count()
    }

    pub fn object_position(&self) -> (f32, f32) {
        self.state.lock().unwrap().object
    }

    pub fn pointer_position(&self) -> (f32, f32) {
        self.state.lock().unwrap().pointer
    }
}

async fn serve(
    stream: TcpStream,
    over: Override,
    seen: Arc<Mutex<Vec<MessageType>>>,
    state: Arc<Mutex<AgentState>>,
) {
    let (mut reader, write_half) = stream.into_split();
    let writer = Arc::new(tokio::sync::Mutex::new(write_half));

    loop {
        let mut frame = vec![0u8; HEADER_SIZE];
        if reader.read_exact(&mut frame).await.is_err() {
            return;
        }
        let payload_len = u32::from_be_bytes(frame[4..8].try_into().unwrap()) as usize;
        frame.resize(HEADER_SIZE + payload_len, 0);
        if payload_len > 0 && reader.read_exact(&mut frame[HEADER_SIZE..]).await.is_err() {
            return;
        }
        let Ok((msg, command_id, _)) = decode_message(&frame) else {
            continue;
        };

        seen.lock().unwrap().push(msg.message_type());

        if let AgentMessage::Hello(_) = &msg {
            let accepted = state.lock().unwrap().accept_hello;
            let ack = AgentMessage::HelloAck(HelloAckMessage {
                accepted,
                agent_version: PROTOCOL_VERSION,
                reject_reason: if accepted { 0x00 } else { 0x01 },
            });
            write_frame(&writer, &ack, command_id).await;
            continue;
        }

        let action =
            over(&msg).unwrap_or_else(|| default_action(&msg, &mut state.lock().unwrap()));

        match action {
            Action::Reply(outcome) => {
                write_frame(
                    &writer,
                    &AgentMessage::Reply(ReplyMessage { outcome }),
                    command_id,
                )
                .await;
            }
            Action::DelayedReply(delay, outcome) => {
                let writer = Arc::clone(&writer);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    write_frame(
                        &writer,
                        &AgentMessage::Reply(ReplyMessage { outcome }),
                        command_id,
                    )
                    .await;
                });
            }
            Action::NoReply => {}
            Action::CloseConnection => return,
        }
    }
}

async fn write_frame(
    writer: &Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
    msg: &AgentMessage,
    command_id: u64,
) {
    let bytes = encode_message(msg, command_id).expect("encode");
    let mut w = writer.lock().await;
    let _ = w.write_all(&bytes).await;
}

/// The default world model.
fn default_action(msg: &AgentMessage, state: &mut AgentState) -> Action {
    let ok = |value: Value| Action::Reply(Ok(value));
    let fail = |code: AgentErrorCode, message: &str| {
        Action::Reply(Err(AgentFailure {
            code,
            message: message.to_string(),
        }))
    };

    match msg {
        AgentMessage::EnableHooks { .. } | AgentMessage::DisableHooks { .. } => {
            ok(Value::Bool(true))
        }
        AgentMessage::LoadScene { scene } => {
            if state.scenes.iter().any(|s| s == scene) {
                ok(Value::Bool(true))
            } else {
                fail(AgentErrorCode::SceneNotFound, "no such scene")
            }
        }
        AgentMessage::ObjectExists { .. } => {
            state.exists_calls += 1;
            ok(Value::Bool(state.exists_calls > state.exists_after))
        }
        AgentMessage::GetField { selector } => {
            if selector.ends_with("/@color") {
                ok(Value::Color(Color::new(0.2, 0.4, 0.6, 1.0)))
            } else {
                fail(AgentErrorCode::FieldNotFound, "unknown field")
            }
        }
        AgentMessage::CallMethod(call) => match call.method.as_str() {
            // Adds up every integer argument, like the sample project's
            // DoMath(1, 2) == 3.
            "DoMath" => {
                let sum = call
                    .args
                    .iter()
                    .map(|arg| match arg {
                        Value::Int(n) => *n,
                        _ => 0,
                    })
                    .sum::<i32>();
                ok(Value::Int(sum))
            }
            "LoadDetails" => match call.args.first() {
                Some(Value::Str(text)) => ok(Value::Str(format!("Details: {text}"))),
                _ => fail(AgentErrorCode::InvalidArgument, "expected a string"),
            },
            _ => fail(AgentErrorCode::MethodNotFound, "unknown method"),
        },
        AgentMessage::GetObjectPosition(get) => match get.conversion {
            CoordinateConversion::WorldToScreen => ok(Value::Position(Position::screen(
                state.object.0,
                state.object.1,
            ))),
            CoordinateConversion::None => ok(Value::Position(Position::world(
                state.object.0,
                state.object.1,
                0.0,
            ))),
        },
        AgentMessage::ClickObject(_) => ok(Value::Bool(true)),
        AgentMessage::PointerMove { x, y } => {
            state.pointer = (*x, *y);
            if state.button_down {
                state.object = (*x, *y);
            }
            ok(Value::Unit)
        }
        AgentMessage::PointerButton(button) => {
            state.button_down = matches!(button.action, ButtonAction::Press);
            ok(Value::Unit)
        }
        AgentMessage::PointerLocation => ok(Value::Position(Position::screen(
            state.pointer.0,
            state.pointer.1,
        ))),
        AgentMessage::KeysDown { .. } | AgentMessage::KeysUp { .. } => ok(Value::Unit),
        AgentMessage::InputIdle => ok(Value::Bool(true)),
        AgentMessage::Disconnect { .. } => Action::NoReply,
        // Response kinds never arrive at the agent.
        AgentMessage::Hello(_) | AgentMessage::HelloAck(_) | AgentMessage::Reply(_) => {
            Action::NoReply
        }
    }
}
