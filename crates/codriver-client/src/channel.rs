//! Command channel: request/response framing over one persistent connection.
//!
//! Architecture:
//! - `CommandChannel` owns the write half of a TCP stream (behind a tokio
//!   `Mutex`) and the pending-command registry.
//! - A spawned receive loop reads `[header][payload]` frames, decodes them,
//!   and completes the pending entry whose id matches — arrival order is
//!   irrelevant, only the id match counts.
//! - The pending registry is the single piece of state shared between the
//!   submit path and the receive loop; one mutex guards it.
//!
//! Timeouts live on the [`OperationHandle`] side: when a handle's deadline
//! elapses it removes its own pending entry, so a reply arriving afterwards
//! finds nothing to complete and is discarded with a log line.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use codriver_core::marshal::{FromValue, Value};
use codriver_core::protocol::messages::{
    AgentErrorCode, AgentFailure, AgentMessage, DisconnectReason, MessageType, HEADER_SIZE,
};
use codriver_core::protocol::{decode_message, encode_message, CommandIdAllocator};

use crate::error::ClientError;
use crate::handle::{OperationHandle, RawOutcome};
use crate::session::SessionHandle;

/// Upper bound on a single frame's payload; a larger declared length can
/// only be stream corruption, and resynchronizing is impossible past it.
const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

// ── Diagnostic events ─────────────────────────────────────────────────────────

/// Diagnostic event raised for every protocol-level message.
///
/// Observability only — outcomes are delivered through operation handles,
/// never through this stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// A request frame was written to the transport.
    Sent { command_id: u64, kind: MessageType },
    /// A response frame was read from the transport.
    Received { command_id: u64, kind: MessageType },
    /// The transport closed; every pending command was cancelled.
    TransportClosed,
}

// ── Pending registry ──────────────────────────────────────────────────────────

/// Registry of in-flight commands, keyed by command id.
///
/// Shared between the submit path and the receive loop; all access goes
/// through one mutex, taken only for map operations (never across an await).
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingCommands {
    inner: Arc<Mutex<HashMap<u64, oneshot::Sender<RawOutcome>>>>,
}

impl PendingCommands {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<RawOutcome>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a pending entry and returns the receiver its outcome will
    /// arrive on.
    pub(crate) fn register(&self, command_id: u64) -> oneshot::Receiver<RawOutcome> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(command_id, tx);
        rx
    }

    /// Completes the entry for `command_id`, if it is still pending.
    ///
    /// Returns `false` when no entry exists — a late reply after a timeout,
    /// or an id the driver never issued. The caller logs and drops it.
    pub(crate) fn complete(&self, command_id: u64, outcome: RawOutcome) -> bool {
        match self.lock().remove(&command_id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Removes an entry without resolving it (timeout path).
    pub(crate) fn discard(&self, command_id: u64) {
        self.lock().remove(&command_id);
    }

    /// Cancels every pending entry, resolving each handle as `Cancelled`.
    /// Returns how many were cancelled.
    pub(crate) fn cancel_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut map = self.lock();
            map.drain().collect()
        };
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(RawOutcome::Cancelled);
        }
        count
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

// ── Command channel ───────────────────────────────────────────────────────────

/// The driver side of the persistent agent connection.
///
/// Cheap to clone; compound input tasks hold their own clone to submit
/// sub-commands while the caller awaits the compound handle.
#[derive(Clone)]
pub(crate) struct CommandChannel {
    writer: Arc<tokio::sync::Mutex<Option<OwnedWriteHalf>>>,
    pending: PendingCommands,
    ids: Arc<CommandIdAllocator>,
    events: mpsc::UnboundedSender<ProtocolEvent>,
    session: SessionHandle,
}

impl CommandChannel {
    /// Establishes the TCP transport and spawns the receive loop.
    ///
    /// # Errors
    ///
    /// [`ClientError::ConnectTimeout`] when the connect does not complete in
    /// time, [`ClientError::Connection`] when the OS refuses it.
    pub(crate) async fn open(
        addr: String,
        timeout: Duration,
        session: SessionHandle,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ProtocolEvent>), ClientError> {
        let attempt = tokio::time::timeout(timeout, TcpStream::connect(addr.as_str())).await;
        let stream = match attempt {
            Err(_elapsed) => {
                return Err(ClientError::ConnectTimeout {
                    addr,
                    seconds: timeout.as_secs_f32(),
                })
            }
            Ok(Err(source)) => return Err(ClientError::Connection { addr, source }),
            Ok(Ok(stream)) => stream,
        };
        info!("connected to agent at {addr}");

        let (read_half, write_half) = stream.into_split();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending = PendingCommands::new();

        let channel = CommandChannel {
            writer: Arc::new(tokio::sync::Mutex::new(Some(write_half))),
            pending: pending.clone(),
            ids: Arc::new(CommandIdAllocator::new()),
            events: events_tx.clone(),
            session: session.clone(),
        };

        tokio::spawn(read_loop(read_half, pending, events_tx, session));

        Ok((channel, events_rx))
    }

    /// Encodes and sends a request, registering it as pending.
    ///
    /// A write failure tears the session down (all pending handles resolve
    /// `Cancelled`, including the one returned here); per the propagation
    /// policy, transport failures never surface as a synchronous error once
    /// the command has been accepted.
    pub(crate) async fn submit<T: FromValue>(
        &self,
        msg: &AgentMessage,
        timeout: Duration,
    ) -> Result<OperationHandle<T>, ClientError> {
        let command_id = self.ids.next();
        let bytes = encode_message(msg, command_id)?;
        let rx = self.pending.register(command_id);
        let deadline = Instant::now() + timeout;

        let write_result = {
            let mut writer = self.writer.lock().await;
            match writer.as_mut() {
                Some(w) => w.write_all(&bytes).await,
                None => Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "write half already released",
                )),
            }
        };

        match write_result {
            Ok(()) => {
                debug!(command_id, kind = ?msg.message_type(), "command submitted");
                let _ = self.events.send(ProtocolEvent::Sent {
                    command_id,
                    kind: msg.message_type(),
                });
            }
            Err(e) => {
                warn!("write failed for command {command_id}: {e}; tearing session down");
                self.pending.cancel_all();
                self.session.force_disconnected();
            }
        }

        Ok(OperationHandle::pending(
            rx,
            deadline,
            command_id,
            self.pending.clone(),
        ))
    }

    /// Sends a best-effort goodbye, releases the transport, and cancels
    /// every pending command.
    pub(crate) async fn shutdown(&self) {
        let command_id = self.ids.next();
        let goodbye = encode_message(
            &AgentMessage::Disconnect {
                reason: DisconnectReason::DriverShutdown,
            },
            command_id,
        )
        .ok();

        {
            let mut writer = self.writer.lock().await;
            if let (Some(w), Some(bytes)) = (writer.as_mut(), goodbye.as_ref()) {
                let _ = w.write_all(bytes).await;
                let _ = w.shutdown().await;
                let _ = self.events.send(ProtocolEvent::Sent {
                    command_id,
                    kind: MessageType::Disconnect,
                });
            }
            *writer = None;
        }

        let cancelled = self.pending.cancel_all();
        if cancelled > 0 {
            info!("session closed with {cancelled} command(s) pending; resolved as cancelled");
        }
    }
}

// ── Receive loop ──────────────────────────────────────────────────────────────

/// Reads inbound frames and demultiplexes them onto pending commands.
///
/// Runs until the transport yields EOF or an I/O error, then cancels every
/// pending command and forces the session state to `Disconnected`.
async fn read_loop(
    mut reader: OwnedReadHalf,
    pending: PendingCommands,
    events: mpsc::UnboundedSender<ProtocolEvent>,
    session: SessionHandle,
) {
    loop {
        let mut frame = vec![0u8; HEADER_SIZE];
        if let Err(e) = reader.read_exact(&mut frame).await {
            if e.kind() != io::ErrorKind::UnexpectedEof {
                error!("read error on command channel: {e}");
            }
            break;
        }

        // Payload length at bytes 4..8, command id at 8..16 (big-endian).
        let payload_len = u32::from_be_bytes(frame[4..8].try_into().unwrap()) as usize;
        let command_id = u64::from_be_bytes(frame[8..16].try_into().unwrap());

        if payload_len > MAX_PAYLOAD {
            // Past this the stream cannot be resynchronized.
            error!("frame for command {command_id} declares {payload_len} payload bytes; closing");
            break;
        }

        frame.resize(HEADER_SIZE + payload_len, 0);
        if payload_len > 0 {
            if let Err(e) = reader.read_exact(&mut frame[HEADER_SIZE..]).await {
                error!("read payload error: {e}");
                break;
            }
        }

        match decode_message(&frame) {
            Ok((msg, id, _)) => {
                let _ = events.send(ProtocolEvent::Received {
                    command_id: id,
                    kind: msg.message_type(),
                });
                match msg {
                    AgentMessage::Reply(reply) => {
                        deliver(&pending, id, RawOutcome::Reply(reply.outcome));
                    }
                    AgentMessage::HelloAck(ack) => {
                        let outcome = if ack.accepted {
                            RawOutcome::Reply(Ok(Value::Bool(true)))
                        } else {
                            RawOutcome::Reply(Err(AgentFailure {
                                code: AgentErrorCode::HandshakeRejected,
                                message: format!(
                                    "agent rejected the session (reason 0x{:02X})",
                                    ack.reject_reason
                                ),
                            }))
                        };
                        deliver(&pending, id, outcome);
                    }
                    other => {
                        warn!(
                            "agent sent a request-only frame {:?}; ignoring",
                            other.message_type()
                        );
                    }
                }
            }
            Err(e) => {
                // A malformed payload fails the affected command only; the
                // length-prefixed framing is intact, so keep reading.
                warn!("malformed frame for command {command_id}: {e}");
                deliver(
                    &pending,
                    command_id,
                    RawOutcome::Fault(ClientError::Protocol(e)),
                );
            }
        }
    }

    let cancelled = pending.cancel_all();
    if cancelled > 0 {
        warn!("transport closed with {cancelled} command(s) pending; resolved as cancelled");
    }
    session.force_disconnected();
    let _ = events.send(ProtocolEvent::TransportClosed);
    info!("command channel receive loop ended");
}

fn deliver(pending: &PendingCommands, command_id: u64, outcome: RawOutcome) {
    if !pending.complete(command_id, outcome) {
        debug!(command_id, "late or unknown reply discarded");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
