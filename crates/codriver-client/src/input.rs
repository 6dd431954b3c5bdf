//! Input simulator: compound, human-like input sequences.
//!
//! Each operation here is built from primitive commands (pointer moves,
//! button transitions, key lists) submitted through the command channel.
//! A spawned task drives the sequence while the caller holds an ordinary
//! [`OperationHandle`]; the first sub-command that fails, times out, or is
//! cancelled resolves the compound handle the same way.
//!
//! Every intermediate drag/move step is its own remote round trip, so
//! network latency accumulates per step — callers size `steps` against
//! their timeout budget.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tracing::debug;

use codriver_core::domain::geometry::{pointer_path, CoordinateConversion, Position};
use codriver_core::keys::KeyCode;
use codriver_core::marshal::{FromValue, Value};
use codriver_core::protocol::messages::{
    AgentMessage, ButtonAction, ClickObjectMessage, GetObjectPositionMessage, MouseButton,
    PointerButtonMessage,
};
use codriver_core::selector::Selector;

use crate::channel::CommandChannel;
use crate::client::CoClient;
use crate::error::ClientError;
use crate::handle::{CommandOutcome, OperationHandle, RawOutcome};

/// Grace added to a compound handle's own deadline so the driving task,
/// which knows the precise budget, reports `TimedOut` before the handle's
/// backstop fires.
const HANDLE_SLACK: Duration = Duration::from_millis(250);

// ── Task plumbing ─────────────────────────────────────────────────────────────

/// Submits one sub-command and maps its outcome into the compound task's
/// error channel: any non-success short-circuits the whole sequence.
async fn step<T: FromValue>(
    channel: &CommandChannel,
    msg: &AgentMessage,
    timeout: Duration,
) -> Result<T, RawOutcome> {
    let handle = match channel.submit::<T>(msg, timeout).await {
        Ok(handle) => handle,
        Err(e) => return Err(RawOutcome::Fault(e)),
    };
    match handle.resolve().await {
        CommandOutcome::Success(value) => Ok(value),
        CommandOutcome::Failure(e) => Err(RawOutcome::Fault(e)),
        CommandOutcome::TimedOut => Err(RawOutcome::TimedOut),
        CommandOutcome::Cancelled => Err(RawOutcome::Cancelled),
    }
}

/// Runs a compound sequence on a spawned task, reporting through a handle.
fn spawn_input_task<T, F>(deadline: Instant, sequence: F) -> OperationHandle<T>
where
    T: FromValue,
    F: Future<Output = Result<Value, RawOutcome>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let outcome = match sequence.await {
            Ok(value) => RawOutcome::Reply(Ok(value)),
            Err(raw) => raw,
        };
        let _ = tx.send(outcome);
    });
    OperationHandle::task(rx, deadline)
}

/// Poll-until-condition driver for `wait_for_object` / `wait_for_empty_input`.
///
/// Re-submits `request` every `poll_interval` until it reports `true` or
/// `overall` elapses. A single slow poll round (sub-command timeout) counts
/// as "not yet", not as failure; agent errors and cancellation end the loop
/// immediately.
pub(crate) fn spawn_condition_poll(
    channel: CommandChannel,
    request: AgentMessage,
    overall: Duration,
    poll_interval: Duration,
    step_timeout: Duration,
) -> OperationHandle<bool> {
    let deadline = Instant::now() + overall;
    spawn_input_task(deadline + HANDLE_SLACK, async move {
        let mut rounds = 0u32;
        loop {
            match step::<bool>(&channel, &request, step_timeout).await {
                Ok(true) => {
                    debug!(rounds, "condition satisfied");
                    return Ok(Value::Bool(true));
                }
                Ok(false) | Err(RawOutcome::TimedOut) => {}
                Err(other) => return Err(other),
            }
            rounds += 1;
            if Instant::now() >= deadline {
                debug!(rounds, "condition poll deadline elapsed");
                return Err(RawOutcome::TimedOut);
            }
            sleep(poll_interval).await;
        }
    })
}

// ── Public input operations ───────────────────────────────────────────────────

impl CoClient {
    /// Resolves `selector` remotely, moves the simulated pointer to the
    /// object's screen-space centroid, and presses+releases `button`.
    ///
    /// Resolves `Success(true)` only if the object actually received the
    /// click — computing the coordinates is not enough.
    pub async fn click_object(
        &self,
        button: MouseButton,
        selector: &str,
        timeout_secs: f32,
    ) -> Result<OperationHandle<bool>, ClientError> {
        let parsed = Selector::parse(selector)?;
        let channel = self.command_channel()?;
        channel
            .submit(
                &AgentMessage::ClickObject(ClickObjectMessage {
                    button,
                    selector: parsed.canonical(),
                }),
                Duration::from_secs_f32(timeout_secs.max(0.0)),
            )
            .await
    }

    /// Moves the simulated pointer to an absolute screen position.
    pub async fn move_mouse(&self, x: f32, y: f32) -> Result<OperationHandle<()>, ClientError> {
        let channel = self.command_channel()?;
        channel
            .submit(
                &AgentMessage::PointerMove { x, y },
                self.config.command_timeout(),
            )
            .await
    }

    /// Moves the pointer to the object's screen position.
    ///
    /// With `smooth`, the path from the current pointer position is
    /// interpolated waypoint by waypoint instead of teleporting. With
    /// `wait_for_arrival`, the handle stays pending until the remote
    /// pointer is within the configured tolerance of the target (or the
    /// timeout window closes).
    pub async fn mouse_move_to_object(
        &self,
        selector: &str,
        timeout_secs: f32,
        smooth: bool,
        wait_for_arrival: bool,
    ) -> Result<OperationHandle<bool>, ClientError> {
        let parsed = Selector::parse(selector)?;
        let channel = self.command_channel()?.clone();
        let selector_text = parsed.canonical();

        let deadline = Instant::now() + Duration::from_secs_f32(timeout_secs.max(0.0));
        let step_timeout = self.config.command_timeout();
        let steps = self.config.smooth_move_steps;
        let step_delay = self.config.pointer_step_delay();
        let poll_interval = self.config.poll_interval();
        let tolerance = self.config.pointer_tolerance;

        Ok(spawn_input_task(deadline + HANDLE_SLACK, async move {
            let target: Position = step(
                &channel,
                &AgentMessage::GetObjectPosition(GetObjectPositionMessage {
                    selector: selector_text,
                    conversion: CoordinateConversion::WorldToScreen,
                }),
                step_timeout,
            )
            .await?;

            if smooth {
                let current: Position =
                    step(&channel, &AgentMessage::PointerLocation, step_timeout).await?;
                for (x, y) in pointer_path(
                    (current.x, current.y),
                    (target.x, target.y),
                    steps,
                ) {
                    step::<()>(&channel, &AgentMessage::PointerMove { x, y }, step_timeout)
                        .await?;
                    if Instant::now() >= deadline {
                        return Err(RawOutcome::TimedOut);
                    }
                    sleep(step_delay).await;
                }
            } else {
                step::<()>(
                    &channel,
                    &AgentMessage::PointerMove {
                        x: target.x,
                        y: target.y,
                    },
                    step_timeout,
                )
                .await?;
            }

            if wait_for_arrival {
                loop {
                    let here: Position =
                        step(&channel, &AgentMessage::PointerLocation, step_timeout).await?;
                    if here.same_space(&target) && here.distance_2d(&target) <= tolerance {
                        break;
                    }
                    if Instant::now() >= deadline {
                        return Err(RawOutcome::TimedOut);
                    }
                    sleep(poll_interval).await;
                }
            }

            Ok(Value::Bool(true))
        }))
    }

    /// Drags with `button` held from `origin` to `dest` through `steps`
    /// linearly interpolated pointer positions.
    ///
    /// Every intermediate step is a remote position update; with the
    /// default 5s per-step timeout, a 100-step drag can legitimately take
    /// a while on a slow link.
    pub async fn mouse_drag(
        &self,
        button: MouseButton,
        dest: (f32, f32),
        steps: u32,
        origin: (f32, f32),
        release_at_end: bool,
    ) -> Result<OperationHandle<bool>, ClientError> {
        let channel = self.command_channel()?.clone();
        let step_timeout = self.config.command_timeout();
        let overall = step_timeout.saturating_mul(steps.saturating_add(4));
        let deadline = Instant::now() + overall + HANDLE_SLACK;

        Ok(spawn_input_task(deadline, async move {
            debug!(?button, ?origin, ?dest, steps, "starting drag");

            step::<()>(
                &channel,
                &AgentMessage::PointerMove {
                    x: origin.0,
                    y: origin.1,
                },
                step_timeout,
            )
            .await?;
            step::<()>(
                &channel,
                &AgentMessage::PointerButton(PointerButtonMessage {
                    button,
                    action: ButtonAction::Press,
                    x: origin.0,
                    y: origin.1,
                }),
                step_timeout,
            )
            .await?;

            for (x, y) in pointer_path(origin, dest, steps) {
                step::<()>(&channel, &AgentMessage::PointerMove { x, y }, step_timeout).await?;
            }

            if release_at_end {
                step::<()>(
                    &channel,
                    &AgentMessage::PointerButton(PointerButtonMessage {
                        button,
                        action: ButtonAction::Release,
                        x: dest.0,
                        y: dest.1,
                    }),
                    step_timeout,
                )
                .await?;
            }

            Ok(Value::Bool(true))
        }))
    }

    /// Presses all of `keys` simultaneously, holds them for `duration_ms`,
    /// then releases them all.
    pub async fn key_press(
        &self,
        keys: &[KeyCode],
        duration_ms: u64,
    ) -> Result<OperationHandle<bool>, ClientError> {
        let channel = self.command_channel()?.clone();
        let keys = keys.to_vec();
        let hold = Duration::from_millis(duration_ms);
        let step_timeout = self.config.command_timeout();
        let deadline = Instant::now() + hold + step_timeout * 2 + HANDLE_SLACK;

        Ok(spawn_input_task(deadline, async move {
            step::<()>(
                &channel,
                &AgentMessage::KeysDown { keys: keys.clone() },
                step_timeout,
            )
            .await?;
            sleep(hold).await;
            step::<()>(&channel, &AgentMessage::KeysUp { keys }, step_timeout).await?;
            Ok(Value::Bool(true))
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
