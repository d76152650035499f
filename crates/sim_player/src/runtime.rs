//! The task that drives an [`IoPlayer`], and the handle used to talk to it.
//!
//! One task owns the player. Inbound commands and timer ticks are handled on
//! that task one at a time, so a command never overlaps a tick: by the time a
//! `pause` or `stop` is acknowledged, any tick that was running has finished,
//! and every acknowledged command is visible to the next tick.
//!
//! Outbound subscribers run inside that task. A subscriber must not wait for
//! a command on the same player (directly, or by publishing to its inbound
//! bus), or the task waits on itself.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use sim_bus::{Acknowledgement, Bus, Frame, InboundMessage, Subscription, message_types};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{error, info};

use crate::config::ScheduleMode;
use crate::error::PlayerError;
use crate::io::IoPlayer;
use crate::player::PlayerState;

/// Maximum number of queued commands per player.
pub const COMMAND_BUFFER: usize = 64;

/// Lifecycle state and counters of a running player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub tick: u64,
    pub elapsed: f64,
}

enum Command {
    Inbound {
        message: InboundMessage,
        reply: oneshot::Sender<Acknowledgement>,
    },
    Step {
        reply: oneshot::Sender<Result<Frame, PlayerError>>,
    },
    Frame {
        reply: oneshot::Sender<Frame>,
    },
    Status {
        reply: oneshot::Sender<PlayerStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a spawned player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    name: Arc<str>,
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound { message, .. } => write!(f, "Inbound({})", message.kind),
            Self::Step { .. } => f.write_str("Step"),
            Self::Frame { .. } => f.write_str("Frame"),
            Self::Status { .. } => f.write_str("Status"),
            Self::Shutdown { .. } => f.write_str("Shutdown"),
        }
    }
}

impl PlayerHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle an inbound message and wait for its acknowledgement. The
    /// acknowledgement (and frame) are published on the outbound bus before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Closed`] if the player has shut down. Command
    /// failures are reported through the acknowledgement, not as an error.
    pub async fn dispatch(&self, message: InboundMessage) -> Result<Acknowledgement, PlayerError> {
        self.request(|reply| Command::Inbound { message, reply })
            .await
    }

    /// Send a command of type `kind` with a fresh message id.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn send(&self, kind: &str, payload: Value) -> Result<Acknowledgement, PlayerError> {
        self.dispatch(InboundMessage::new(kind, payload)).await
    }

    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn start(&self) -> Result<Acknowledgement, PlayerError> {
        self.send(message_types::START, Value::Null).await
    }

    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn pause(&self) -> Result<Acknowledgement, PlayerError> {
        self.send(message_types::PAUSE, Value::Null).await
    }

    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn stop(&self) -> Result<Acknowledgement, PlayerError> {
        self.send(message_types::STOP, Value::Null).await
    }

    /// Run exactly one tick now, in any state, and return its frame. The
    /// frame is also published.
    ///
    /// # Errors
    ///
    /// Returns the tick failure, or [`PlayerError::Closed`].
    pub async fn step(&self) -> Result<Frame, PlayerError> {
        self.request(|reply| Command::Step { reply }).await?
    }

    /// The current filtered frame, without publishing it.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Closed`] if the player has shut down.
    pub async fn frame(&self) -> Result<Frame, PlayerError> {
        self.request(|reply| Command::Frame { reply }).await
    }

    /// # Errors
    ///
    /// Returns [`PlayerError::Closed`] if the player has shut down.
    pub async fn status(&self) -> Result<PlayerStatus, PlayerError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Stop the player, detach it from its inbound bus and end its task.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Closed`] if the player had already shut down.
    pub async fn shutdown(&self) -> Result<(), PlayerError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, PlayerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> PlayerError {
        PlayerError::Closed(self.name.to_string())
    }
}

impl IoPlayer {
    /// Move the player onto its own task and subscribe it to `inbound`.
    ///
    /// Each inbound publish resolves once the player has published the
    /// acknowledgement for that message.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(self, inbound: &Bus<InboundMessage>) -> PlayerHandle {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let handle = PlayerHandle {
            name: Arc::from(self.name()),
            commands,
        };

        let forward = handle.clone();
        let subscription = inbound.subscribe(move |message: InboundMessage| {
            let player = forward.clone();
            async move {
                player.dispatch(message).await?;
                Ok(())
            }
        });

        info!(player = %self.name(), "player spawned");
        tokio::spawn(drive(self, receiver, subscription));
        handle
    }
}

enum Flow {
    Continue,
    Exit(oneshot::Sender<()>),
}

async fn drive(
    mut io: IoPlayer,
    mut commands: mpsc::Receiver<Command>,
    subscription: Subscription,
) {
    let interval = io.player().config().tick_interval();
    let timed = io.player().config().schedule == ScheduleMode::Timer;
    let mut next_tick: Option<Instant> = None;
    let mut exit_reply = None;

    loop {
        let deadline = next_tick;
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else { break };
                match AssertUnwindSafe(apply(&mut io, command)).catch_unwind().await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit(reply)) => {
                        exit_reply = Some(reply);
                        break;
                    }
                    Err(payload) => {
                        error!(
                            player = %io.name(),
                            error = %PlayerError::from_panic(payload),
                            "command handling panicked"
                        );
                    }
                }
            }

            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                next_tick = None;
                let ticked = AssertUnwindSafe(io.tick())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(PlayerError::from_panic(payload)));
                if let Err(e) = ticked {
                    error!(
                        player = %io.name(),
                        tick = io.player().tick() + 1,
                        error = %e,
                        "tick failed"
                    );
                }
            }
        }

        // Only a running, timer-driven player has a next tick. Keep an
        // existing deadline so commands do not postpone it.
        next_tick = match io.player().state() {
            PlayerState::Running if timed => {
                next_tick.or_else(|| Instant::now().checked_add(interval))
            }
            _ => None,
        };
    }

    subscription.unsubscribe();
    io.close();
    if let Some(reply) = exit_reply {
        let _ = reply.send(());
    }
}

async fn apply(io: &mut IoPlayer, command: Command) -> Flow {
    match command {
        Command::Inbound { message, reply } => {
            let ack = io.handle(message).await;
            let _ = reply.send(ack);
        }
        Command::Step { reply } => {
            let result = match io.tick().await {
                Ok(()) => Ok(io.frame()),
                Err(e) => Err(e),
            };
            let _ = reply.send(result);
        }
        Command::Frame { reply } => {
            let _ = reply.send(io.frame());
        }
        Command::Status { reply } => {
            let player = io.player();
            let _ = reply.send(PlayerStatus {
                state: player.state(),
                tick: player.tick(),
                elapsed: player.elapsed(),
            });
        }
        Command::Shutdown { reply } => return Flow::Exit(reply),
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use sim_bus::{AckStatus, OutboundMessage};
    use sim_system::system_fn;

    use super::*;
    use crate::config::PlayerConfig;
    use crate::player::Player;

    fn spawn(config: PlayerConfig) -> (PlayerHandle, Bus<InboundMessage>, Arc<Mutex<Vec<OutboundMessage>>>) {
        let inbound = Bus::new();
        let outbound = Bus::new();
        let seen: Arc<Mutex<Vec<OutboundMessage>>> = Arc::default();
        let sink = Arc::clone(&seen);
        outbound.subscribe(move |msg: OutboundMessage| {
            sink.lock().unwrap().push(msg);
            async { Ok(()) }
        });

        let mut player = Player::new(config).unwrap();
        player
            .register_system(Box::new(system_fn("noop", |_ctx| Ok(()))), 0)
            .unwrap();
        let mut io = IoPlayer::new("runtime-test", player, outbound);
        io.register_lifecycle_handlers().unwrap();
        (io.spawn(&inbound), inbound, seen)
    }

    fn frame_ticks(seen: &Mutex<Vec<OutboundMessage>>) -> Vec<u64> {
        seen.lock()
            .unwrap()
            .iter()
            .filter_map(|m| m.as_frame().map(|f| f.tick))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_while_running() {
        let (handle, _inbound, seen) =
            spawn(PlayerConfig::default().with_tick_rate(10.0));

        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.state, PlayerState::Running);
        assert_eq!(status.tick, 3);

        handle.pause().await.unwrap();
        let paused_at = handle.status().await.unwrap().tick;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.status().await.unwrap().tick, paused_at);

        // Frames: start ack frame (tick 0), ticks 1..=3, pause ack frame.
        let ticks = frame_ticks(&seen);
        assert_eq!(ticks, vec![0, 1, 2, 3, paused_at]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_schedule_never_ticks_on_its_own() {
        let (handle, _inbound, _seen) = spawn(PlayerConfig::default().manual());
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.status().await.unwrap().tick, 0);

        let frame = handle.step().await.unwrap();
        assert_eq!(frame.tick, 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_inbound_bus_reaches_player() {
        let (handle, inbound, seen) = spawn(PlayerConfig::default().manual());
        let delivery = inbound
            .publish(InboundMessage::new("start", Value::Null).with_id("bus-1"))
            .await
            .unwrap();
        assert!(delivery.acknowledged);

        // The publish resolved only after the acknowledgement went out.
        let first = seen.lock().unwrap()[0].clone();
        let ack = first.as_acknowledgement().unwrap();
        assert_eq!(ack.message_id, "bus-1");
        assert_eq!(ack.status, AckStatus::Success);
        assert_eq!(handle.status().await.unwrap().state, PlayerState::Running);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_player_and_detaches() {
        let (handle, inbound, _seen) = spawn(PlayerConfig::default().manual());
        handle.start().await.unwrap();
        handle.shutdown().await.unwrap();

        assert_eq!(inbound.subscriber_count(), 0);
        assert!(matches!(
            handle.status().await,
            Err(PlayerError::Closed(name)) if name == "runtime-test"
        ));
    }
}
