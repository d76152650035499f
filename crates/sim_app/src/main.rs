//! # sim_app — local simulation host
//!
//! Runs a simulation player on its own task, drives it through its inbound
//! bus and logs everything it publishes. With `--evaluate` the simulation's
//! frames are piped into an evaluation player as well.
//!
//! ## Startup Sequence
//!
//! 1. Build the player configuration from `--config` or the tick flags.
//! 2. Spawn the simulation (and evaluation) players.
//! 3. Inject the `time` and `motion` systems and `--bodies` bodies.
//! 4. Start ticking until `--ticks` is reached or Ctrl-C is pressed.

mod motion;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use sim_bus::{Bus, InboundMessage, Outbound, OutboundMessage, Subscription, message_types};
use sim_ecs::World;
use sim_player::{
    EvaluationPlayer, PlayerConfig, PlayerHandle, ScheduleMode, SimulationPlayer, SystemCatalog,
    ingested_frames, pipe_frames,
};
use sim_system::{TimeSystem, system_fn};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use motion::{MotionSystem, body_type};

#[derive(Parser)]
#[command(name = "sim_app", about = "Run a simulation player locally")]
struct Args {
    /// Milliseconds between ticks
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Fixed simulated seconds per tick instead of the nominal interval
    #[arg(long)]
    fixed_delta: Option<f64>,

    /// Stop after this many ticks (0 runs until Ctrl-C)
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// Pipe frames into an evaluation player
    #[arg(long)]
    evaluate: bool,

    /// Number of bodies to inject
    #[arg(long, default_value_t = 3)]
    bodies: usize,

    /// Gravity passed to the motion system
    #[arg(long, default_value_t = -9.81, allow_hyphen_values = true)]
    gravity: f64,

    /// JSON player configuration; overrides `--tick-ms`
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sim_app=info".parse()?))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        tick_rate = config.tick_rate,
        delta = ?config.delta,
        schedule = ?config.schedule,
        "player configuration loaded"
    );

    let catalog = SystemCatalog::new()
        .with(TimeSystem::ID, |_| Ok(Box::new(TimeSystem::new())))
        .with(MotionSystem::ID, |options| {
            Ok(Box::new(MotionSystem::from_options(options)?))
        });
    info!(systems = ?catalog.references(), "system catalog ready");

    let mut world = World::new();
    world.register_type(body_type())?;

    let sim_in = Bus::new();
    let sim_out = Bus::new();
    let sim_log = log_outbound(SimulationPlayer::NAME, &sim_out);
    let sim = SimulationPlayer::with_world(config.clone(), world, sim_out.clone(), Arc::new(catalog))?
        .spawn(&sim_in);

    let evaluation = if args.evaluate {
        Some(spawn_evaluation(config.clone(), &sim_out).await?)
    } else {
        None
    };

    send(&sim_in, message_types::INJECT_SYSTEM, json!({ "system": TimeSystem::ID, "priority": -10 }))
        .await?;
    send(
        &sim_in,
        message_types::INJECT_SYSTEM,
        json!({ "system": MotionSystem::ID, "options": { "gravity": args.gravity } }),
    )
    .await?;
    for i in 0..args.bodies {
        let offset = i as f64;
        send(
            &sim_in,
            message_types::INJECT_ENTITY,
            json!({ "components": { "body": { "x": offset, "y": 10.0 + offset, "vx": 1.0 } } }),
        )
        .await?;
    }

    sim.start().await?;
    info!(ticks = args.ticks, "simulation running");

    let poll = config.tick_interval().max(Duration::from_millis(1));
    let manual = config.schedule == ScheduleMode::Manual;
    tokio::select! {
        result = wait_for_ticks(&sim, args.ticks, poll, manual) => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    let status = sim.status().await?;
    info!(tick = status.tick, elapsed = status.elapsed, "simulation finished");

    if let Some((handle, wire)) = evaluation {
        wire.unsubscribe();
        let frames = handle.frame().await?.entities.len();
        info!(frames, "evaluation ingested frames");
        handle.shutdown().await?;
    }

    sim.stop().await?;
    sim.shutdown().await?;
    sim_log.unsubscribe();

    info!("sim_app shut down");
    Ok(())
}

fn load_config(args: &Args) -> Result<PlayerConfig> {
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => PlayerConfig::default().with_tick_rate(1000.0 / args.tick_ms as f64),
    };
    let config = match args.fixed_delta {
        Some(seconds) => config.with_fixed_delta(seconds),
        None => config,
    };
    config.validate()?;
    Ok(config)
}

async fn spawn_evaluation(
    config: PlayerConfig,
    sim_out: &Bus<OutboundMessage>,
) -> Result<(PlayerHandle, Subscription)> {
    let eval_in = Bus::new();
    let eval_out = Bus::new();
    log_outbound(EvaluationPlayer::NAME, &eval_out);

    let mut evaluation = EvaluationPlayer::new(config, eval_out)?;
    evaluation.register_system(
        Box::new(system_fn("frame-stats", |ctx| {
            let frames = ingested_frames(ctx.world);
            if let Some((_, last)) = frames.last() {
                debug!(frames = frames.len(), last_tick = last.tick, "evaluation pass");
            }
            Ok(())
        })),
        0,
    )?;

    let handle = evaluation.spawn(&eval_in);
    handle.start().await?;
    let wire = pipe_frames(sim_out, eval_in);
    Ok((handle, wire))
}

async fn send(bus: &Bus<InboundMessage>, kind: &str, payload: serde_json::Value) -> Result<()> {
    let delivery = bus.publish(InboundMessage::new(kind, payload)).await?;
    if !delivery.acknowledged {
        warn!(kind, "no player listening");
    }
    Ok(())
}

/// Poll the player until it has run `ticks` ticks. A manually scheduled
/// player is stepped once per poll.
async fn wait_for_ticks(
    handle: &PlayerHandle,
    ticks: u64,
    poll: Duration,
    manual: bool,
) -> Result<()> {
    let mut interval = tokio::time::interval(poll);
    loop {
        interval.tick().await;
        if manual {
            handle.step().await?;
        }
        let status = handle.status().await?;
        if ticks > 0 && status.tick >= ticks {
            return Ok(());
        }
    }
}

fn log_outbound(player: &'static str, bus: &Bus<OutboundMessage>) -> Subscription {
    bus.subscribe(move |message: OutboundMessage| async move {
        match &message.body {
            Outbound::Acknowledgement(ack) if ack.is_error() => {
                warn!(player, message_id = %ack.message_id, detail = ?ack.detail, "command failed");
            }
            Outbound::Acknowledgement(ack) => {
                info!(player, message_id = %ack.message_id, status = ?ack.status, "command acknowledged");
            }
            Outbound::Frame(frame) => {
                debug!(player, tick = frame.tick, entities = frame.entities.len(), "frame published");
            }
        }
        Ok(())
    })
}
