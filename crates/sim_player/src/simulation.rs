//! The simulation player: a live scheduler controlled by commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use sim_bus::{Acknowledgement, Bus, InboundMessage, OutboundMessage, message_types};
use sim_ecs::{EntityId, World};
use sim_system::System;

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::filter::FrameFilter;
use crate::io::IoPlayer;
use crate::operation::{MessageHandler, Operation, OperationContext};
use crate::ops::parse_payload;
use crate::player::Player;
use crate::resolver::SystemResolver;
use crate::runtime::PlayerHandle;

// ── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct InjectSystemPayload {
    system: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    options: Value,
}

#[derive(Debug, Deserialize)]
struct EjectSystemPayload {
    system: String,
}

#[derive(Debug, Deserialize)]
struct InjectEntityPayload {
    #[serde(default)]
    id: Option<EntityId>,
    #[serde(default)]
    components: BTreeMap<String, Value>,
}

// ── Operations ──────────────────────────────────────────────────────────────

/// `inject-system`: resolve a system reference and register it live.
pub struct InjectSystem {
    resolver: Arc<dyn SystemResolver>,
}

impl Operation for InjectSystem {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        let request: InjectSystemPayload = parse_payload(message_types::INJECT_SYSTEM, payload)?;
        let system = self.resolver.resolve(&request.system, &request.options)?;
        ctx.player.register_system(system, request.priority)?;
        Ok(ctx.success())
    }
}

/// `eject-system`: unregister a system. An unknown id is declined with a
/// negative acknowledgement.
#[derive(Debug, Clone, Copy)]
pub struct EjectSystem;

impl Operation for EjectSystem {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        let request: EjectSystemPayload = parse_payload(message_types::EJECT_SYSTEM, payload)?;
        if ctx.player.unregister_system(&request.system)? {
            Ok(ctx.success())
        } else {
            Ok(Acknowledgement::negative(
                ctx.message_id(),
                format!("System not found: {}", request.system),
            ))
        }
    }
}

/// `inject-entity`: create an entity with components. Either every
/// component attaches or the entity is not created.
#[derive(Debug, Clone, Copy)]
pub struct InjectEntity;

impl Operation for InjectEntity {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        let request: InjectEntityPayload = parse_payload(message_types::INJECT_ENTITY, payload)?;
        let world = ctx.player.world_mut();
        let entity = world.create(request.id)?;
        for (component, value) in request.components {
            if let Err(e) = world.attach(&entity, &component, Some(value)) {
                world.destroy(&entity);
                return Err(e.into());
            }
        }
        Ok(ctx.success().with_detail(entity.to_string()))
    }
}

// ── Player ──────────────────────────────────────────────────────────────────

/// A player whose scheduler is driven by `start`, `pause`, `stop`,
/// `inject-system`, `eject-system` and `inject-entity` commands.
#[derive(Debug)]
pub struct SimulationPlayer {
    io: IoPlayer,
}

impl SimulationPlayer {
    pub const NAME: &'static str = "simulation";

    /// Create an idle simulation with an empty world.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] for an invalid configuration.
    pub fn new(
        config: PlayerConfig,
        outbound: Bus<OutboundMessage>,
        resolver: Arc<dyn SystemResolver>,
    ) -> Result<Self, PlayerError> {
        Self::with_world(config, World::new(), outbound, resolver)
    }

    /// Create an idle simulation around a prepared world.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] for an invalid configuration.
    pub fn with_world(
        config: PlayerConfig,
        world: World,
        outbound: Bus<OutboundMessage>,
        resolver: Arc<dyn SystemResolver>,
    ) -> Result<Self, PlayerError> {
        let player = Player::with_world(config, world)?;
        let mut io = IoPlayer::new(Self::NAME, player, outbound);
        io.register_lifecycle_handlers()?;
        io.register_handler(
            message_types::INJECT_SYSTEM,
            MessageHandler::single(InjectSystem { resolver }),
        )?;
        io.register_handler(message_types::EJECT_SYSTEM, MessageHandler::single(EjectSystem))?;
        io.register_handler(message_types::INJECT_ENTITY, MessageHandler::single(InjectEntity))?;
        Ok(Self { io })
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FrameFilter) -> Self {
        self.io = self.io.with_filter(filter);
        self
    }

    /// Register a system before the player is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::System`] if the id is already taken.
    pub fn register_system(&mut self, system: Box<dyn System>, priority: i32) -> Result<(), PlayerError> {
        self.io.player_mut().register_system(system, priority)
    }

    #[must_use]
    pub fn io(&self) -> &IoPlayer {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IoPlayer {
        &mut self.io
    }

    /// Move the simulation onto its own task, listening on `inbound`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(self, inbound: &Bus<InboundMessage>) -> PlayerHandle {
        self.io.spawn(inbound)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use sim_bus::AckStatus;
    use sim_ecs::ComponentType;
    use sim_system::system_fn;

    use super::*;
    use crate::player::PlayerState;
    use crate::resolver::SystemCatalog;

    struct Harness {
        inbound: Bus<InboundMessage>,
        handle: PlayerHandle,
        seen: Arc<Mutex<Vec<OutboundMessage>>>,
    }

    impl Harness {
        fn new(catalog: SystemCatalog, world: World) -> Self {
            let inbound = Bus::new();
            let outbound = Bus::new();
            let seen: Arc<Mutex<Vec<OutboundMessage>>> = Arc::default();
            let sink = Arc::clone(&seen);
            outbound.subscribe(move |msg: OutboundMessage| {
                sink.lock().unwrap().push(msg);
                async { Ok(()) }
            });
            let sim = SimulationPlayer::with_world(
                PlayerConfig::default().with_fixed_delta(0.1).manual(),
                world,
                outbound,
                Arc::new(catalog),
            )
            .unwrap();
            let handle = sim.spawn(&inbound);
            Self {
                inbound,
                handle,
                seen,
            }
        }

        async fn send(&self, id: &str, kind: &str, payload: Value) {
            self.inbound
                .publish(InboundMessage::new(kind, payload).with_id(id))
                .await
                .unwrap();
        }

        fn acks(&self) -> Vec<Acknowledgement> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter_map(|m| m.as_acknowledgement().cloned())
                .collect()
        }

        fn last_ack(&self) -> Acknowledgement {
            self.acks().pop().unwrap()
        }
    }

    fn counting_catalog(updates: &Arc<AtomicUsize>) -> SystemCatalog {
        let updates = Arc::clone(updates);
        SystemCatalog::new().with("counter", move |_options| {
            let updates = Arc::clone(&updates);
            Ok(Box::new(system_fn("counter", move |_ctx| {
                updates.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })))
        })
    }

    #[tokio::test]
    async fn test_lifecycle_commands_each_acknowledged_once() {
        let h = Harness::new(SystemCatalog::new(), World::new());
        h.send("m-1", "start", Value::Null).await;
        h.send("m-2", "pause", Value::Null).await;
        h.send("m-3", "start", Value::Null).await;
        h.send("m-4", "stop", Value::Null).await;

        let acks = h.acks();
        let ids: Vec<&str> = acks.iter().map(|a| a.message_id.as_str()).collect();
        assert_eq!(ids, vec!["m-1", "m-2", "m-3", "m-4"]);
        assert!(acks.iter().all(|a| a.status == AckStatus::Success));
    }

    #[tokio::test]
    async fn test_unknown_message_type() {
        let h = Harness::new(SystemCatalog::new(), World::new());
        h.send("m-1", "unknown", Value::Null).await;

        let acks = h.acks();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].status, AckStatus::Error);
        assert!(
            acks[0]
                .detail
                .as_deref()
                .unwrap()
                .contains("Unsupported message type: unknown")
        );
    }

    #[tokio::test]
    async fn test_inject_system_runs_on_next_step() {
        let updates = Arc::new(AtomicUsize::new(0));
        let h = Harness::new(counting_catalog(&updates), World::new());

        h.send("m-1", "inject-system", json!({ "system": "counter", "priority": 3 }))
            .await;
        assert_eq!(h.last_ack().status, AckStatus::Success);
        assert_eq!(updates.load(Ordering::SeqCst), 0);

        h.handle.step().await.unwrap();
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inject_duplicate_or_unknown_system_is_error() {
        let updates = Arc::new(AtomicUsize::new(0));
        let h = Harness::new(counting_catalog(&updates), World::new());

        h.send("m-1", "inject-system", json!({ "system": "counter" })).await;
        h.send("m-2", "inject-system", json!({ "system": "counter" })).await;
        let ack = h.last_ack();
        assert_eq!(ack.status, AckStatus::Error);
        assert!(ack.detail.unwrap().contains("already registered"));

        h.send("m-3", "inject-system", json!({ "system": "gravity" })).await;
        assert_eq!(
            h.last_ack().detail.as_deref(),
            Some("System not found: gravity")
        );

        h.send("m-4", "inject-system", json!({ "priority": 1 })).await;
        assert_eq!(h.last_ack().status, AckStatus::Error);
    }

    #[tokio::test]
    async fn test_eject_system() {
        let updates = Arc::new(AtomicUsize::new(0));
        let h = Harness::new(counting_catalog(&updates), World::new());

        h.send("m-1", "eject-system", json!({ "system": "missing" })).await;
        let ack = h.last_ack();
        assert_eq!(ack.status, AckStatus::Negative);
        assert_eq!(ack.detail.as_deref(), Some("System not found: missing"));

        h.send("m-2", "inject-system", json!({ "system": "counter" })).await;
        h.handle.step().await.unwrap();
        h.send("m-3", "eject-system", json!({ "system": "counter" })).await;
        assert_eq!(h.last_ack().status, AckStatus::Success);
        h.handle.step().await.unwrap();
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inject_entity() {
        let mut world = World::new();
        world
            .register_type(ComponentType::new("position").with_defaults(json!({ "x": 0, "y": 0 })))
            .unwrap();
        let h = Harness::new(SystemCatalog::new(), world);

        h.send(
            "m-1",
            "inject-entity",
            json!({ "id": "ship", "components": { "position": { "x": 5 } } }),
        )
        .await;
        let ack = h.last_ack();
        assert_eq!(ack.status, AckStatus::Success);
        assert_eq!(ack.detail.as_deref(), Some("ship"));

        let frame = h.handle.frame().await.unwrap();
        let ship = frame.entity(&EntityId::from("ship")).unwrap();
        assert_eq!(ship.components["position"], json!({ "x": 5, "y": 0 }));
    }

    #[tokio::test]
    async fn test_inject_entity_rolls_back_on_unknown_component() {
        let h = Harness::new(SystemCatalog::new(), World::new());
        h.send(
            "m-1",
            "inject-entity",
            json!({ "id": "ghost", "components": { "mass": 1 } }),
        )
        .await;
        assert_eq!(h.last_ack().status, AckStatus::Error);
        assert!(h.handle.frame().await.unwrap().entities.is_empty());
    }

    #[tokio::test]
    async fn test_stop_clears_entities_and_tick() {
        let mut world = World::new();
        world.register_type(ComponentType::new("tag")).unwrap();
        let h = Harness::new(SystemCatalog::new(), world);

        h.send("m-1", "inject-entity", json!({ "components": { "tag": true } })).await;
        h.send("m-2", "start", Value::Null).await;
        h.handle.step().await.unwrap();
        h.send("m-3", "stop", Value::Null).await;

        let frame = h.handle.frame().await.unwrap();
        assert_eq!(frame.tick, 0);
        assert!(frame.entities.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_system_does_not_silence_player() {
        let catalog = SystemCatalog::new().with("faulty", |_options| {
            Ok(Box::new(system_fn("faulty", |_ctx| panic!("plugin bug"))))
        });
        let h = Harness::new(catalog, World::new());

        h.send("m-1", "inject-system", json!({ "system": "faulty" })).await;
        let err = h.handle.step().await.unwrap_err();
        assert!(matches!(&err, PlayerError::Panicked(message) if message == "plugin bug"));

        h.send("m-2", "start", Value::Null).await;
        let acks: Vec<(String, AckStatus)> = h
            .acks()
            .into_iter()
            .map(|a| (a.message_id, a.status))
            .collect();
        assert_eq!(
            acks,
            vec![
                ("m-1".to_string(), AckStatus::Success),
                ("m-2".to_string(), AckStatus::Success),
            ]
        );

        let status = h.handle.status().await.unwrap();
        assert_eq!(status.state, PlayerState::Running);
        assert_eq!(status.tick, 0);
    }
}
