//! Priority-ordered system scheduler.

use sim_ecs::World;
use tracing::{debug, info, warn};

use crate::context::SystemContext;
use crate::error::{HookPhase, SystemError};
use crate::system::System;

struct Entry {
    system: Box<dyn System>,
    priority: i32,
    order: u64,
    initialized: bool,
}

impl Entry {
    fn id(&self) -> &str {
        self.system.id()
    }

    fn run(
        &mut self,
        phase: HookPhase,
        world: &mut World,
        delta_time: f64,
        elapsed_time: f64,
    ) -> Result<(), SystemError> {
        let mut ctx = SystemContext::new(world, delta_time, elapsed_time);
        let result = match phase {
            HookPhase::Initialize => self.system.initialize(&mut ctx),
            HookPhase::Update => self.system.update(&mut ctx),
            HookPhase::Shutdown => self.system.shutdown(&mut ctx),
        };
        result.map_err(|source| SystemError::Hook {
            id: self.id().to_string(),
            phase,
            source,
        })
    }
}

/// Owns the registered systems and runs them once per tick.
///
/// Systems execute in ascending priority; equal priorities keep registration
/// order. Initialisation and teardown always follow registration order
/// (teardown reversed), independent of priority.
#[derive(Default)]
pub struct SystemManager {
    entries: Vec<Entry>,
    next_order: u64,
    elapsed: f64,
}

impl std::fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.ids())
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

impl SystemManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Registration --

    /// Register a system at the given priority (lower runs first).
    ///
    /// The system is not initialised here; that happens on the next
    /// [`initialize_all`](Self::initialize_all) or lazily before its first
    /// update.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::Duplicate`] if the id is already taken.
    pub fn register(&mut self, system: Box<dyn System>, priority: i32) -> Result<(), SystemError> {
        let id = system.id().to_string();
        if self.has(&id) {
            return Err(SystemError::Duplicate(id));
        }

        let order = self.next_order;
        self.next_order += 1;

        // Orders only grow, so equal priorities land after existing ones.
        let at = self.entries.partition_point(|e| e.priority <= priority);
        self.entries.insert(
            at,
            Entry {
                system,
                priority,
                order,
                initialized: false,
            },
        );

        info!(system = %id, priority, "system registered");
        Ok(())
    }

    /// Remove a system, shutting it down first if it was initialised.
    ///
    /// Returns `Ok(false)` if no system has this id. The system is removed
    /// even when its shutdown hook fails; the failure is still reported.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::Hook`] if the shutdown hook fails.
    pub fn unregister(&mut self, id: &str, world: &mut World) -> Result<bool, SystemError> {
        let Some(index) = self.entries.iter().position(|e| e.id() == id) else {
            return Ok(false);
        };
        let mut entry = self.entries.remove(index);
        info!(system = %id, "system unregistered");

        if entry.initialized {
            entry.initialized = false;
            entry.run(HookPhase::Shutdown, world, 0.0, self.elapsed)?;
        }
        Ok(true)
    }

    /// Returns `true` if a system with this id is registered.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id() == id)
    }

    /// Returns system ids in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(Entry::id).collect()
    }

    /// Returns the priority a system was registered with.
    #[must_use]
    pub fn priority_of(&self, id: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|e| e.id() == id)
            .map(|e| e.priority)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Simulated seconds accumulated across updates.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Reset accumulated time to zero.
    pub fn reset_elapsed(&mut self) {
        self.elapsed = 0.0;
    }

    // -- Lifecycle --

    /// Initialise every system that is not yet initialised, in registration
    /// order. Calling it twice is a no-op the second time.
    ///
    /// # Errors
    ///
    /// Stops at the first failing hook and returns [`SystemError::Hook`].
    /// Systems initialised before the failure stay initialised.
    pub fn initialize_all(&mut self, world: &mut World) -> Result<(), SystemError> {
        let elapsed = self.elapsed;
        for index in self.registration_order() {
            let entry = &mut self.entries[index];
            if entry.initialized {
                continue;
            }
            entry.run(HookPhase::Initialize, world, 0.0, elapsed)?;
            entry.initialized = true;
            debug!(system = %entry.id(), "system initialized");
        }
        Ok(())
    }

    /// Shut down every initialised system in reverse registration order.
    ///
    /// Every system is attempted even if one fails, and all of them end up
    /// uninitialised.
    ///
    /// # Errors
    ///
    /// Returns the first [`SystemError::Hook`] encountered.
    pub fn shutdown_all(&mut self, world: &mut World) -> Result<(), SystemError> {
        let elapsed = self.elapsed;
        let mut first_error = None;
        for index in self.registration_order().into_iter().rev() {
            let entry = &mut self.entries[index];
            if !entry.initialized {
                continue;
            }
            entry.initialized = false;
            match entry.run(HookPhase::Shutdown, world, 0.0, elapsed) {
                Ok(()) => debug!(system = %entry.id(), "system shut down"),
                Err(e) => {
                    warn!(system = %entry.id(), error = %e, "system shutdown failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Advance elapsed time by `delta_time` and run every system once in
    /// priority order. Uninitialised systems are initialised just before
    /// their first update.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::NegativeDelta`] without touching elapsed time
    /// for a negative or NaN delta. Otherwise the first failing hook aborts
    /// the remainder of the pass; elapsed time has already advanced.
    pub fn update(&mut self, delta_time: f64, world: &mut World) -> Result<(), SystemError> {
        if delta_time.is_nan() || delta_time < 0.0 {
            return Err(SystemError::NegativeDelta(delta_time));
        }
        self.elapsed += delta_time;
        let elapsed = self.elapsed;

        for entry in &mut self.entries {
            if !entry.initialized {
                entry.run(HookPhase::Initialize, world, 0.0, elapsed)?;
                entry.initialized = true;
            }
            entry.run(HookPhase::Update, world, delta_time, elapsed)?;
        }
        Ok(())
    }

    fn registration_order(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.entries.len()).collect();
        indices.sort_by_key(|&i| self.entries[i].order);
        indices
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::system::system_fn;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        id: String,
        log: Log,
        fail_on: Option<HookPhase>,
    }

    impl Recording {
        fn new(id: &str, log: &Log) -> Box<Self> {
            Box::new(Self {
                id: id.to_string(),
                log: Arc::clone(log),
                fail_on: None,
            })
        }

        fn failing(id: &str, log: &Log, phase: HookPhase) -> Box<Self> {
            Box::new(Self {
                id: id.to_string(),
                log: Arc::clone(log),
                fail_on: Some(phase),
            })
        }

        fn record(&self, phase: HookPhase) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{phase}", self.id));
            if self.fail_on == Some(phase) {
                anyhow::bail!("{} refused to {phase}", self.id);
            }
            Ok(())
        }
    }

    impl System for Recording {
        fn id(&self) -> &str {
            &self.id
        }

        fn initialize(&mut self, _ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
            self.record(HookPhase::Initialize)
        }

        fn update(&mut self, _ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
            self.record(HookPhase::Update)
        }

        fn shutdown(&mut self, _ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
            self.record(HookPhase::Shutdown)
        }
    }

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    #[test]
    fn test_priority_then_registration_order() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("a", &log), 5).unwrap();
        systems.register(Recording::new("b", &log), 0).unwrap();
        systems.register(Recording::new("c", &log), 5).unwrap();

        assert_eq!(systems.ids(), vec!["b", "a", "c"]);

        systems.initialize_all(&mut world).unwrap();
        assert_eq!(
            take(&log),
            vec!["a:initialize", "b:initialize", "c:initialize"]
        );

        systems.update(0.1, &mut world).unwrap();
        assert_eq!(take(&log), vec!["b:update", "a:update", "c:update"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let log = new_log();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("a", &log), 0).unwrap();
        let err = systems.register(Recording::new("a", &log), 1).unwrap_err();
        assert!(matches!(err, SystemError::Duplicate(id) if id == "a"));
        assert_eq!(systems.len(), 1);
        assert_eq!(systems.priority_of("a"), Some(0));
    }

    #[test]
    fn test_negative_delta_leaves_elapsed_untouched() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("a", &log), 0).unwrap();
        systems.update(0.5, &mut world).unwrap();
        take(&log);

        let err = systems.update(-1.0, &mut world).unwrap_err();
        assert!(matches!(err, SystemError::NegativeDelta(_)));
        assert!(systems.update(f64::NAN, &mut world).is_err());
        assert!((systems.elapsed() - 0.5).abs() < f64::EPSILON);
        assert!(take(&log).is_empty());
    }

    #[test]
    fn test_lazy_initialization_on_update() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("late", &log), 0).unwrap();

        systems.update(0.1, &mut world).unwrap();
        systems.update(0.1, &mut world).unwrap();
        assert_eq!(
            take(&log),
            vec!["late:initialize", "late:update", "late:update"]
        );
    }

    #[test]
    fn test_initialize_all_is_idempotent() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("a", &log), 0).unwrap();
        systems.initialize_all(&mut world).unwrap();
        systems.initialize_all(&mut world).unwrap();
        assert_eq!(take(&log), vec!["a:initialize"]);
    }

    #[test]
    fn test_shutdown_all_reverse_registration_order() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("a", &log), 9).unwrap();
        systems.register(Recording::new("b", &log), 0).unwrap();
        systems.register(Recording::new("c", &log), 3).unwrap();
        systems.initialize_all(&mut world).unwrap();
        take(&log);

        systems.shutdown_all(&mut world).unwrap();
        assert_eq!(
            take(&log),
            vec!["c:shutdown", "b:shutdown", "a:shutdown"]
        );

        // A second shutdown touches nothing; the next update re-initialises.
        systems.shutdown_all(&mut world).unwrap();
        assert!(take(&log).is_empty());
        systems.update(0.0, &mut world).unwrap();
        assert_eq!(take(&log)[0], "b:initialize");
    }

    #[test]
    fn test_shutdown_all_attempts_every_system() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("a", &log), 0).unwrap();
        systems
            .register(Recording::failing("b", &log, HookPhase::Shutdown), 0)
            .unwrap();
        systems.initialize_all(&mut world).unwrap();
        take(&log);

        let err = systems.shutdown_all(&mut world).unwrap_err();
        assert!(matches!(err, SystemError::Hook { ref id, .. } if id == "b"));
        assert_eq!(take(&log), vec!["b:shutdown", "a:shutdown"]);
    }

    #[test]
    fn test_unregister_shuts_down_initialized_system() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("a", &log), 0).unwrap();
        systems.register(Recording::new("b", &log), 0).unwrap();
        systems.initialize_all(&mut world).unwrap();
        take(&log);

        assert!(systems.unregister("a", &mut world).unwrap());
        assert_eq!(take(&log), vec!["a:shutdown"]);
        assert!(!systems.has("a"));
        assert!(!systems.unregister("a", &mut world).unwrap());
        assert!(!systems.unregister("missing", &mut world).unwrap());
    }

    #[test]
    fn test_unregister_skips_shutdown_when_never_initialized() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Recording::new("a", &log), 0).unwrap();
        assert!(systems.unregister("a", &mut world).unwrap());
        assert!(take(&log).is_empty());
    }

    #[test]
    fn test_update_failure_aborts_remaining_systems() {
        let log = new_log();
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems
            .register(Recording::failing("first", &log, HookPhase::Update), 0)
            .unwrap();
        systems.register(Recording::new("second", &log), 1).unwrap();

        let err = systems.update(0.25, &mut world).unwrap_err();
        match err {
            SystemError::Hook { id, phase, source } => {
                assert_eq!(id, "first");
                assert_eq!(phase, HookPhase::Update);
                assert_eq!(source.to_string(), "first refused to update");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(take(&log), vec!["first:initialize", "first:update"]);
        assert!((systems.elapsed() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_closure_system_sees_world_and_time() {
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems
            .register(
                Box::new(system_fn("spawner", |ctx| {
                    assert!(ctx.elapsed_time >= ctx.delta_time);
                    ctx.world.create(None)?;
                    Ok(())
                })),
                0,
            )
            .unwrap();

        systems.update(0.1, &mut world).unwrap();
        systems.update(0.1, &mut world).unwrap();
        assert_eq!(world.all().len(), 2);
        assert!((systems.elapsed() - 0.2).abs() < 1e-9);

        systems.reset_elapsed();
        assert_eq!(systems.elapsed(), 0.0);
    }
}
