//! Player configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// How the delta time of each tick is computed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaMode {
    /// Every tick advances by the nominal tick interval.
    #[default]
    Nominal,
    /// Every tick advances by exactly this many seconds.
    Fixed(f64),
    /// Every tick advances by the wall-clock time since the previous tick.
    /// The first tick after a start uses the nominal interval.
    WallClock,
}

/// What drives ticks while the player is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleMode {
    /// A timer fires every tick interval.
    #[default]
    Timer,
    /// Ticks only happen through explicit steps.
    Manual,
}

/// Configuration for a player's tick loop.
///
/// Deserialisable from JSON so a host can load it from a file:
///
/// ```json
/// { "tickRate": 30.0, "delta": { "fixed": 0.05 }, "schedule": "manual" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    pub delta: DeltaMode,
    pub schedule: ScheduleMode,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            delta: DeltaMode::Nominal,
            schedule: ScheduleMode::Timer,
        }
    }
}

impl PlayerConfig {
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    #[must_use]
    pub fn with_fixed_delta(mut self, seconds: f64) -> Self {
        self.delta = DeltaMode::Fixed(seconds);
        self
    }

    #[must_use]
    pub fn with_wall_clock(mut self) -> Self {
        self.delta = DeltaMode::WallClock;
        self
    }

    /// Only tick through explicit steps.
    #[must_use]
    pub fn manual(mut self) -> Self {
        self.schedule = ScheduleMode::Manual;
        self
    }

    /// Time between two scheduled ticks. A rate too small to express as a
    /// [`Duration`] yields [`Duration::MAX`], which never comes due.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.tick_rate).unwrap_or(Duration::MAX)
    }

    /// Check that the configuration can drive a player.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] for a non-positive tick rate, a rate
    /// whose interval does not fit a [`Duration`], or a negative fixed delta.
    pub fn validate(&self) -> Result<(), PlayerError> {
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            return Err(PlayerError::Config(format!(
                "tick rate must be a positive number, got {}",
                self.tick_rate
            )));
        }
        if Duration::try_from_secs_f64(1.0 / self.tick_rate).is_err() {
            return Err(PlayerError::Config(format!(
                "tick rate {} is too small to schedule",
                self.tick_rate
            )));
        }
        if let DeltaMode::Fixed(delta) = self.delta {
            if !(delta.is_finite() && delta >= 0.0) {
                return Err(PlayerError::Config(format!(
                    "fixed delta must be a non-negative number, got {delta}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.tick_rate, 60.0);
        assert_eq!(config.delta, DeltaMode::Nominal);
        assert_eq!(config.schedule, ScheduleMode::Timer);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tick_interval() {
        let config = PlayerConfig::default().with_tick_rate(20.0);
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PlayerConfig::default().with_tick_rate(0.0).validate().is_err());
        assert!(PlayerConfig::default().with_tick_rate(f64::INFINITY).validate().is_err());
        assert!(PlayerConfig::default().with_fixed_delta(-0.1).validate().is_err());
    }

    #[test]
    fn test_tiny_tick_rate_rejected() {
        let config = PlayerConfig::default().with_tick_rate(1e-320);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too small to schedule"));
        assert_eq!(config.tick_interval(), Duration::MAX);
        assert!(Player::new(config).is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: PlayerConfig = serde_json::from_str(
            r#"{ "tickRate": 30.0, "delta": { "fixed": 0.05 }, "schedule": "manual" }"#,
        )
        .unwrap();
        assert_eq!(config.tick_rate, 30.0);
        assert_eq!(config.delta, DeltaMode::Fixed(0.05));
        assert_eq!(config.schedule, ScheduleMode::Manual);

        let config: PlayerConfig = serde_json::from_str(r#"{ "delta": "wall-clock" }"#).unwrap();
        assert_eq!(config.delta, DeltaMode::WallClock);
        assert_eq!(config.tick_rate, 60.0);
    }
}
