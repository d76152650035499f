//! Demo system: bodies fall under gravity and bounce off the floor at `y = 0`.

use anyhow::ensure;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sim_ecs::ComponentType;
use sim_system::{System, SystemContext};

/// Component type id of a moving body.
pub const BODY: &str = "body";

/// The `body` component type; every field defaults to zero.
pub fn body_type() -> ComponentType {
    ComponentType::new(BODY).with_defaults(json!({ "x": 0.0, "y": 0.0, "vx": 0.0, "vy": 0.0 }))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MotionOptions {
    /// Vertical acceleration in units per second squared.
    pub gravity: f64,
    /// Fraction of vertical speed kept after a bounce, in `[0, 1]`.
    pub restitution: f64,
}

impl Default for MotionOptions {
    fn default() -> Self {
        Self {
            gravity: -9.81,
            restitution: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

#[derive(Debug)]
pub struct MotionSystem {
    options: MotionOptions,
}

impl MotionSystem {
    pub const ID: &'static str = "motion";

    pub fn new(options: MotionOptions) -> Self {
        Self { options }
    }

    /// Build from `inject-system` options; `null` selects the defaults.
    pub fn from_options(options: &Value) -> anyhow::Result<Self> {
        let options = if options.is_null() {
            MotionOptions::default()
        } else {
            MotionOptions::deserialize(options)?
        };
        ensure!(
            (0.0..=1.0).contains(&options.restitution),
            "restitution must be within [0, 1], got {}",
            options.restitution
        );
        Ok(Self::new(options))
    }
}

impl System for MotionSystem {
    fn id(&self) -> &str {
        Self::ID
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        let dt = ctx.delta_time;
        for id in ctx.world.entities_with_type(BODY)? {
            let Some(value) = ctx.world.get(&id, BODY) else {
                continue;
            };
            let mut body = Body::deserialize(value)?;
            body.vy += self.options.gravity * dt;
            body.x += body.vx * dt;
            body.y += body.vy * dt;
            if body.y < 0.0 {
                body.y = -body.y;
                body.vy = -body.vy * self.options.restitution;
            }
            ctx.world.set(&id, BODY, serde_json::to_value(body)?)?;
        }
        Ok(())
    }
}
