//! Lifecycle operations shared by every player: `start`, `pause`, `stop`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use sim_bus::Acknowledgement;

use crate::error::PlayerError;
use crate::operation::{Operation, OperationContext};

/// Deserialize a command payload, reporting shape errors against `kind`.
pub(crate) fn parse_payload<T: DeserializeOwned>(kind: &str, payload: &Value) -> Result<T, PlayerError> {
    T::deserialize(payload).map_err(|e| PlayerError::invalid_payload(kind, e))
}

/// `start`: move to running, initialising systems on the first start.
#[derive(Debug, Clone, Copy)]
pub struct Start;

impl Operation for Start {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        ctx.player.start()?;
        Ok(ctx.success())
    }
}

/// `pause`: stop scheduling ticks. Pausing a player that is not running
/// succeeds without changing anything.
#[derive(Debug, Clone, Copy)]
pub struct Pause;

impl Operation for Pause {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        let state = ctx.player.state();
        if ctx.player.pause() {
            Ok(ctx.success())
        } else {
            Ok(ctx.success().with_detail(format!("player is {state}, nothing to pause")))
        }
    }
}

/// `stop`: shut systems down, clear the world and return to idle.
#[derive(Debug, Clone, Copy)]
pub struct Stop;

impl Operation for Stop {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        _payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        ctx.player.stop()?;
        Ok(ctx.success())
    }
}
