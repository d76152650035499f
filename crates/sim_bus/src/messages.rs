//! Message envelopes exchanged with a player.
//!
//! Inbound commands and outbound responses share the `{id, type, payload}`
//! envelope shape. Outbound payloads are either an [`Acknowledgement`]
//! correlated with one inbound message, or a [`Frame`] snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sim_ecs::EntityId;

/// Well-known message type strings.
pub mod message_types {
    pub const START: &str = "start";
    pub const PAUSE: &str = "pause";
    pub const STOP: &str = "stop";
    pub const INJECT_SYSTEM: &str = "inject-system";
    pub const EJECT_SYSTEM: &str = "eject-system";
    pub const INJECT_ENTITY: &str = "inject-entity";
    pub const INGEST_FRAME: &str = "ingest-frame";

    pub const ACKNOWLEDGEMENT: &str = "acknowledgement";
    pub const FRAME: &str = "frame";
}

/// Anything routable by type and metadata, so predicates can filter it.
pub trait Envelope: Clone + Send + Sync + 'static {
    fn message_type(&self) -> &str;

    fn metadata(&self, _key: &str) -> Option<&Value> {
        None
    }
}

// ── Inbound ─────────────────────────────────────────────────────────────────

/// A command sent to a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Caller-supplied correlation token, echoed in the acknowledgement.
    pub id: String,
    /// Message type, selecting the handler (`start`, `inject-system`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Command arguments; `null` when the command takes none.
    #[serde(default)]
    pub payload: Value,
    /// Free-form annotations used for routing and filtering.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl InboundMessage {
    /// Create a message with a fresh random id.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            payload,
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl Envelope for InboundMessage {
    fn message_type(&self) -> &str {
        &self.kind
    }

    fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

// ── Acknowledgements ────────────────────────────────────────────────────────

/// Outcome of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// The command was applied.
    Success,
    /// The command was understood but declined (for example, an unknown
    /// system id on eject).
    Negative,
    /// The command failed.
    Error,
}

/// The single response correlated to one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgement {
    /// Id of the inbound message this acknowledges.
    pub message_id: String,
    pub status: AckStatus,
    /// Human-readable reason or result, e.g. the error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Acknowledgement {
    pub fn success(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            status: AckStatus::Success,
            detail: None,
        }
    }

    pub fn negative(message_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            status: AckStatus::Negative,
            detail: Some(detail.into()),
        }
    }

    pub fn error(message_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            status: AckStatus::Error,
            detail: Some(detail.into()),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == AckStatus::Error
    }
}

// ── Frames ──────────────────────────────────────────────────────────────────

/// One entity and all of its component payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    /// Component payloads keyed by component type id.
    pub components: BTreeMap<String, Value>,
}

/// Snapshot of a player's world after a tick or a command.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    /// Number of completed ticks when the snapshot was taken.
    pub tick: u64,
    /// Every entity, in creation order.
    pub entities: Vec<EntitySnapshot>,
    /// `elapsed` and `deltaTime` of the most recent tick.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Frame {
    /// Find an entity snapshot by id.
    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| &e.id == id)
    }
}

// ── Outbound ────────────────────────────────────────────────────────────────

/// Payload of an outbound message, tagged by its type string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Outbound {
    Acknowledgement(Acknowledgement),
    Frame(Frame),
}

/// A response published by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Fresh id of this outbound message.
    pub id: String,
    #[serde(flatten)]
    pub body: Outbound,
}

impl OutboundMessage {
    pub fn acknowledgement(ack: Acknowledgement) -> Self {
        Self::from(Outbound::Acknowledgement(ack))
    }

    pub fn frame(frame: Frame) -> Self {
        Self::from(Outbound::Frame(frame))
    }

    #[must_use]
    pub fn as_acknowledgement(&self) -> Option<&Acknowledgement> {
        match &self.body {
            Outbound::Acknowledgement(ack) => Some(ack),
            Outbound::Frame(_) => None,
        }
    }

    #[must_use]
    pub fn as_frame(&self) -> Option<&Frame> {
        match &self.body {
            Outbound::Frame(frame) => Some(frame),
            Outbound::Acknowledgement(_) => None,
        }
    }
}

impl From<Outbound> for OutboundMessage {
    fn from(body: Outbound) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            body,
        }
    }
}

impl Envelope for OutboundMessage {
    fn message_type(&self) -> &str {
        match self.body {
            Outbound::Acknowledgement(_) => message_types::ACKNOWLEDGEMENT,
            Outbound::Frame(_) => message_types::FRAME,
        }
    }

    fn metadata(&self, key: &str) -> Option<&Value> {
        match &self.body {
            Outbound::Frame(frame) => frame.metadata.get(key),
            Outbound::Acknowledgement(_) => None,
        }
    }
}
