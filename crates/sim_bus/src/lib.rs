//! # sim_bus
//!
//! The message plumbing between a player and the outside world.
//!
//! - [`Bus`] — generic in-process publish/subscribe channel. Every matching
//!   subscriber is invoked for every publish; failures are collected and
//!   reported to the publisher afterwards.
//! - [`Predicate`] plus [`match_type`], [`match_any_type`] and
//!   [`match_metadata`] — subscription filters.
//! - [`InboundMessage`] / [`OutboundMessage`] — the command and response
//!   envelopes, with [`Acknowledgement`] and [`Frame`] payloads.
//! - [`codec`] — MessagePack and JSON helpers for transports.
//!
//! ## Usage
//!
//! ```rust
//! use sim_bus::{Bus, InboundMessage, match_type};
//!
//! futures::executor::block_on(async {
//!     let bus: Bus<InboundMessage> = Bus::new();
//!     let _sub = bus.subscribe_when(match_type("start"), |msg: InboundMessage| async move {
//!         assert_eq!(msg.kind, "start");
//!         Ok(())
//!     });
//!
//!     let message = InboundMessage::new("start", serde_json::Value::Null);
//!     let delivery = bus.publish(message).await.unwrap();
//!     assert_eq!(delivery.deliveries, 1);
//! });
//! ```

pub mod bus;
pub mod codec;
pub mod error;
pub mod messages;
pub mod predicate;

pub use bus::{Bus, Delivery, Subscription};
pub use error::BusError;
pub use messages::{
    AckStatus, Acknowledgement, EntitySnapshot, Envelope, Frame, InboundMessage, Outbound,
    OutboundMessage, message_types,
};
pub use predicate::{Predicate, match_any_type, match_metadata, match_type};
