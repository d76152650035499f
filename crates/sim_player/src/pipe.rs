//! Wiring one player's frames into another player's inbound bus.

use serde_json::json;
use sim_bus::{Bus, InboundMessage, OutboundMessage, Subscription, match_type, message_types};

/// Forward every frame published on `outbound` to `inbound` as an
/// `ingest-frame` command.
///
/// The forwarded command carries the frame message's id under the
/// `frameId` metadata key. Call [`Subscription::unsubscribe`] to cut the
/// wire.
pub fn pipe_frames(outbound: &Bus<OutboundMessage>, inbound: Bus<InboundMessage>) -> Subscription {
    pipe_frames_to(outbound, inbound, message_types::INGEST_FRAME)
}

/// Like [`pipe_frames`], for an evaluation player listening on a custom
/// ingest message type.
pub fn pipe_frames_to(
    outbound: &Bus<OutboundMessage>,
    inbound: Bus<InboundMessage>,
    ingest_type: impl Into<String>,
) -> Subscription {
    let ingest_type: String = ingest_type.into();
    outbound.subscribe_when(
        match_type(message_types::FRAME),
        move |message: OutboundMessage| {
            let inbound = inbound.clone();
            let ingest_type = ingest_type.clone();
            async move {
                let Some(frame) = message.as_frame() else {
                    return Ok(());
                };
                let command = InboundMessage::new(
                    ingest_type,
                    json!({ "frame": serde_json::to_value(frame)? }),
                )
                .with_metadata("frameId", json!(message.id));
                inbound.publish(command).await?;
                Ok(())
            }
        },
    )
}
