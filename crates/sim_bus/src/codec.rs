//! Wire codec helpers for transports.
//!
//! MessagePack goes through `rmp-serde` with named fields, so optional
//! fields can be omitted without shifting positions. JSON is provided for
//! text transports such as server-sent events.

use serde::{Deserialize, Serialize};

use crate::error::BusError;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`BusError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, BusError> {
    rmp_serde::to_vec_named(value).map_err(BusError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`BusError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, BusError> {
    rmp_serde::from_slice(bytes).map_err(BusError::Decode)
}

/// Encode a value as a JSON string.
///
/// # Errors
///
/// Returns [`BusError::Json`] if serialisation fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, BusError> {
    serde_json::to_string(value).map_err(BusError::Json)
}

/// Decode a value from a JSON string.
///
/// # Errors
///
/// Returns [`BusError::Json`] if the text is not a valid message.
pub fn from_json<'a, T: Deserialize<'a>>(text: &'a str) -> Result<T, BusError> {
    serde_json::from_str(text).map_err(BusError::Json)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::messages::{Acknowledgement, InboundMessage, OutboundMessage};

    #[test]
    fn test_inbound_msgpack_roundtrip() {
        let msg = InboundMessage::new("inject-system", json!({ "system": "gravity", "priority": 3 }))
            .with_metadata("source", json!("cli"));
        let bytes = encode(&msg).unwrap();
        let restored: InboundMessage = decode(&bytes).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn test_acknowledgement_json_without_detail() {
        let msg = OutboundMessage::acknowledgement(Acknowledgement::success("m-1"));
        let text = to_json(&msg).unwrap();
        assert!(!text.contains("detail"));
        let restored: OutboundMessage = from_json(&text).unwrap();
        assert_eq!(restored.as_acknowledgement(), msg.as_acknowledgement());
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<InboundMessage, _> = decode(&[0xFF, 0xFF]);
        assert!(matches!(result, Err(BusError::Decode(_))));
    }

    #[test]
    fn test_from_json_rejects_missing_type() {
        let result: Result<InboundMessage, _> = from_json(r#"{"id":"x"}"#);
        assert!(matches!(result, Err(BusError::Json(_))));
    }
}
