//! Bus-layer error types.

/// Errors surfaced to a publisher or by the codec.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Exactly one subscriber failed; its error passes through unchanged.
    #[error(transparent)]
    Subscriber(anyhow::Error),

    /// Two or more subscribers failed on the same publish.
    #[error("Multiple bus subscribers failed: {}", .0.join("; "))]
    Aggregate(Vec<String>),

    /// Failed to encode a message to MessagePack.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a message from MessagePack.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Failed to convert a message to or from JSON.
    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),
}

impl BusError {
    /// Merge subscriber failures into a publish result error.
    ///
    /// Returns `None` when nothing failed.
    #[must_use]
    pub fn from_failures(mut failures: Vec<anyhow::Error>) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop().map(Self::Subscriber),
            _ => Some(Self::Aggregate(
                failures.iter().map(ToString::to_string).collect(),
            )),
        }
    }
}
