//! Subscription filters.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::messages::Envelope;

/// A shareable message filter.
pub struct Predicate<M>(Arc<dyn Fn(&M) -> bool + Send + Sync>);

impl<M> Clone for Predicate<M> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<M> std::fmt::Debug for Predicate<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Predicate")
    }
}

impl<M: 'static> Predicate<M> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn matches(&self, message: &M) -> bool {
        (self.0)(message)
    }

    /// Matches when both predicates match.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::new(move |m| self.matches(m) && other.matches(m))
    }
}

/// Matches messages of exactly this type.
pub fn match_type<M: Envelope>(kind: impl Into<String>) -> Predicate<M> {
    let kind = kind.into();
    Predicate::new(move |m: &M| m.message_type() == kind)
}

/// Matches messages whose type is any of `kinds`.
pub fn match_any_type<M, I, S>(kinds: I) -> Predicate<M>
where
    M: Envelope,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let kinds: HashSet<String> = kinds.into_iter().map(Into::into).collect();
    Predicate::new(move |m: &M| kinds.contains(m.message_type()))
}

/// Matches messages carrying `key` in their metadata with exactly `value`.
pub fn match_metadata<M: Envelope>(key: impl Into<String>, value: Value) -> Predicate<M> {
    let key = key.into();
    Predicate::new(move |m: &M| m.metadata(&key) == Some(&value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::messages::InboundMessage;

    fn msg(kind: &str) -> InboundMessage {
        InboundMessage::new(kind, Value::Null)
    }

    #[test]
    fn test_match_type() {
        let p = match_type::<InboundMessage>("start");
        assert!(p.matches(&msg("start")));
        assert!(!p.matches(&msg("stop")));
    }

    #[test]
    fn test_match_any_type() {
        let p = match_any_type::<InboundMessage, _, _>(["start", "pause"]);
        assert!(p.matches(&msg("start")));
        assert!(p.matches(&msg("pause")));
        assert!(!p.matches(&msg("stop")));
    }

    #[test]
    fn test_match_metadata() {
        let p = match_metadata::<InboundMessage>("source", json!("sim"));
        assert!(p.matches(&msg("frame").with_metadata("source", json!("sim"))));
        assert!(!p.matches(&msg("frame").with_metadata("source", json!("eval"))));
        assert!(!p.matches(&msg("frame")));
    }

    #[test]
    fn test_and_combines() {
        let p = match_type::<InboundMessage>("frame")
            .and(match_metadata("source", json!("sim")));
        assert!(p.matches(&msg("frame").with_metadata("source", json!("sim"))));
        assert!(!p.matches(&msg("start").with_metadata("source", json!("sim"))));
    }
}
