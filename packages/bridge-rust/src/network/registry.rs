//! Correlation registry: pending operations keyed by correlation identifier.
//!
//! The registry itself is not synchronized. It lives inside the reply hub's
//! state, behind the same lock that guards the listener lifecycle, so that
//! "registry is empty" and "listener is running" change together.

use std::collections::HashMap;

use airdb_core::{CorrelationId, CorrelationIdGenerator, Reply};
use tokio::sync::oneshot;

/// Receiving half of a pending operation's completion.
pub type CompletionReceiver = oneshot::Receiver<Reply>;

/// An in-flight request awaiting its reply.
#[derive(Debug)]
pub struct PendingOperation {
    completion: oneshot::Sender<Reply>,
}

impl PendingOperation {
    /// Creates a pending operation and the receiver its owner awaits.
    #[must_use]
    pub fn new() -> (Self, CompletionReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self { completion: tx }, rx)
    }
}

/// Mapping from correlation identifier to pending operation, plus the
/// identifier generator.
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    ids: CorrelationIdGenerator,
    pending: HashMap<CorrelationId, PendingOperation>,
}

impl CorrelationRegistry {
    /// Creates an empty registry. The first allocated id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused identifier without touching the mapping.
    pub fn allocate(&mut self) -> CorrelationId {
        self.ids.next_id()
    }

    /// Stores `operation` under `id`.
    ///
    /// Identifiers come from [`allocate`](Self::allocate), so a collision is a
    /// caller bug; in debug builds it panics, otherwise the old entry is replaced.
    pub fn register(&mut self, id: CorrelationId, operation: PendingOperation) {
        let previous = self.pending.insert(id, operation);
        debug_assert!(previous.is_none(), "correlation id {id} registered twice");
    }

    /// Delivers `reply` to the operation registered under `id` and removes it.
    ///
    /// Returns `false` when nothing is registered under `id`; the reply is
    /// dropped. A matched operation whose owner has already gone away still
    /// counts as matched.
    pub fn resolve(&mut self, id: CorrelationId, reply: Reply) -> bool {
        match self.pending.remove(&id) {
            Some(operation) => {
                // Ignore send errors -- the awaiting caller may have been dropped
                let _ = operation.completion.send(reply);
                true
            }
            None => false,
        }
    }

    /// Removes the entry without completing it. Returns whether it existed.
    pub fn cancel(&mut self, id: CorrelationId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Removes every entry without completing any. Their receivers observe a
    /// closed channel.
    pub fn drain(&mut self) -> Vec<CorrelationId> {
        self.pending.drain().map(|(id, _)| id).collect()
    }

    /// Whether `id` is currently pending.
    #[must_use]
    pub fn contains(&self, id: CorrelationId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of pending operations.
    #[must_use]
    pub fn size(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn register_new(registry: &mut CorrelationRegistry) -> (CorrelationId, CompletionReceiver) {
        let id = registry.allocate();
        let (op, rx) = PendingOperation::new();
        registry.register(id, op);
        (id, rx)
    }

    #[test]
    fn allocate_does_not_register() {
        let mut registry = CorrelationRegistry::new();
        assert_eq!(registry.allocate(), CorrelationId(1));
        assert_eq!(registry.allocate(), CorrelationId(2));
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn resolve_delivers_and_removes() {
        let mut registry = CorrelationRegistry::new();
        let (id, mut rx) = register_new(&mut registry);
        assert!(registry.contains(id));

        assert!(registry.resolve(id, Reply::success(id)));
        assert_eq!(rx.try_recv().unwrap(), Reply::success(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn second_resolve_is_noop() {
        let mut registry = CorrelationRegistry::new();
        let (id, _rx) = register_new(&mut registry);

        assert!(registry.resolve(id, Reply::success(id)));
        assert!(!registry.resolve(id, Reply::failure(id, "late")));
    }

    #[test]
    fn resolve_after_cancel_is_noop() {
        let mut registry = CorrelationRegistry::new();
        let (id, mut rx) = register_new(&mut registry);

        assert!(registry.cancel(id));
        assert!(!registry.resolve(id, Reply::success(id)));
        // Sender dropped without a value
        assert!(rx.try_recv().is_err());
        assert!(!registry.cancel(id));
    }

    #[test]
    fn unknown_id_leaves_others_untouched() {
        let mut registry = CorrelationRegistry::new();
        let (a, mut rx_a) = register_new(&mut registry);
        let (b, _rx_b) = register_new(&mut registry);

        assert!(!registry.resolve(CorrelationId(999), Reply::success(CorrelationId(999))));
        assert_eq!(registry.size(), 2);

        assert!(registry.resolve(a, Reply::success(a)));
        assert!(rx_a.try_recv().is_ok());
        assert!(registry.contains(b));
    }

    #[test]
    fn resolve_with_dropped_receiver_still_matches() {
        let mut registry = CorrelationRegistry::new();
        let (id, rx) = register_new(&mut registry);
        drop(rx);
        assert!(registry.resolve(id, Reply::success(id)));
        assert!(registry.is_empty());
    }

    #[test]
    fn drain_removes_everything() {
        let mut registry = CorrelationRegistry::new();
        let (_a, mut rx_a) = register_new(&mut registry);
        let (_b, _rx_b) = register_new(&mut registry);

        let mut drained = registry.drain();
        drained.sort();
        assert_eq!(drained, vec![CorrelationId(1), CorrelationId(2)]);
        assert!(registry.is_empty());
        assert!(rx_a.try_recv().is_err());
    }

    #[derive(Debug, Clone)]
    enum Step {
        Register,
        Resolve(usize),
        Cancel(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Register),
            (0usize..16).prop_map(Step::Resolve),
            (0usize..16).prop_map(Step::Cancel),
        ]
    }

    proptest! {
        #[test]
        fn settles_each_id_at_most_once(steps in prop::collection::vec(step(), 1..64)) {
            let mut registry = CorrelationRegistry::new();
            let mut issued: Vec<CorrelationId> = Vec::new();
            let mut settled = std::collections::HashSet::new();

            for step in steps {
                match step {
                    Step::Register => {
                        let (id, _rx) = register_new(&mut registry);
                        if let Some(last) = issued.last() {
                            prop_assert!(id > *last);
                        }
                        issued.push(id);
                    }
                    Step::Resolve(_) | Step::Cancel(_) if issued.is_empty() => {}
                    Step::Resolve(i) => {
                        let id = issued[i % issued.len()];
                        let matched = registry.resolve(id, Reply::success(id));
                        prop_assert_eq!(matched, settled.insert(id));
                    }
                    Step::Cancel(i) => {
                        let id = issued[i % issued.len()];
                        let matched = registry.cancel(id);
                        prop_assert_eq!(matched, settled.insert(id));
                    }
                }
                prop_assert_eq!(registry.size(), issued.len() - settled.len());
            }
        }
    }
}
