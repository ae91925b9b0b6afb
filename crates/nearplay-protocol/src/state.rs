//! Observable state owned by a single writer.
//!
//! Each session manager keeps its state in a [`StateCell`]. Only the
//! manager holds `&mut` access, so every transition happens on one
//! logical owner; observers either sample the latest value through a
//! [`watch::Receiver`] or see every distinct transition through a
//! [`broadcast::Receiver`]. Writes that leave the value unchanged notify
//! nobody.

use tokio::sync::{broadcast, watch};

/// How many transitions a slow `changes()` subscriber may fall behind
/// before it starts missing them.
const CHANGES_CAPACITY: usize = 64;

/// A current value plus change notifications.
///
/// ## Two ways to observe
///
/// - [`watch()`](Self::watch) → a `watch::Receiver` that always holds
///   the newest value. Readers that only care about "what is it now?"
///   (a UI redraw, a polling loop) use this. Intermediate values may be
///   skipped.
/// - [`changes()`](Self::changes) → a `broadcast::Receiver` that gets a
///   clone of every distinct value, in order. Tests and loggers that
///   need the full `CONNECTING → CONNECTED → CONNECTION_ESTABLISHED`
///   sequence use this. A subscriber that falls more than
///   `CHANGES_CAPACITY` values behind gets `RecvError::Lagged`.
///
/// ## Trait bounds explained
///
/// - `Clone` → every observer gets its own snapshot; nobody holds a
///   borrow into the cell.
/// - `PartialEq` → [`update()`](Self::update) compares before and after,
///   and only a real change notifies anyone.
///
/// Writes take `&mut self`, so the borrow checker enforces the single
/// writer: whoever owns the cell owns the state machine.
///
/// ```rust
/// use nearplay_protocol::StateCell;
///
/// let mut cell = StateCell::new(0u32);
/// let mut changes = cell.changes();
///
/// assert!(cell.replace(1));
/// assert!(!cell.replace(1)); // same value, no notification
///
/// assert_eq!(changes.try_recv().unwrap(), 1);
/// assert!(changes.try_recv().is_err());
/// ```
#[derive(Debug)]
pub struct StateCell<S> {
    current: watch::Sender<S>,
    changes: broadcast::Sender<S>,
}

impl<S: Clone + PartialEq> StateCell<S> {
    pub fn new(initial: S) -> Self {
        let (current, _) = watch::channel(initial);
        let (changes, _) = broadcast::channel(CHANGES_CAPACITY);
        Self { current, changes }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> S {
        self.current.borrow().clone()
    }

    /// Reads the current value without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.current.borrow())
    }

    /// Subscribes to the latest value.
    pub fn watch(&self) -> watch::Receiver<S> {
        self.current.subscribe()
    }

    /// Subscribes to every distinct transition from now on.
    pub fn changes(&self) -> broadcast::Receiver<S> {
        self.changes.subscribe()
    }

    /// Applies `f` to the value. Observers are notified only if the
    /// value actually changed; the return value says whether it did.
    pub fn update(&mut self, f: impl FnOnce(&mut S)) -> bool {
        let changed = self.current.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
        if changed {
            // No subscribers is fine.
            let _ = self.changes.send(self.get());
        }
        changed
    }

    /// Replaces the value wholesale.
    pub fn replace(&mut self, next: S) -> bool {
        self.update(|state| *state = next)
    }
}

impl<S: Clone + PartialEq + Default> Default for StateCell<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Counter {
        value: u32,
        label: String,
    }

    #[test]
    fn test_update_without_change_notifies_nobody() {
        let mut cell = StateCell::<Counter>::default();
        let mut changes = cell.changes();
        let watch = cell.watch();

        let changed = cell.update(|counter| counter.value = 0);

        assert!(!changed);
        assert!(changes.try_recv().is_err());
        assert!(!watch.has_changed().unwrap());
    }

    #[test]
    fn test_every_distinct_transition_is_broadcast_in_order() {
        let mut cell = StateCell::new(Counter::default());
        let mut changes = cell.changes();

        cell.update(|counter| counter.value = 1);
        cell.update(|counter| counter.label = "a".into());
        cell.update(|counter| counter.value = 1);

        assert_eq!(changes.try_recv().unwrap().value, 1);
        assert_eq!(changes.try_recv().unwrap().label, "a");
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_watch_sees_latest_value() {
        let mut cell = StateCell::new(5u32);
        let mut watch = cell.watch();

        cell.replace(6);
        cell.replace(7);

        assert!(watch.has_changed().unwrap());
        assert_eq!(*watch.borrow_and_update(), 7);
        assert_eq!(cell.get(), 7);
        assert_eq!(cell.read(|value| value * 2), 14);
    }

    #[tokio::test]
    async fn test_watch_changed_wakes_on_transition() {
        let mut cell = StateCell::new("idle");
        let mut watch = cell.watch();

        cell.replace("busy");

        watch.changed().await.unwrap();
        assert_eq!(*watch.borrow(), "busy");
    }
}
