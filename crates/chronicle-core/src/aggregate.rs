//! Aggregate root abstraction.
//!
//! State changes are expressed as a pure transition `(State, Event) -> State`
//! on [`AggregateState`]. [`Aggregate`] wraps a state with its identity, the
//! persisted version and the buffer of raised-but-unsaved events, and runs
//! the same transition for replayed and newly raised events.

use std::fmt;

use crate::error::DomainError;
use crate::event::{AggregateId, DomainEvent};

/// Pure, storage-agnostic state of one aggregate type.
pub trait AggregateState: Default + Clone + fmt::Debug + Send + Sync + 'static {
    /// The event vocabulary that drives this state.
    type Event: DomainEvent;

    /// Applies one event and returns the resulting state.
    #[must_use]
    fn apply(self, event: &Self::Event) -> Self;

    /// Returns `true` once the aggregate has reached a terminal state and
    /// accepts no further operations.
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Coarse lifecycle of an aggregate instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No events replayed or raised yet.
    Nonexistent,
    /// Admitted and accepting operations.
    Active,
    /// Closed; every further operation fails with `AlreadyTerminal`.
    Terminal,
}

/// An aggregate instance: identity, current state, persisted version and
/// uncommitted events.
#[derive(Debug, Clone)]
pub struct Aggregate<S: AggregateState> {
    id: AggregateId,
    state: S,
    version: i64,
    uncommitted_events: Vec<S::Event>,
}

impl<S: AggregateState> Aggregate<S> {
    /// Creates an aggregate with no history.
    #[must_use]
    pub fn new(id: AggregateId) -> Self {
        Self {
            id,
            state: S::default(),
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Rebuilds an aggregate by replaying `events` in order.
    pub fn from_history(id: AggregateId, events: impl IntoIterator<Item = S::Event>) -> Self {
        let mut aggregate = Self::new(id);
        for event in events {
            aggregate.on(event, false);
        }
        aggregate
    }

    /// Returns the aggregate identifier.
    #[must_use]
    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Returns the number of durably persisted events. Raised events do not
    /// count until they are committed.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns events raised since the last commit.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[S::Event] {
        &self.uncommitted_events
    }

    /// Returns the lifecycle stage derived from version, buffer and state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        if self.state.is_terminal() {
            Lifecycle::Terminal
        } else if self.version == 0 && self.uncommitted_events.is_empty() {
            Lifecycle::Nonexistent
        } else {
            Lifecycle::Active
        }
    }

    /// Applies one event.
    ///
    /// Replayed events (`is_new == false`) advance the version. New events
    /// are buffered for the next save and leave the version untouched.
    pub fn on(&mut self, event: S::Event, is_new: bool) {
        let state = std::mem::take(&mut self.state);
        self.state = state.apply(&event);
        if is_new {
            self.uncommitted_events.push(event);
        } else {
            self.version += 1;
        }
    }

    /// Raises a new event produced by a business operation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AlreadyTerminal` without touching state or
    /// buffer if the aggregate is terminal.
    pub fn raise(&mut self, event: S::Event) -> Result<(), DomainError> {
        if self.state.is_terminal() {
            return Err(DomainError::AlreadyTerminal(self.id.clone()));
        }
        self.on(event, true);
        Ok(())
    }

    /// Marks buffered events as persisted: the version advances by the
    /// buffer length and the buffer is cleared. Only a successful save calls
    /// this.
    #[allow(clippy::cast_possible_wrap)]
    pub fn mark_committed(&mut self) {
        self.version += self.uncommitted_events.len() as i64;
        self.uncommitted_events.clear();
    }
}

/// Types that are backed by an [`Aggregate`] and can be loaded and saved by
/// an `AggregateRepository`.
pub trait AggregateRoot: From<Aggregate<Self::State>> + Send + Sync {
    /// The pure state type.
    type State: AggregateState;

    /// Returns the underlying aggregate.
    fn root(&self) -> &Aggregate<Self::State>;

    /// Returns the underlying aggregate mutably.
    fn root_mut(&mut self) -> &mut Aggregate<Self::State>;
}

impl<S: AggregateState> AggregateRoot for Aggregate<S> {
    type State = S;

    fn root(&self) -> &Aggregate<S> {
        self
    }

    fn root_mut(&mut self) -> &mut Aggregate<S> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum CounterEvent {
        Incremented(u32),
        Closed,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Incremented(_) => "counter.incremented",
                Self::Closed => "counter.closed",
            }
        }

        fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
            match self {
                Self::Incremented(by) => Ok(serde_json::json!({ "by": by })),
                Self::Closed => Ok(serde_json::Value::Null),
            }
        }

        fn from_payload(event_type: &str, payload: serde_json::Value) -> Result<Self, DomainError> {
            match event_type {
                "counter.incremented" => {
                    let by = payload["by"]
                        .as_u64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| DomainError::Serialization("missing by".into()))?;
                    Ok(Self::Incremented(by))
                }
                "counter.closed" => Ok(Self::Closed),
                other => Err(DomainError::UnknownEventShape(other.to_owned())),
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        total: u32,
        closed: bool,
    }

    impl AggregateState for Counter {
        type Event = CounterEvent;

        fn apply(mut self, event: &CounterEvent) -> Self {
            match event {
                CounterEvent::Incremented(by) => self.total += by,
                CounterEvent::Closed => self.closed = true,
            }
            self
        }

        fn is_terminal(&self) -> bool {
            self.closed
        }
    }

    fn history() -> Vec<CounterEvent> {
        vec![
            CounterEvent::Incremented(2),
            CounterEvent::Incremented(3),
            CounterEvent::Incremented(5),
        ]
    }

    #[test]
    fn test_replay_version_equals_event_count() {
        let aggregate = Aggregate::<Counter>::from_history(AggregateId::from("c-1"), history());

        assert_eq!(aggregate.version(), 3);
        assert_eq!(aggregate.state().total, 10);
        assert!(aggregate.uncommitted_events().is_empty());
        assert_eq!(aggregate.lifecycle(), Lifecycle::Active);
    }

    #[test]
    fn test_replaying_twice_yields_equal_state() {
        let first = Aggregate::<Counter>::from_history(AggregateId::from("c-1"), history());
        let second = Aggregate::<Counter>::from_history(AggregateId::from("c-1"), history());

        assert_eq!(first.state(), second.state());
        assert_eq!(first.version(), second.version());
    }

    #[test]
    fn test_raise_buffers_without_advancing_version() {
        let mut aggregate = Aggregate::<Counter>::from_history(AggregateId::from("c-1"), history());

        aggregate.raise(CounterEvent::Incremented(1)).unwrap();

        assert_eq!(aggregate.version(), 3);
        assert_eq!(aggregate.state().total, 11);
        assert_eq!(aggregate.uncommitted_events(), &[CounterEvent::Incremented(1)]);
    }

    #[test]
    fn test_new_aggregate_is_nonexistent_until_first_event() {
        let mut aggregate = Aggregate::<Counter>::new(AggregateId::from("c-1"));
        assert_eq!(aggregate.lifecycle(), Lifecycle::Nonexistent);

        aggregate.raise(CounterEvent::Incremented(1)).unwrap();

        assert_eq!(aggregate.lifecycle(), Lifecycle::Active);
        assert_eq!(aggregate.version(), 0);
    }

    #[test]
    fn test_raise_on_terminal_aggregate_fails_and_raises_nothing() {
        let mut events = history();
        events.push(CounterEvent::Closed);
        let mut aggregate = Aggregate::<Counter>::from_history(AggregateId::from("c-1"), events);

        let result = aggregate.raise(CounterEvent::Incremented(1));

        assert_eq!(
            result.unwrap_err(),
            DomainError::AlreadyTerminal(AggregateId::from("c-1"))
        );
        assert!(aggregate.uncommitted_events().is_empty());
        assert_eq!(aggregate.version(), 4);
        assert_eq!(aggregate.lifecycle(), Lifecycle::Terminal);
    }

    #[test]
    fn test_mark_committed_advances_version_and_clears_buffer() {
        let mut aggregate = Aggregate::<Counter>::new(AggregateId::from("c-1"));
        aggregate.raise(CounterEvent::Incremented(1)).unwrap();
        aggregate.raise(CounterEvent::Incremented(1)).unwrap();

        aggregate.mark_committed();

        assert_eq!(aggregate.version(), 2);
        assert!(aggregate.uncommitted_events().is_empty());
    }
}
