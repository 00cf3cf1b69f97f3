use std::{collections::BTreeSet, fmt::Debug, hash::Hash};

use crate::Symbol;

mod nts;
pub use nts::{NTEdge, NTState, Nts, NtsEdgesFrom};

mod topo;
pub use topo::{topological_sort, CycleDetected};

mod tarjan;
pub use tarjan::strongly_connected_components;

mod saturation;
pub use saturation::{extend_transition_relation, install_selfloops, Saturation};

/// Identifies a state of a transition system. The algorithms never look into state indices,
/// they only compare, order and hash them.
pub trait IndexType: Copy + Eq + Ord + Hash + Debug {}
impl<T: Copy + Eq + Ord + Hash + Debug> IndexType for T {}

/// Type alias to extract the state index of a [`TransitionSystem`].
pub type StateOf<Ts> = <Ts as TransitionSystem>::StateIndex;
/// Type alias to extract the event type of a [`TransitionSystem`].
pub type EventOf<Ts> = <Ts as TransitionSystem>::Event;

/// Read-only view of a finite, possibly non-deterministic transition system. This is all the
/// bisimulation algorithms need to know about an automaton: which states and events exist and
/// which `(event, target)` pairs leave a state.
pub trait TransitionSystem {
    /// The type of the indices of the states.
    type StateIndex: IndexType;
    /// The type of the events labelling the transitions.
    type Event: Symbol;

    /// Iterator over all state indices.
    type StateIndices<'this>: Iterator<Item = Self::StateIndex>
    where
        Self: 'this;

    /// Iterator over all events of the alphabet.
    type Events<'this>: Iterator<Item = Self::Event>
    where
        Self: 'this;

    /// Iterator over the `(event, target)` pairs leaving a state.
    type EdgesFrom<'this>: Iterator<Item = (Self::Event, Self::StateIndex)>
    where
        Self: 'this;

    /// Returns an iterator over the indices of all states.
    fn state_indices(&self) -> Self::StateIndices<'_>;

    /// Returns an iterator over the alphabet. Every event that labels some transition must be
    /// part of it, but the alphabet may contain events that never occur.
    fn events(&self) -> Self::Events<'_>;

    /// Returns an iterator over the outgoing edges of `state`, or `None` if the state does not
    /// exist. Edges may lead to states that [`Self::state_indices`] does not list, the
    /// algorithms of this crate ignore such edges.
    fn edges_from(&self, state: Self::StateIndex) -> Option<Self::EdgesFrom<'_>>;

    /// Checks whether `state` is a state of `self`.
    fn contains_state(&self, state: Self::StateIndex) -> bool;

    /// Gives the number of states.
    fn size(&self) -> usize {
        self.state_indices().count()
    }

    /// Collects the events that label at least one edge leaving `state`.
    fn active_events(&self, state: Self::StateIndex) -> Option<BTreeSet<Self::Event>> {
        Some(self.edges_from(state)?.map(|(e, _)| e).collect())
    }
}

impl<Ts: TransitionSystem> TransitionSystem for &Ts {
    type StateIndex = Ts::StateIndex;
    type Event = Ts::Event;
    type StateIndices<'this> = Ts::StateIndices<'this> where Self: 'this;
    type Events<'this> = Ts::Events<'this> where Self: 'this;
    type EdgesFrom<'this> = Ts::EdgesFrom<'this> where Self: 'this;

    fn state_indices(&self) -> Self::StateIndices<'_> {
        Ts::state_indices(self)
    }

    fn events(&self) -> Self::Events<'_> {
        Ts::events(self)
    }

    fn edges_from(&self, state: Self::StateIndex) -> Option<Self::EdgesFrom<'_>> {
        Ts::edges_from(self, state)
    }

    fn contains_state(&self, state: Self::StateIndex) -> bool {
        Ts::contains_state(self, state)
    }
}

/// Implementors of this trait are [`TransitionSystem`]s that can grow and shrink, which is what
/// saturation and quotient construction need.
pub trait Sproutable: TransitionSystem {
    /// The type of color that is attached to each state.
    type StateColor;

    /// Inserts `state` with the given color. Returns `false` if it existed already, in which case
    /// only its color is updated.
    fn add_state(&mut self, state: Self::StateIndex, color: Self::StateColor) -> bool;

    /// Adds `event` to the alphabet.
    fn add_event(&mut self, event: Self::Event);

    /// Inserts the edge `from --on--> to` and returns `true` if it did not exist before.
    /// The event is added to the alphabet.
    ///
    /// # Panics
    /// If `from` or `to` is not a state of `self`.
    fn add_edge(&mut self, from: Self::StateIndex, on: Self::Event, to: Self::StateIndex) -> bool;

    /// Removes the edge `from --on--> to`, returns `true` if it existed.
    fn remove_edge(&mut self, from: Self::StateIndex, on: Self::Event, to: Self::StateIndex)
        -> bool;
}
