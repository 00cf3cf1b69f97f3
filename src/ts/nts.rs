use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::trace;

use crate::{
    ts::{Sproutable, TransitionSystem},
    Symbol,
};

/// A state of an [`Nts`], it stores its color and both ends of its edge list.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NTState<Q> {
    pub(super) color: Q,
    pub(super) first_edge: Option<usize>,
    pub(super) last_edge: Option<usize>,
}

impl<Q> NTState<Q> {
    /// Creates a state without outgoing edges.
    pub fn new(color: Q) -> Self {
        Self {
            color,
            first_edge: None,
            last_edge: None,
        }
    }
}

/// An edge of an [`Nts`]. Edges of one state form a doubly linked list inside the edge arena.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NTEdge<E> {
    pub(super) prev: Option<usize>,
    pub(super) source: usize,
    pub(super) event: E,
    pub(super) target: usize,
    pub(super) next: Option<usize>,
}

impl<E> NTEdge<E> {
    /// Creates an edge that is not linked to any other edge yet.
    pub fn new(source: usize, event: E, target: usize) -> Self {
        Self {
            prev: None,
            source,
            event,
            target,
            next: None,
        }
    }
}

/// A non-deterministic transition system. States are addressed by `usize` indices which need
/// not be contiguous, each state carries a color of type `Q` (for example whether it is marked).
/// States and edges live in two arenas. Removing an edge moves the last edge of the arena into
/// its slot, so the edge arena only ever holds live edges.
#[derive(Debug, Clone)]
pub struct Nts<E, Q = ()> {
    alphabet: BTreeSet<E>,
    states: Vec<Option<NTState<Q>>>,
    edges: Vec<NTEdge<E>>,
}

impl<E, Q> Default for Nts<E, Q> {
    fn default() -> Self {
        Self {
            alphabet: BTreeSet::new(),
            states: vec![],
            edges: vec![],
        }
    }
}

impl<E: Symbol, Q> Nts<E, Q> {
    /// Creates an empty transition system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transition system without states over the given alphabet.
    pub fn for_alphabet<I: IntoIterator<Item = E>>(alphabet: I) -> Self {
        Self {
            alphabet: alphabet.into_iter().collect(),
            states: vec![],
            edges: vec![],
        }
    }

    /// Returns a builder for constructing a colored transition system.
    pub fn builder() -> NtsBuilder<E, Q> {
        NtsBuilder::default()
    }

    /// One more than the largest state index that was ever inserted.
    pub fn index_bound(&self) -> usize {
        self.states.len()
    }

    /// Returns the color of `state`, if it exists.
    pub fn state_color(&self, state: usize) -> Option<&Q> {
        self.states.get(state)?.as_ref().map(|q| &q.color)
    }

    /// Overwrites the color of `state`. Returns `false` if there is no such state.
    pub fn set_state_color(&mut self, state: usize, color: Q) -> bool {
        match self.states.get_mut(state) {
            Some(Some(q)) => {
                q.color = color;
                true
            }
            _ => {
                tracing::error!("cannot set color of state {state} that does not exist");
                false
            }
        }
    }

    /// Checks whether the edge `from --on--> to` exists.
    pub fn has_edge(&self, from: usize, on: E, to: usize) -> bool {
        self.edges_from(from)
            .map(|mut it| it.any(|(e, q)| e == on && q == to))
            .unwrap_or(false)
    }

    /// Iterates over all edges as `(source, event, target)` triples, ordered by source.
    pub fn edges(&self) -> impl Iterator<Item = (usize, E, usize)> + '_ {
        self.state_indices().flat_map(move |p| {
            NtsEdgesFrom::new(&self.edges, self.first_edge(p)).map(move |(e, q)| (p, e, q))
        })
    }

    /// Gives the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Copies an arbitrary [`TransitionSystem`] into an `Nts` with contiguous state indices.
    /// The returned vector maps each new index back to the original state. Edges leading to a
    /// state that `ts` does not list are skipped, just like the bisimulation encoder does.
    pub fn from_ts<Ts>(ts: &Ts) -> (Self, Vec<Ts::StateIndex>)
    where
        Ts: TransitionSystem<Event = E>,
        Q: Default,
    {
        let ids = ts.state_indices().collect_vec();
        let index = ids
            .iter()
            .enumerate()
            .map(|(i, q)| (*q, i))
            .collect::<crate::Map<_, _>>();

        let mut nts = Self::for_alphabet(ts.events());
        for i in 0..ids.len() {
            nts.add_state(i, Q::default());
        }
        for (i, q) in ids.iter().enumerate() {
            for (e, p) in ts.edges_from(*q).into_iter().flatten() {
                match index.get(&p) {
                    Some(&j) => {
                        nts.add_edge(i, e, j);
                    }
                    None => trace!("skipping edge {q:?} --{}--> unlisted {p:?}", e.show()),
                }
            }
        }
        (nts, ids)
    }

    fn first_edge(&self, state: usize) -> Option<usize> {
        self.states.get(state)?.as_ref()?.first_edge
    }

    fn state_mut(&mut self, state: usize) -> Option<&mut NTState<Q>> {
        self.states.get_mut(state)?.as_mut()
    }

    /// Appends `from --on--> to` to the edge list of `from` without checking whether it exists
    /// already. Callers that track inserted edges themselves, like saturation, skip the scan.
    pub(crate) fn append_edge(&mut self, from: usize, on: E, to: usize) {
        assert!(self.contains_state(from), "State {from} does not exist");
        assert!(self.contains_state(to), "State {to} does not exist");
        self.alphabet.insert(on);

        let mut edge = NTEdge::new(from, on, to);
        let edge_id = self.edges.len();
        let Some(Some(state)) = self.states.get_mut(from) else {
            return;
        };
        match state.last_edge.replace(edge_id) {
            Some(last) => {
                edge.prev = Some(last);
                self.edges[last].next = Some(edge_id);
            }
            None => state.first_edge = Some(edge_id),
        }
        self.edges.push(edge);
    }

    /// Points the neighbours of the edge at `id` to `target`, which is either `None` to unlink
    /// the edge or `Some(id)` after the edge was moved to `id`.
    fn relink(&mut self, id: usize, target: Option<usize>) {
        let NTEdge {
            prev, next, source, ..
        } = self.edges[id];
        let (before, after) = match target {
            None => (next, prev),
            Some(_) => (target, target),
        };
        match prev {
            Some(p) => self.edges[p].next = before,
            None => {
                if let Some(state) = self.state_mut(source) {
                    state.first_edge = before;
                }
            }
        }
        match next {
            Some(n) => self.edges[n].prev = after,
            None => {
                if let Some(state) = self.state_mut(source) {
                    state.last_edge = after;
                }
            }
        }
    }

    fn find_edge(&self, from: usize, on: E, to: usize) -> Option<usize> {
        let mut current = self.first_edge(from);
        while let Some(id) = current {
            let edge = &self.edges[id];
            if edge.event == on && edge.target == to {
                return Some(id);
            }
            current = edge.next;
        }
        None
    }
}

/// Iterator over the `(event, target)` pairs of one state of an [`Nts`].
#[derive(Debug, Clone)]
pub struct NtsEdgesFrom<'a, E> {
    edges: &'a [NTEdge<E>],
    current: Option<usize>,
}

impl<'a, E> NtsEdgesFrom<'a, E> {
    /// Starts iterating at the edge with index `current`.
    pub fn new(edges: &'a [NTEdge<E>], current: Option<usize>) -> Self {
        Self { edges, current }
    }
}

impl<'a, E: Copy> Iterator for NtsEdgesFrom<'a, E> {
    type Item = (E, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        assert!(idx < self.edges.len());
        let e = &self.edges[idx];
        self.current = e.next;
        Some((e.event, e.target))
    }
}

type LiveStates<'a, Q> = std::iter::FilterMap<
    std::iter::Enumerate<std::slice::Iter<'a, Option<NTState<Q>>>>,
    fn((usize, &Option<NTState<Q>>)) -> Option<usize>,
>;

fn live_state<Q>((i, q): (usize, &Option<NTState<Q>>)) -> Option<usize> {
    q.as_ref().map(|_| i)
}

impl<E: Symbol, Q> TransitionSystem for Nts<E, Q> {
    type StateIndex = usize;
    type Event = E;
    type StateIndices<'this> = LiveStates<'this, Q> where Self: 'this;
    type Events<'this> = std::iter::Copied<std::collections::btree_set::Iter<'this, E>>
    where
        Self: 'this;
    type EdgesFrom<'this> = NtsEdgesFrom<'this, E> where Self: 'this;

    fn state_indices(&self) -> Self::StateIndices<'_> {
        self.states
            .iter()
            .enumerate()
            .filter_map(live_state as fn((usize, &Option<NTState<Q>>)) -> Option<usize>)
    }

    fn events(&self) -> Self::Events<'_> {
        self.alphabet.iter().copied()
    }

    fn edges_from(&self, state: usize) -> Option<Self::EdgesFrom<'_>> {
        if !self.contains_state(state) {
            return None;
        }
        Some(NtsEdgesFrom::new(&self.edges, self.first_edge(state)))
    }

    fn contains_state(&self, state: usize) -> bool {
        matches!(self.states.get(state), Some(Some(_)))
    }
}

impl<E: Symbol, Q> Sproutable for Nts<E, Q> {
    type StateColor = Q;

    fn add_state(&mut self, state: usize, color: Q) -> bool {
        if state >= self.states.len() {
            self.states.resize_with(state + 1, || None);
        }
        match &mut self.states[state] {
            Some(existing) => {
                existing.color = color;
                false
            }
            slot => {
                *slot = Some(NTState::new(color));
                true
            }
        }
    }

    fn add_event(&mut self, event: E) {
        self.alphabet.insert(event);
    }

    fn add_edge(&mut self, from: usize, on: E, to: usize) -> bool {
        assert!(self.contains_state(from), "State {from} does not exist");
        assert!(self.contains_state(to), "State {to} does not exist");
        if self.find_edge(from, on, to).is_some() {
            self.alphabet.insert(on);
            return false;
        }
        self.append_edge(from, on, to);
        true
    }

    fn remove_edge(&mut self, from: usize, on: E, to: usize) -> bool {
        let Some(id) = self.find_edge(from, on, to) else {
            return false;
        };
        self.relink(id, None);
        self.edges.swap_remove(id);
        if id < self.edges.len() {
            self.relink(id, Some(id));
        }
        true
    }
}

impl<E: Symbol, Q: Default> FromIterator<(usize, E, usize)> for Nts<E, Q> {
    fn from_iter<T: IntoIterator<Item = (usize, E, usize)>>(iter: T) -> Self {
        let mut nts = Self::new();
        for (p, e, q) in iter {
            for state in [p, q] {
                if !nts.contains_state(state) {
                    nts.add_state(state, Q::default());
                }
            }
            nts.add_edge(p, e, q);
        }
        nts
    }
}

/// Collects states, colors and edges and assembles them into an [`Nts`].
#[derive(Debug, Clone)]
pub struct NtsBuilder<E, Q> {
    events: Vec<E>,
    states: Vec<(usize, Q)>,
    edges: Vec<(usize, E, usize)>,
    default: Option<Q>,
}

impl<E, Q> Default for NtsBuilder<E, Q> {
    fn default() -> Self {
        Self {
            events: vec![],
            states: vec![],
            edges: vec![],
            default: None,
        }
    }
}

impl<E: Symbol, Q: Clone> NtsBuilder<E, Q> {
    /// Color given to states that only occur in edges.
    pub fn default_color(mut self, color: Q) -> Self {
        self.default = Some(color);
        self
    }

    /// Adds events that may not label any edge.
    pub fn with_events<I: IntoIterator<Item = E>>(mut self, events: I) -> Self {
        self.events.extend(events);
        self
    }

    /// Adds colored states.
    pub fn with_states<I: IntoIterator<Item = (usize, Q)>>(mut self, states: I) -> Self {
        self.states.extend(states);
        self
    }

    /// Adds edges, given as `(source, event, target)`.
    pub fn with_edges<I: IntoIterator<Item = (usize, E, usize)>>(mut self, edges: I) -> Self {
        self.edges.extend(edges);
        self
    }

    /// Builds the transition system.
    ///
    /// # Panics
    /// If an edge mentions a state that was not given explicitly and no default color is set.
    pub fn collect(self) -> Nts<E, Q> {
        let mut nts = Nts::for_alphabet(self.events);
        for (q, color) in self.states {
            nts.add_state(q, color);
        }
        for (p, e, q) in self.edges {
            for state in [p, q] {
                if !nts.contains_state(state) {
                    let color = self
                        .default
                        .clone()
                        .expect("Default is needed as some states have no color");
                    nts.add_state(state, color);
                }
            }
            nts.add_edge(p, e, q);
        }
        nts
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use crate::prelude::*;

    #[test]
    fn nts_sparse_states() {
        let ts: Nts<char> = Nts::from_iter([(1, 'a', 2), (1, 'a', 3), (3, 'b', 3)]);
        assert_eq!(ts.state_indices().collect_vec(), vec![1, 2, 3]);
        assert!(!ts.contains_state(0));
        assert_eq!(ts.size(), 3);
        assert_eq!(ts.events().collect_vec(), vec!['a', 'b']);
        assert_eq!(ts.edges_from(1).unwrap().collect_vec(), vec![('a', 2), ('a', 3)]);
        assert!(ts.edges_from(0).is_none());
        assert_eq!(ts.active_events(3), Some(BTreeSet::from(['b'])));
    }

    #[test]
    fn nts_edge_insertion_and_removal() {
        let mut ts: Nts<char> = Nts::from_iter([(0, 'a', 1), (0, 'b', 1), (0, 'c', 0)]);
        assert!(!ts.add_edge(0, 'a', 1));
        assert_eq!(ts.edge_count(), 3);

        assert!(ts.remove_edge(0, 'b', 1));
        assert!(!ts.remove_edge(0, 'b', 1));
        assert_eq!(ts.edges().collect_vec(), vec![(0, 'a', 1), (0, 'c', 0)]);

        assert!(ts.remove_edge(0, 'a', 1));
        assert_eq!(ts.edges().collect_vec(), vec![(0, 'c', 0)]);
        assert!(ts.add_edge(0, 'a', 1));
        assert_eq!(ts.edges().collect_vec(), vec![(0, 'c', 0), (0, 'a', 1)]);
        // removed edges keep the event in the alphabet
        assert_eq!(ts.events().collect_vec(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn nts_builder_colors() {
        let ts = Nts::builder()
            .with_events(['x'])
            .with_states([(0, true), (7, true)])
            .with_edges([(0, 'a', 1)])
            .default_color(false)
            .collect();
        assert_eq!(ts.state_indices().collect_vec(), vec![0, 1, 7]);
        assert_eq!(ts.state_color(1), Some(&false));
        assert_eq!(ts.state_color(7), Some(&true));
        assert_eq!(ts.events().collect_vec(), vec!['a', 'x']);
    }

    #[test]
    fn nts_copy_from_other_ts() {
        let original: Nts<char> = Nts::from_iter([(4, 'a', 9), (9, 'b', 4)]);
        let (copy, ids): (Nts<char>, _) = Nts::from_ts(&original);
        assert_eq!(ids, vec![4, 9]);
        assert_eq!(copy.edges().collect_vec(), vec![(0, 'a', 1), (1, 'b', 0)]);
    }

    /// Walks the edge list of `state` backwards from its last edge.
    fn edges_backwards(ts: &Nts<char>, state: usize) -> Vec<(char, usize)> {
        let mut out = vec![];
        let mut current = ts.states[state].as_ref().and_then(|s| s.last_edge);
        while let Some(id) = current {
            assert_eq!(ts.edges[id].source, state);
            out.push((ts.edges[id].event, ts.edges[id].target));
            current = ts.edges[id].prev;
        }
        out.reverse();
        out
    }

    #[test]
    fn nts_removal_compacts_arena() {
        let mut ts: Nts<char> = Nts::from_iter([
            (0, 'a', 1),
            (1, 'a', 0),
            (0, 'b', 1),
            (0, 'c', 1),
            (1, 'b', 1),
        ]);
        // the first edge of 0 is replaced by the last edge of 1
        assert!(ts.remove_edge(0, 'a', 1));
        // the last edge of 0 is also the last one in the arena
        assert!(ts.remove_edge(0, 'c', 1));
        assert_eq!(ts.edges.len(), 3);
        assert!(ts.add_edge(0, 'd', 0));
        assert_eq!(ts.edges.len(), 4);
        assert_eq!(ts.edge_count(), ts.edges().count());

        for (state, expected) in [
            (0, vec![('b', 1), ('d', 0)]),
            (1, vec![('a', 0), ('b', 1)]),
        ] {
            assert_eq!(ts.edges_from(state).unwrap().collect_vec(), expected);
            assert_eq!(edges_backwards(&ts, state), expected);
        }

        assert!(ts.remove_edge(1, 'a', 0));
        assert!(ts.remove_edge(1, 'b', 1));
        assert!(ts.edges_from(1).unwrap().next().is_none());
        assert!(ts.add_edge(1, 'c', 0));
        assert_eq!(ts.edges_from(1).unwrap().collect_vec(), vec![('c', 0)]);
        assert_eq!(edges_backwards(&ts, 0), vec![('b', 1), ('d', 0)]);
        assert_eq!(ts.edges.len(), 3);
    }

    #[test]
    fn nts_append_skips_lookup() {
        let mut ts: Nts<char> = Nts::from_iter([(0, 'a', 1)]);
        ts.append_edge(1, 't', 0);
        ts.append_edge(1, 'a', 1);
        assert_eq!(ts.edges_from(1).unwrap().collect_vec(), vec![('t', 0), ('a', 1)]);
        assert_eq!(edges_backwards(&ts, 1), vec![('t', 0), ('a', 1)]);
        assert_eq!(ts.events().collect_vec(), vec!['a', 't']);
    }

    /// Shows `inner` without the state `hidden`, while edges into `hidden` stay visible.
    struct Hiding<'a> {
        inner: &'a Nts<char>,
        hidden: usize,
    }

    impl TransitionSystem for Hiding<'_> {
        type StateIndex = usize;
        type Event = char;
        type StateIndices<'this> = std::vec::IntoIter<usize> where Self: 'this;
        type Events<'this> = <Nts<char> as TransitionSystem>::Events<'this> where Self: 'this;
        type EdgesFrom<'this> = crate::ts::NtsEdgesFrom<'this, char> where Self: 'this;

        fn state_indices(&self) -> Self::StateIndices<'_> {
            let hidden = self.hidden;
            self.inner
                .state_indices()
                .filter(|&q| q != hidden)
                .collect_vec()
                .into_iter()
        }

        fn events(&self) -> Self::Events<'_> {
            self.inner.events()
        }

        fn edges_from(&self, state: usize) -> Option<Self::EdgesFrom<'_>> {
            if state == self.hidden {
                return None;
            }
            self.inner.edges_from(state)
        }

        fn contains_state(&self, state: usize) -> bool {
            state != self.hidden && self.inner.contains_state(state)
        }
    }

    #[test]
    fn nts_copy_skips_unlisted_targets() {
        let inner: Nts<char> = Nts::from_iter([(0, 't', 1), (1, 'a', 3), (2, 'a', 3), (3, 'b', 0)]);
        let ts = Hiding {
            inner: &inner,
            hidden: 3,
        };
        let (copy, ids): (Nts<char>, _) = Nts::from_ts(&ts);
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(copy.edges().collect_vec(), vec![(0, 't', 1)]);

        let expected = Partition::new([[0, 1, 2]]);
        assert_eq!(weak_bisimulation(&ts, ['t'], None).unwrap(), expected);
        assert_eq!(weak_bisimulation_saturated(&ts, ['t'], None).unwrap(), expected);
        assert_eq!(delayed_bisimulation_saturated(&ts, ['t'], None).unwrap(), expected);
    }
}
