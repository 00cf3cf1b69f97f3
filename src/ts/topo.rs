use std::collections::BTreeSet;

use itertools::Itertools;
use thiserror::Error;
use tracing::trace;

use crate::{ts::TransitionSystem, Map};

/// Returned by [`topological_sort`] when the considered edges contain a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("state {state:?} lies on a cycle")]
pub struct CycleDetected<Q: std::fmt::Debug> {
    /// A state on the cycle.
    pub state: Q,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Orders the states of `ts` such that every edge labelled with an event from `events` leads
/// from an earlier to a later state. Edges with other events are ignored. Fails as soon as a
/// cycle of such edges is found, naming a state on it.
///
/// The search is a depth-first search with an explicit stack, so long chains do not exhaust
/// the call stack.
pub fn topological_sort<Ts: TransitionSystem>(
    ts: &Ts,
    events: &BTreeSet<Ts::Event>,
) -> Result<Vec<Ts::StateIndex>, CycleDetected<Ts::StateIndex>> {
    let states = ts.state_indices().collect_vec();
    let index = states
        .iter()
        .enumerate()
        .map(|(i, q)| (*q, i))
        .collect::<Map<_, _>>();
    let successors = states
        .iter()
        .map(|q| {
            ts.edges_from(*q)
                .into_iter()
                .flatten()
                .filter(|(e, _)| events.contains(e))
                .filter_map(|(_, p)| index.get(&p).copied())
                .collect_vec()
        })
        .collect_vec();

    let mut marks = vec![Mark::Unvisited; states.len()];
    let mut finished = Vec::with_capacity(states.len());

    for root in 0..states.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::InProgress;
        let mut stack = vec![(root, successors[root].iter())];

        while let Some((q, edges)) = stack.last_mut() {
            let q = *q;
            match edges.next().copied() {
                Some(p) => match marks[p] {
                    Mark::Unvisited => {
                        trace!("descending from {:?} to {:?}", states[q], states[p]);
                        marks[p] = Mark::InProgress;
                        stack.push((p, successors[p].iter()));
                    }
                    Mark::InProgress => {
                        trace!("back edge {:?} -> {:?} closes a cycle", states[q], states[p]);
                        return Err(CycleDetected { state: states[p] });
                    }
                    Mark::Done => {}
                },
                None => {
                    marks[q] = Mark::Done;
                    finished.push(states[q]);
                    stack.pop();
                }
            }
        }
    }

    finished.reverse();
    Ok(finished)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use crate::prelude::*;

    fn position(order: &[usize], q: usize) -> usize {
        order.iter().position(|p| *p == q).unwrap()
    }

    #[test]
    fn topo_respects_selected_edges() {
        let ts: Nts<char> = Nts::from_iter([
            (0, 't', 1),
            (1, 't', 2),
            (0, 't', 3),
            (3, 't', 2),
            (2, 'a', 0),
            (4, 'a', 4),
        ]);
        let order = topological_sort(&ts, &BTreeSet::from(['t'])).unwrap();
        assert_eq!(order.len(), 5);
        for (p, e, q) in ts.edges() {
            if e == 't' {
                assert!(position(&order, p) < position(&order, q), "{p} -> {q}");
            }
        }
    }

    #[test]
    fn topo_detects_cycle() {
        let ts: Nts<char> = Nts::from_iter([(1, 't', 2), (2, 't', 1), (0, 'a', 1)]);
        let err = topological_sort(&ts, &BTreeSet::from(['t'])).unwrap_err();
        assert!([1, 2].contains(&err.state));

        let selfloop: Nts<char> = Nts::from_iter([(0, 't', 0)]);
        assert_eq!(
            topological_sort(&selfloop, &BTreeSet::from(['t'])),
            Err(CycleDetected { state: 0 })
        );
    }

    #[test]
    fn topo_handles_long_chains() {
        let n = 200_000;
        let ts: Nts<char> = Nts::from_iter((0..n).map(|i| (i, 't', i + 1)));
        let order = topological_sort(&ts, &BTreeSet::from(['t'])).unwrap();
        assert_eq!(order, (0..=n).collect::<Vec<_>>());
    }
}
