use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::trace;

use crate::{ts::TransitionSystem, Map};

/// Computes the strongly connected components of the sub-graph of `ts` that only contains
/// edges labelled with an event from `events`. Every state is part of exactly one component;
/// components and their states are returned in ascending order.
///
/// This is Tarjan's algorithm, run iteratively on an explicit call stack.
pub fn strongly_connected_components<Ts: TransitionSystem>(
    ts: &Ts,
    events: &BTreeSet<Ts::Event>,
) -> Vec<Vec<Ts::StateIndex>> {
    let states = ts.state_indices().collect_vec();
    let position = states
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
                .filter_map(|(_, p)| position.get(&p).copied())
                .collect_vec()
        })
        .collect_vec();

    let mut current = 0;
    let mut indices: Vec<Option<usize>> = vec![None; states.len()];
    let mut low = vec![0; states.len()];
    let mut on_stack = vec![false; states.len()];
    let mut stack = vec![];
    let mut sccs = vec![];

    for root in 0..states.len() {
        if indices[root].is_some() {
            continue;
        }
        indices[root] = Some(current);
        low[root] = current;
        current += 1;
        stack.push(root);
        on_stack[root] = true;
        let mut calls = vec![(root, 0usize)];

        while let Some(&(v, pos)) = calls.last() {
            if let Some(&w) = successors[v].get(pos) {
                let top = calls.len() - 1;
                calls[top].1 += 1;
                match indices[w] {
                    None => {
                        indices[w] = Some(current);
                        low[w] = current;
                        current += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        calls.push((w, 0));
                    }
                    Some(index_w) if on_stack[w] => low[v] = low[v].min(index_w),
                    Some(_) => {}
                }
                continue;
            }

            // all edges of v have been explored
            calls.pop();
            if let Some(&(parent, _)) = calls.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if Some(low[v]) == indices[v] {
                let mut scc = vec![];
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    scc.push(states[w]);
                    if w == v {
                        break;
                    }
                }
                scc.sort();
                trace!("identified scc {:?}", scc);
                sccs.push(scc);
            }
        }
    }

    sccs.sort();
    sccs
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use crate::prelude::*;

    #[test]
    fn tarjan_restricted_to_events() {
        let ts: Nts<char> = Nts::from_iter([
            (0, 't', 1),
            (1, 't', 0),
            (1, 'a', 2),
            (2, 't', 3),
            (3, 'a', 2),
            (3, 't', 4),
            (4, 't', 5),
            (5, 't', 3),
        ]);
        assert_eq!(
            strongly_connected_components(&ts, &BTreeSet::from(['t'])),
            vec![vec![0, 1], vec![2], vec![3, 4, 5]]
        );
        assert_eq!(
            strongly_connected_components(&ts, &BTreeSet::from(['t', 'a'])),
            vec![vec![0, 1], vec![2, 3, 4, 5]]
        );
        assert_eq!(
            strongly_connected_components(&ts, &BTreeSet::new()),
            (0..6).map(|q| vec![q]).collect::<Vec<_>>()
        );
    }
}
