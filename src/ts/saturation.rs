use std::collections::{BTreeSet, VecDeque};

use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    ts::{Nts, Sproutable, TransitionSystem},
    Set, Symbol,
};

/// Determines which silent steps are absorbed when saturating a transition relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Saturation {
    /// Silent steps may precede any step, i.e. `x -t*e-> z` becomes `x -e-> z`.
    Delayed,
    /// Silent steps may additionally follow an observable step, i.e. `x -t*et*-> z` becomes
    /// `x -e-> z`.
    Weak,
}

/// Closes the transition relation of `nts` under silent steps. For every silent edge
/// `x -t-> y` and every edge `y -e-> z` the edge `x -e-> z` is added. With [`Saturation::Weak`],
/// observable edges `x -e-> y` followed by a silent edge `y -t-> z` also yield `x -e-> z`. The
/// closure is computed with a worklist of newly inserted edges, so every combination is
/// considered exactly once. Returns the number of inserted edges.
///
/// Unlike the change tracking kernels, saturation accepts several silent events and silent
/// cycles.
pub fn extend_transition_relation<E, Q, I>(
    nts: &mut Nts<E, Q>,
    silent: I,
    mode: Saturation,
) -> usize
where
    E: Symbol,
    I: IntoIterator<Item = E>,
{
    let silent: BTreeSet<E> = silent.into_iter().collect();
    if silent.is_empty() {
        return 0;
    }

    let edges = nts.edges().collect_vec();
    let mut known: Set<(usize, E, usize)> = edges.iter().copied().collect();
    let mut incoming: Vec<Vec<(usize, E)>> = vec![vec![]; nts.index_bound()];
    for (p, e, q) in &edges {
        incoming[*q].push((*p, *e));
    }
    let mut queue: VecDeque<_> = edges.into();
    let mut inserted = 0;

    while let Some((x, e, y)) = queue.pop_front() {
        let mut derived = vec![];
        if silent.contains(&e) {
            derived.extend(
                nts.edges_from(y)
                    .into_iter()
                    .flatten()
                    .map(|(f, z)| (x, f, z)),
            );
            if mode == Saturation::Weak {
                derived.extend(
                    incoming[x]
                        .iter()
                        .filter(|(_, f)| !silent.contains(f))
                        .map(|&(w, f)| (w, f, y)),
                );
            }
        } else if mode == Saturation::Weak {
            derived.extend(
                nts.edges_from(y)
                    .into_iter()
                    .flatten()
                    .filter(|(f, _)| silent.contains(f))
                    .map(|(_, z)| (x, e, z)),
            );
        }
        derived.extend(
            incoming[x]
                .iter()
                .filter(|(_, f)| silent.contains(f))
                .map(|&(w, _)| (w, e, y)),
        );

        for (p, f, q) in derived {
            if known.insert((p, f, q)) {
                trace!("saturation adds {p} --{}--> {q}", f.show());
                nts.append_edge(p, f, q);
                incoming[q].push((p, f));
                queue.push_back((p, f, q));
                inserted += 1;
            }
        }
    }

    debug!("{mode:?} saturation inserted {inserted} edges");
    inserted
}

/// Adds a silent self-loop to every state for every event in `silent`, so that staying put is
/// an explicit silent step. Returns the number of inserted edges.
pub fn install_selfloops<E, Q, I>(nts: &mut Nts<E, Q>, silent: I) -> usize
where
    E: Symbol,
    I: IntoIterator<Item = E>,
{
    let silent = silent.into_iter().collect_vec();
    let states = nts.state_indices().collect_vec();
    let mut inserted = 0;
    for e in silent {
        nts.add_event(e);
        for &q in &states {
            if nts.add_edge(q, e, q) {
                inserted += 1;
            }
        }
    }
    inserted
}
