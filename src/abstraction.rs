use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::debug;

use crate::{
    bisimulation::{weak_bisimulation_saturated, BisimulationError},
    ts::{strongly_connected_components, Sproutable, TransitionSystem},
    Map, Nts, Partition, Symbol,
};

/// Builds the quotient of `nts` with respect to `partition`. Every class is collapsed into its
/// smallest state, which keeps its color; states that are not listed stay as they are. Edges are
/// redirected to the representatives, so parallel edges collapse into one.
///
/// Silent edges inside a class turn into silent self-loops, see [`remove_silent_selfloops`].
pub fn merge_equivalence_classes<E: Symbol, C: Clone>(
    nts: &Nts<E, C>,
    partition: &Partition<usize>,
) -> Nts<E, C> {
    let mut representative: Map<usize, usize> = Map::default();
    for class in partition {
        let mut members = class.iter().copied().filter(|&q| nts.contains_state(q));
        let Some(first) = members.next() else {
            continue;
        };
        representative.extend(members.map(|q| (q, first)));
    }
    let rep = |q: usize| representative.get(&q).copied().unwrap_or(q);

    let mut quotient = Nts::for_alphabet(nts.events());
    for q in nts.state_indices().filter(|&q| rep(q) == q) {
        if let Some(color) = nts.state_color(q) {
            quotient.add_state(q, color.clone());
        }
    }
    for (p, e, q) in nts.edges() {
        quotient.add_edge(rep(p), e, rep(q));
    }
    debug!(
        "quotient has {} of {} states and {} of {} edges",
        quotient.size(),
        nts.size(),
        quotient.edge_count(),
        nts.edge_count()
    );
    quotient
}

/// Removes every self-loop labelled with one of the `silent` events and returns how many were
/// removed.
pub fn remove_silent_selfloops<E, C, I>(nts: &mut Nts<E, C>, silent: I) -> usize
where
    E: Symbol,
    I: IntoIterator<Item = E>,
{
    let silent = silent.into_iter().collect_vec();
    let states = nts.state_indices().collect_vec();
    states
        .into_iter()
        .cartesian_product(silent)
        .filter(|&(q, e)| nts.remove_edge(q, e, q))
        .count()
}

/// Collapses every cycle of silent transitions into a single state. The states on such a cycle
/// are weakly bisimilar, and the result has an acyclic silent sub-graph, which is what the
/// change tracking strategy needs.
pub fn merge_silent_loops<E, C, I>(nts: &Nts<E, C>, silent: I) -> Nts<E, C>
where
    E: Symbol,
    C: Clone,
    I: IntoIterator<Item = E>,
{
    let silent: BTreeSet<E> = silent.into_iter().collect();
    let loops = Partition::new(
        strongly_connected_components(nts, &silent)
            .into_iter()
            .filter(|scc| scc.len() > 1),
    );
    debug!("merging {} silent loops", loops.len());

    let mut merged = merge_equivalence_classes(nts, &loops);
    remove_silent_selfloops(&mut merged, silent);
    merged
}

/// Collapses weakly bisimilar states of `nts`. Only states of the same color are merged, and the
/// silent self-loops that merging produces are dropped. Silent cycles are allowed.
pub fn observation_equivalent_quotient<E, C, I>(
    nts: &Nts<E, C>,
    silent: I,
) -> Result<Nts<E, C>, BisimulationError<usize, E>>
where
    E: Symbol,
    C: Clone + Ord,
    I: IntoIterator<Item = E>,
{
    let silent = silent.into_iter().collect_vec();
    let colors = Partition::from_state_colors(nts);
    let partition = weak_bisimulation_saturated(nts, silent.iter().copied(), Some(&colors))?;

    let mut quotient = merge_equivalence_classes(nts, &partition);
    remove_silent_selfloops(&mut quotient, silent);
    Ok(quotient)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use crate::{prelude::*, tests::branching_nts};

    fn edge_set<C>(nts: &Nts<char, C>) -> BTreeSet<(usize, char, usize)> {
        nts.edges().collect()
    }

    #[test]
    fn quotient_by_delayed_bisimulation() {
        let ts = branching_nts();
        let partition = delayed_bisimulation(&ts, ['t'], None).unwrap();
        let mut quotient = merge_equivalence_classes(&ts, &partition);
        assert_eq!(
            quotient.state_indices().collect::<Vec<_>>(),
            vec![0, 1, 4, 6]
        );
        assert_eq!(
            edge_set(&quotient),
            BTreeSet::from([(0, 'a', 1), (1, 't', 1), (1, 'b', 4), (4, 'c', 6)])
        );

        assert_eq!(remove_silent_selfloops(&mut quotient, ['t']), 1);
        assert_eq!(remove_silent_selfloops(&mut quotient, ['t']), 0);
        assert!(!quotient.has_edge(1, 't', 1));
        assert_eq!(
            delayed_bisimulation(&quotient, ['t'], None).unwrap(),
            Partition::default()
        );
    }

    #[test]
    fn quotient_keeps_representative_color() {
        let ts = Nts::builder()
            .with_states([(0, 'x'), (1, 'y'), (2, 'y')])
            .with_edges([(0, 'a', 1), (0, 'a', 2)])
            .collect();
        let quotient = merge_equivalence_classes(&ts, &Partition::new([[1, 2]]));
        assert_eq!(quotient.state_color(1), Some(&'y'));
        assert_eq!(quotient.state_color(2), None);
        assert_eq!(quotient.edge_count(), 1);
    }

    #[test]
    fn silent_loops_are_merged() {
        let ts: Nts<char> = Nts::from_iter([
            (0, 't', 1),
            (1, 't', 0),
            (1, 'a', 2),
            (2, 't', 3),
            (3, 't', 2),
            (3, 'b', 4),
            (4, 't', 4),
        ]);
        assert!(delayed_bisimulation(&ts, ['t'], None).is_err());

        let merged = merge_silent_loops(&ts, ['t']);
        assert_eq!(
            merged.state_indices().collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
        assert_eq!(
            edge_set(&merged),
            BTreeSet::from([(0, 'a', 2), (2, 'b', 4)])
        );
        assert!(delayed_bisimulation(&merged, ['t'], None).is_ok());
    }

    #[test]
    fn observation_equivalence_respects_colors() {
        let ts = branching_nts();
        let quotient = observation_equivalent_quotient(&ts, ['t']).unwrap();
        assert_eq!(
            edge_set(&quotient),
            BTreeSet::from([(0, 'a', 1), (1, 'b', 4), (4, 'c', 6)])
        );

        // 6 is marked, so 6 and 7 and everything above them stay apart
        let marked = Nts::builder()
            .default_color(false)
            .with_states([(6, true)])
            .with_edges(ts.edges())
            .collect();
        let quotient = observation_equivalent_quotient(&marked, ['t']).unwrap();
        assert_eq!(quotient.size(), 7);
        assert_eq!(quotient.state_color(6), Some(&true));
    }
}
