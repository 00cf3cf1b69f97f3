use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    bisimulation::{BisimulationError, PrePartitionDefect},
    ts::{topological_sort, TransitionSystem},
    Map, Partition,
};

/// Slot of the silent event in the successor and cafter vectors of the abstract variants.
pub(crate) const SILENT: usize = 0;

/// A state of the transition system, flattened into vectors that are indexed by event slots and
/// by positions in the record array.
#[derive(Debug, Clone)]
pub(crate) struct StateRecord<Q> {
    pub(crate) id: Q,
    pub(crate) successors: Vec<Vec<usize>>,
    /// Sources of edges into this state. With a silent event, silent edges are excluded.
    pub(crate) predecessors: Vec<usize>,
    pub(crate) tau_predecessors: Vec<usize>,
    /// Sorted slots of the enabled events, closed under silent steps if there is a silent event.
    pub(crate) signature: Vec<usize>,
    pub(crate) cafter: Vec<BTreeSet<usize>>,
    pub(crate) color: usize,
}

/// The result of encoding, owned by a single refinement run.
#[derive(Debug, Clone)]
pub(crate) struct Encoded<Q> {
    pub(crate) states: Vec<StateRecord<Q>>,
    pub(crate) slots: usize,
}

/// Maps every state to the index of its class in `pre`, rejecting pre-partitions that do not
/// cover each state exactly once. An absent or empty pre-partition puts every state into class 0.
pub(crate) fn pre_partition_classes<Ts: TransitionSystem>(
    ts: &Ts,
    pre: Option<&Partition<Ts::StateIndex>>,
) -> Result<Map<Ts::StateIndex, usize>, BisimulationError<Ts::StateIndex, Ts::Event>> {
    let Some(pre) = pre.filter(|p| !p.is_empty()) else {
        return Ok(ts.state_indices().map(|q| (q, 0)).collect());
    };

    let mut classes = Map::default();
    for (i, class) in pre.iter().enumerate() {
        for &q in class {
            if !ts.contains_state(q) {
                return Err(BisimulationError::InvalidPrePartition {
                    state: q,
                    defect: PrePartitionDefect::UnknownState,
                });
            }
            if classes.insert(q, i).is_some() {
                return Err(BisimulationError::InvalidPrePartition {
                    state: q,
                    defect: PrePartitionDefect::Overlapping,
                });
            }
        }
    }
    if let Some(q) = ts.state_indices().find(|q| !classes.contains_key(q)) {
        return Err(BisimulationError::InvalidPrePartition {
            state: q,
            defect: PrePartitionDefect::Uncovered,
        });
    }
    Ok(classes)
}

/// Encodes `ts` into a record array. Without a silent event, every event of the alphabet gets
/// its own slot and the records follow the state order of `ts`. With a silent event, the silent
/// event occupies slot [`SILENT`], the silent sub-graph has to be acyclic and the records are
/// installed in reverse topological order of that sub-graph, so that every silent successor
/// precedes its silent predecessors.
pub(crate) fn encode<Ts: TransitionSystem>(
    ts: &Ts,
    silent: Option<Ts::Event>,
    pre: Option<&Partition<Ts::StateIndex>>,
) -> Result<Encoded<Ts::StateIndex>, BisimulationError<Ts::StateIndex, Ts::Event>> {
    let classes = pre_partition_classes(ts, pre)?;

    let order = match silent {
        Some(tau) => {
            let mut order = topological_sort(ts, &BTreeSet::from([tau]))
                .map_err(|cycle| BisimulationError::SilentCycle { state: cycle.state })?;
            order.reverse();
            order
        }
        None => ts.state_indices().collect_vec(),
    };

    let mut slot_of = BTreeMap::new();
    if let Some(tau) = silent {
        slot_of.insert(tau, SILENT);
    }
    for e in ts.events() {
        let next = slot_of.len();
        slot_of.entry(e).or_insert(next);
    }
    let slots = slot_of.len();
    debug!(
        "encoding {} states over {} event slots, silent event {:?}",
        order.len(),
        slots,
        silent
    );

    let position = order
        .iter()
        .enumerate()
        .map(|(i, q)| (*q, i))
        .collect::<Map<_, _>>();

    let mut states = order
        .iter()
        .map(|q| StateRecord {
            id: *q,
            successors: vec![vec![]; slots],
            predecessors: vec![],
            tau_predecessors: vec![],
            signature: vec![],
            cafter: vec![BTreeSet::new(); slots],
            color: classes[q],
        })
        .collect_vec();

    for (i, q) in order.iter().enumerate() {
        for (e, p) in ts.edges_from(*q).into_iter().flatten() {
            let (Some(&slot), Some(&j)) = (slot_of.get(&e), position.get(&p)) else {
                continue;
            };
            states[i].successors[slot].push(j);
            if silent.is_some() && slot == SILENT {
                states[j].tau_predecessors.push(i);
            } else {
                states[j].predecessors.push(i);
            }
        }
    }

    for i in 0..states.len() {
        let record = &mut states[i];
        for successors in record.successors.iter_mut() {
            successors.sort_unstable();
            successors.dedup();
        }
        record.predecessors.sort_unstable();
        record.predecessors.dedup();
        record.tau_predecessors.sort_unstable();
        record.tau_predecessors.dedup();

        let mut signature: BTreeSet<usize> = (0..slots)
            .filter(|&slot| !record.successors[slot].is_empty())
            .filter(|&slot| silent.is_none() || slot != SILENT)
            .collect();
        if silent.is_some() {
            // silent successors have smaller positions and are complete already
            for &j in &states[i].successors[SILENT] {
                signature.extend(states[j].signature.iter().copied());
            }
        }
        states[i].signature = signature.into_iter().collect();
        trace!(
            "state {:?} has signature {:?} and pre-color {}",
            states[i].id,
            states[i].signature,
            states[i].color
        );
    }

    Ok(Encoded { states, slots })
}
