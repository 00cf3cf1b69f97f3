use itertools::Itertools;
use tracing::debug;

use crate::{ts::Sproutable, Nts, Partition};

/// The silent event of generated transition systems.
pub const SILENT: char = 't';

/// Returns up to `symbols` lowercase letters, skipping [`SILENT`].
pub fn observable_events(symbols: usize) -> Vec<char> {
    ('a'..='z').filter(|c| *c != SILENT).take(symbols).collect()
}

/// Generates a random transition system with states `0..size` over `symbols` observable events
/// and [`SILENT`]. Each state gets `edges_per_state` attempts at inserting an edge; each attempt
/// picks the silent event with probability `1 / (symbols + 1)` and an observable event
/// otherwise. Observable edges may point anywhere, silent edges only to states with a larger
/// index, so the silent sub-graph is acyclic and the change tracking strategy accepts the result.
///
/// Runs are reproducible for a fixed seed of `rng`.
pub fn generate_random_nts(
    rng: &mut fastrand::Rng,
    size: usize,
    symbols: usize,
    edges_per_state: usize,
) -> Nts<char> {
    let events = observable_events(symbols);
    let mut nts = Nts::for_alphabet(events.iter().copied().chain([SILENT]));
    for q in 0..size {
        nts.add_state(q, ());
    }

    for p in 0..size {
        for _ in 0..edges_per_state {
            let silent = rng.usize(..=events.len()) == events.len();
            if silent {
                if p + 1 < size {
                    let q = rng.usize(p + 1..size);
                    nts.add_edge(p, SILENT, q);
                }
            } else {
                let e = events[rng.usize(..events.len())];
                let q = rng.usize(..size);
                nts.add_edge(p, e, q);
            }
        }
    }

    debug!(
        "generated transition system with {size} states and {} edges",
        nts.edge_count()
    );
    nts
}

/// Distributes the states `0..size` over at most `classes` classes at random. Useful as a
/// pre-partition for [`generate_random_nts`].
pub fn generate_random_partition(
    rng: &mut fastrand::Rng,
    size: usize,
    classes: usize,
) -> Partition<usize> {
    let classes = classes.max(1);
    Partition::new(
        (0..size)
            .map(|q| (rng.usize(..classes), q))
            .into_group_map()
            .into_values(),
    )
}
