//! Bisimulation partitions for finite, non-deterministic automata.
//!
//! The central entry points compute the coarsest strong, delayed or weak bisimulation of a
//! [`TransitionSystem`], optionally refining a caller-supplied [`Partition`]. Two strategies are
//! available: change tracking, which refines colors incrementally and handles the silent event
//! by walking the states in topological order, and saturation, which first materializes the
//! silent closure as ordinary transitions and then computes a strong bisimulation.
//!
//! ```
//! use automata_bisim::prelude::*;
//!
//! let ts: Nts<char> = Nts::from_iter([(1, 't', 2), (2, 'a', 3)]);
//! let partition = delayed_bisimulation(&ts, ['t'], None).unwrap();
//! assert_eq!(partition, Partition::new([[1, 2]]));
//! ```
#![warn(missing_docs)]

/// The prelude re-exports everything that is needed for computing bisimulations, i.e.
/// `use automata_bisim::prelude::*;` should be enough.
pub mod prelude {
    pub use super::{
        abstraction::{
            merge_equivalence_classes, merge_silent_loops, observation_equivalent_quotient,
            remove_silent_selfloops,
        },
        alphabet::Symbol,
        bisimulation::{
            bisimulation, delayed_bisimulation, delayed_bisimulation_saturated, weak_bisimulation,
            weak_bisimulation_saturated, Bisimulation, BisimulationError, Equivalence,
            PrePartitionDefect, Strategy,
        },
        partition::Partition,
        ts::{
            extend_transition_relation, install_selfloops, strongly_connected_components,
            topological_sort, CycleDetected, IndexType, Nts, Saturation, Sproutable,
            TransitionSystem,
        },
    };
}

mod alphabet;
pub use alphabet::Symbol;

/// Transition systems, their traversal and the saturation of silent steps.
pub mod ts;
pub use ts::{Nts, TransitionSystem};

mod partition;
pub use partition::Partition;

/// Computation of bisimulation partitions.
pub mod bisimulation;

/// Quotients and other abstractions built on top of bisimulation partitions.
pub mod abstraction;

/// Generation of random transition systems.
#[cfg(feature = "random")]
pub mod random;

/// Hash set used throughout the crate.
#[cfg(feature = "ahash")]
pub type Set<S> = ahash::HashSet<S>;
/// Hash map used throughout the crate.
#[cfg(feature = "ahash")]
pub type Map<K, V> = ahash::HashMap<K, V>;

/// Hash set used throughout the crate.
#[cfg(not(feature = "ahash"))]
pub type Set<S> = std::collections::HashSet<S>;
/// Hash map used throughout the crate.
#[cfg(not(feature = "ahash"))]
pub type Map<K, V> = std::collections::HashMap<K, V>;

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    /// Two branches that can only be told apart by what happens after the silent step.
    pub fn branching_nts() -> Nts<char> {
        Nts::from_iter([
            (0, 'a', 1),
            (0, 'a', 2),
            (1, 't', 3),
            (2, 'b', 4),
            (3, 'b', 5),
            (4, 'c', 6),
            (5, 'c', 7),
        ])
    }
}
