use std::fmt::{Debug, Display};

use thiserror::Error;

/// Describes why a pre-partition was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrePartitionDefect {
    /// The state is not contained in any class.
    Uncovered,
    /// The state is contained in more than one class.
    Overlapping,
    /// A class contains a state that the transition system does not have.
    UnknownState,
}

impl Display for PrePartitionDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrePartitionDefect::Uncovered => write!(f, "not covered by any class"),
            PrePartitionDefect::Overlapping => write!(f, "covered by more than one class"),
            PrePartitionDefect::UnknownState => write!(f, "not a state of the transition system"),
        }
    }
}

/// Represents the different ways in which a bisimulation computation can be rejected. All of
/// them are detected before the refinement starts, so no partial result is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BisimulationError<Q: Debug, E: Debug> {
    /// More than one distinct silent event was given.
    #[error("at most one silent event is supported, got {events:?}")]
    MultipleSilentEvents {
        /// The silent events, in ascending order.
        events: Vec<E>,
    },
    /// The silent sub-graph has a cycle. Such cycles have to be merged into single states
    /// beforehand, for example with [`crate::abstraction::merge_silent_loops`].
    #[error("state {state:?} lies on a cycle of silent transitions, merge silent loops first")]
    SilentCycle {
        /// A state on the cycle.
        state: Q,
    },
    /// The pre-partition does not assign every state to exactly one class.
    #[error("invalid pre-partition: state {state:?} is {defect}")]
    InvalidPrePartition {
        /// The offending state.
        state: Q,
        /// What is wrong with it.
        defect: PrePartitionDefect,
    },
}

impl<Q: Debug, E: Debug> BisimulationError<Q, E> {
    /// Renames the state mentioned by the error with `f`.
    pub fn map_state<R: Debug, F: FnOnce(Q) -> R>(self, f: F) -> BisimulationError<R, E> {
        match self {
            BisimulationError::MultipleSilentEvents { events } => {
                BisimulationError::MultipleSilentEvents { events }
            }
            BisimulationError::SilentCycle { state } => {
                BisimulationError::SilentCycle { state: f(state) }
            }
            BisimulationError::InvalidPrePartition { state, defect } => {
                BisimulationError::InvalidPrePartition {
                    state: f(state),
                    defect,
                }
            }
        }
    }
}
