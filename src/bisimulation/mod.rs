use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::{
    ts::{
        extend_transition_relation, install_selfloops, EventOf, IndexType, Saturation, StateOf,
        TransitionSystem,
    },
    Nts, Partition, Symbol,
};

mod encode;
use encode::{encode, pre_partition_classes};

mod kernel;
use kernel::Refinement;

mod silent;

mod error;
pub use error::{BisimulationError, PrePartitionDefect};

/// The outcome of a bisimulation computation on `Ts`.
pub type BisimulationResult<Ts> =
    Result<Partition<StateOf<Ts>>, BisimulationError<StateOf<Ts>, EventOf<Ts>>>;

/// The equivalence that is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Equivalence {
    /// Every event is observable, silent events are ignored.
    Strong,
    /// Silent steps may be taken before an observable step is matched.
    Delayed,
    /// Silent steps may be taken before and after an observable step is matched.
    Weak,
}

/// How the silent event is dealt with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Walks the states in topological order of the silent sub-graph and recomputes only what
    /// changed. Requires the silent sub-graph to be acyclic.
    #[default]
    ChangeTracking,
    /// Materializes the silent closure as ordinary transitions and computes a strong bisimulation
    /// of the result. Works on a copy of the transition system and tolerates silent cycles.
    Saturation,
}

/// Collects the parameters of a bisimulation computation.
///
/// ```
/// use automata_bisim::prelude::*;
///
/// let ts: Nts<char> = Nts::from_iter([(0, 't', 1), (1, 'a', 2), (3, 'a', 2)]);
/// let partition = Bisimulation::new(Equivalence::Weak)
///     .silent(['t'])
///     .strategy(Strategy::Saturation)
///     .compute(&ts)
///     .unwrap();
/// assert_eq!(partition, Partition::new([[0, 1, 3]]));
/// ```
#[derive(Debug, Clone)]
pub struct Bisimulation<Q: Ord, E> {
    equivalence: Equivalence,
    silent: BTreeSet<E>,
    pre_partition: Option<Partition<Q>>,
    strategy: Strategy,
}

impl<Q: IndexType, E: Symbol> Bisimulation<Q, E> {
    /// Starts a computation of the given equivalence without silent events and pre-partition.
    pub fn new(equivalence: Equivalence) -> Self {
        Self {
            equivalence,
            silent: BTreeSet::new(),
            pre_partition: None,
            strategy: Strategy::default(),
        }
    }

    /// Designates `events` as silent. At most one distinct silent event is supported.
    pub fn silent<I: IntoIterator<Item = E>>(mut self, events: I) -> Self {
        self.silent.extend(events);
        self
    }

    /// The result will refine `pre_partition`, which has to cover every state exactly once.
    pub fn pre_partition(mut self, pre_partition: Partition<Q>) -> Self {
        self.pre_partition = Some(pre_partition);
        self
    }

    /// Selects the strategy for handling the silent event.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Runs the computation on `ts`.
    pub fn compute<Ts>(&self, ts: &Ts) -> BisimulationResult<Ts>
    where
        Ts: TransitionSystem<StateIndex = Q, Event = E>,
    {
        compute(
            ts,
            self.equivalence,
            self.silent.iter().copied(),
            self.pre_partition.as_ref(),
            self.strategy,
        )
    }
}

/// Computes the coarsest strong bisimulation of `ts` that refines `pre_partition`. Only classes
/// with at least two states are returned.
///
/// ```
/// use automata_bisim::prelude::*;
///
/// let ts: Nts<char> = Nts::from_iter([(1, 'a', 2), (1, 'a', 3)]);
/// assert_eq!(bisimulation(&ts, None).unwrap(), Partition::new([[2, 3]]));
/// ```
pub fn bisimulation<Ts: TransitionSystem>(
    ts: &Ts,
    pre_partition: Option<&Partition<Ts::StateIndex>>,
) -> BisimulationResult<Ts> {
    compute(ts, Equivalence::Strong, [], pre_partition, Strategy::ChangeTracking)
}

/// Computes the coarsest delayed bisimulation of `ts` that refines `pre_partition`, where the
/// events in `silent` are unobservable. The silent sub-graph has to be acyclic.
pub fn delayed_bisimulation<Ts, I>(
    ts: &Ts,
    silent: I,
    pre_partition: Option<&Partition<Ts::StateIndex>>,
) -> BisimulationResult<Ts>
where
    Ts: TransitionSystem,
    I: IntoIterator<Item = Ts::Event>,
{
    compute(
        ts,
        Equivalence::Delayed,
        silent,
        pre_partition,
        Strategy::ChangeTracking,
    )
}

/// Computes the coarsest weak bisimulation of `ts` that refines `pre_partition`, where the
/// events in `silent` are unobservable. The silent sub-graph has to be acyclic.
pub fn weak_bisimulation<Ts, I>(
    ts: &Ts,
    silent: I,
    pre_partition: Option<&Partition<Ts::StateIndex>>,
) -> BisimulationResult<Ts>
where
    Ts: TransitionSystem,
    I: IntoIterator<Item = Ts::Event>,
{
    compute(
        ts,
        Equivalence::Weak,
        silent,
        pre_partition,
        Strategy::ChangeTracking,
    )
}

/// Same as [`delayed_bisimulation`], but computed by saturating a copy of `ts`.
pub fn delayed_bisimulation_saturated<Ts, I>(
    ts: &Ts,
    silent: I,
    pre_partition: Option<&Partition<Ts::StateIndex>>,
) -> BisimulationResult<Ts>
where
    Ts: TransitionSystem,
    I: IntoIterator<Item = Ts::Event>,
{
    compute(
        ts,
        Equivalence::Delayed,
        silent,
        pre_partition,
        Strategy::Saturation,
    )
}

/// Same as [`weak_bisimulation`], but computed by saturating a copy of `ts`.
pub fn weak_bisimulation_saturated<Ts, I>(
    ts: &Ts,
    silent: I,
    pre_partition: Option<&Partition<Ts::StateIndex>>,
) -> BisimulationResult<Ts>
where
    Ts: TransitionSystem,
    I: IntoIterator<Item = Ts::Event>,
{
    compute(
        ts,
        Equivalence::Weak,
        silent,
        pre_partition,
        Strategy::Saturation,
    )
}

fn compute<Ts, I>(
    ts: &Ts,
    equivalence: Equivalence,
    silent: I,
    pre_partition: Option<&Partition<Ts::StateIndex>>,
    strategy: Strategy,
) -> BisimulationResult<Ts>
where
    Ts: TransitionSystem,
    I: IntoIterator<Item = Ts::Event>,
{
    let tau = match equivalence {
        Equivalence::Strong => None,
        _ => {
            let tau = single_silent::<Ts::StateIndex, _, _>(silent)?;
            if tau.is_none() {
                warn!(
                    "no silent event given, computing {equivalence:?} bisimulation as strong \
                     bisimulation"
                );
            }
            tau
        }
    };

    let Some(tau) = tau else {
        return Ok(Refinement::new(encode(ts, None, pre_partition)?).run(Equivalence::Strong));
    };
    match strategy {
        Strategy::ChangeTracking => {
            Ok(Refinement::new(encode(ts, Some(tau), pre_partition)?).run(equivalence))
        }
        Strategy::Saturation => {
            let mode = match equivalence {
                Equivalence::Weak => Saturation::Weak,
                _ => Saturation::Delayed,
            };
            saturated(ts, tau, pre_partition, mode)
        }
    }
}

/// Deduplicates the silent events and rejects more than one.
fn single_silent<Q, E, I>(silent: I) -> Result<Option<E>, BisimulationError<Q, E>>
where
    Q: std::fmt::Debug,
    E: Symbol,
    I: IntoIterator<Item = E>,
{
    let events: BTreeSet<E> = silent.into_iter().collect();
    if events.len() > 1 {
        return Err(BisimulationError::MultipleSilentEvents {
            events: events.into_iter().collect(),
        });
    }
    Ok(events.into_iter().next())
}

/// Copies `ts` into a dense [`Nts`], closes it under silent steps, adds silent self-loops and
/// computes a strong bisimulation of the result.
fn saturated<Ts: TransitionSystem>(
    ts: &Ts,
    tau: Ts::Event,
    pre_partition: Option<&Partition<Ts::StateIndex>>,
    mode: Saturation,
) -> BisimulationResult<Ts> {
    let classes = pre_partition_classes(ts, pre_partition)?;
    let (mut nts, ids): (Nts<Ts::Event>, _) = Nts::from_ts(ts);
    let dense = Partition::new(
        ids.iter()
            .enumerate()
            .map(|(i, q)| (classes[q], i))
            .into_group_map()
            .into_values(),
    );

    let inserted = extend_transition_relation(&mut nts, [tau], mode);
    let loops = install_selfloops(&mut nts, [tau]);
    debug!(
        "saturated copy has {} states and {} edges ({inserted} derived, {loops} self-loops)",
        ids.len(),
        nts.edge_count()
    );

    let encoded = encode(&nts, None, Some(&dense)).map_err(|err| err.map_state(|i| ids[i]))?;
    Ok(Refinement::new(encoded)
        .run(Equivalence::Strong)
        .map(|i| ids[i]))
}
