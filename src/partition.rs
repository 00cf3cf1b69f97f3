use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::{
    ts::{IndexType, TransitionSystem},
    Nts, Symbol,
};

/// A collection of pairwise disjoint classes of states. Classes are kept in ascending order, so
/// two partitions compare equal exactly if they consist of the same classes.
///
/// Partitions appear in two roles: as the result of a bisimulation computation, where only the
/// classes with at least two states are listed, and as a pre-partition, which has to cover
/// every state of the transition system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition<Q: Ord>(Vec<BTreeSet<Q>>);

impl<Q: Ord> Default for Partition<Q> {
    fn default() -> Self {
        Self(vec![])
    }
}

impl<Q: IndexType> Partition<Q> {
    /// Builds a partition from the given classes. Empty classes are dropped.
    pub fn new<I, C>(classes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: IntoIterator<Item = Q>,
    {
        Self(
            classes
                .into_iter()
                .map(|class| class.into_iter().collect::<BTreeSet<_>>())
                .filter(|class| !class.is_empty())
                .sorted()
                .collect(),
        )
    }

    /// The partition with one class that contains every state of `ts`.
    pub fn universal<Ts: TransitionSystem<StateIndex = Q>>(ts: &Ts) -> Self {
        Self::new([ts.state_indices()])
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no classes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the classes.
    pub fn iter(&self) -> std::slice::Iter<'_, BTreeSet<Q>> {
        self.0.iter()
    }

    /// Returns the class with index `id`.
    pub fn get(&self, id: usize) -> Option<&BTreeSet<Q>> {
        self.0.get(id)
    }

    /// Attempts to find the index of the class containing `state`.
    pub fn class_of(&self, state: &Q) -> Option<usize> {
        self.0.iter().position(|class| class.contains(state))
    }

    /// Checks whether `p` and `q` are in the same class. States that are not listed are only
    /// related to themselves.
    pub fn related(&self, p: &Q, q: &Q) -> bool {
        p == q || self.class_of(p).is_some_and(|c| self.0[c].contains(q))
    }

    /// Drops all classes with fewer than two states.
    pub fn nontrivial(&self) -> Self {
        Self(self.0.iter().filter(|c| c.len() > 1).cloned().collect())
    }

    /// Checks whether `self` and `other` induce the same equivalence relation, that is whether
    /// they agree on all classes with at least two states.
    pub fn same_relation(&self, other: &Self) -> bool {
        self.nontrivial() == other.nontrivial()
    }

    /// Checks whether every class of `self` is contained in some class of `coarser`.
    pub fn refines(&self, coarser: &Self) -> bool {
        self.0.iter().all(|class| {
            let mut states = class.iter();
            let Some(first) = states.next() else {
                return true;
            };
            states.all(|q| coarser.related(first, q))
        })
    }

    /// Renames every state with `f`.
    pub fn map<R: IndexType, F: FnMut(Q) -> R>(self, mut f: F) -> Partition<R> {
        Partition::new(
            self.0
                .into_iter()
                .map(|class| class.into_iter().map(&mut f).collect_vec()),
        )
    }
}

impl Partition<usize> {
    /// Groups the states of `nts` by their color. Useful as a pre-partition that keeps, for
    /// example, marked and unmarked states apart.
    pub fn from_state_colors<E: Symbol, C: Ord>(nts: &Nts<E, C>) -> Self {
        let mut classes: BTreeMap<&C, Vec<usize>> = BTreeMap::new();
        for q in nts.state_indices() {
            if let Some(color) = nts.state_color(q) {
                classes.entry(color).or_default().push(q);
            }
        }
        Self::new(classes.into_values())
    }
}

impl<Q: Ord> IntoIterator for Partition<Q> {
    type Item = BTreeSet<Q>;
    type IntoIter = std::vec::IntoIter<BTreeSet<Q>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, Q: Ord> IntoIterator for &'a Partition<Q> {
    type Item = &'a BTreeSet<Q>;
    type IntoIter = std::slice::Iter<'a, BTreeSet<Q>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::prelude::*;

    #[test]
    fn partition_is_normalized() {
        let p = Partition::new([vec![5, 4], vec![], vec![0, 1]]);
        assert_eq!(p, Partition::new([vec![1, 0], vec![4, 5]]));
        assert_eq!(p.len(), 2);
        assert_eq!(p.class_of(&4), Some(1));
        assert!(p.related(&0, &1));
        assert!(p.related(&3, &3));
        assert!(!p.related(&1, &4));
    }

    #[test]
    fn partition_relations() {
        let fine = Partition::new([vec![0, 1], vec![2], vec![3, 4]]);
        let coarse = Partition::new([vec![0, 1, 2], vec![3, 4]]);
        assert!(fine.refines(&coarse));
        assert!(!coarse.refines(&fine));
        assert!(fine.same_relation(&Partition::new([vec![3, 4], vec![0, 1]])));
        assert!(!fine.same_relation(&coarse));
        assert_eq!(fine.map(|q| q * 10), Partition::new([vec![0, 10], vec![20], vec![30, 40]]));
    }

    #[test]
    fn partition_from_colors() {
        let ts = Nts::builder()
            .with_states([(0, true), (1, false), (2, true), (3, false)])
            .with_edges([(0, 'a', 1)])
            .collect();
        assert_eq!(
            Partition::from_state_colors(&ts),
            Partition::new([vec![0, 2], vec![1, 3]])
        );
    }
}
