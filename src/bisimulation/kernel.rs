use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    bisimulation::{
        encode::{Encoded, StateRecord},
        Equivalence,
    },
    ts::IndexType,
    Partition,
};

/// A single run of the change tracking algorithm. All records live in one vector and refer to
/// each other by position; the run owns them until [`Refinement::run`] turns the final coloring
/// into a [`Partition`].
#[derive(Debug, Clone)]
pub(crate) struct Refinement<Q> {
    pub(super) states: Vec<StateRecord<Q>>,
    /// Positions of the records, sorted by color.
    pub(super) order: Vec<usize>,
    pub(super) affected: Vec<bool>,
    pub(super) changed: Vec<bool>,
    pub(super) slots: usize,
    colors: usize,
}

impl<Q: IndexType> Refinement<Q> {
    pub(crate) fn new(encoded: Encoded<Q>) -> Self {
        let size = encoded.states.len();
        Self {
            states: encoded.states,
            order: (0..size).collect(),
            affected: vec![false; size],
            changed: vec![true; size],
            slots: encoded.slots,
            colors: 0,
        }
    }

    fn fresh_color(&mut self) -> usize {
        self.colors += 1;
        self.colors
    }

    /// Refines until no state changes its color and returns the classes with at least two states.
    pub(crate) fn run(mut self, equivalence: Equivalence) -> Partition<Q> {
        debug!(
            "computing {equivalence:?} bisimulation of {} states",
            self.states.len()
        );
        self.first_step_approximation();

        let mut pass = 0;
        loop {
            match equivalence {
                Equivalence::Strong => self.mark_affected(),
                Equivalence::Delayed => self.mark_delayed_affected(),
                Equivalence::Weak => self.mark_weak_affected(),
            }
            match equivalence {
                Equivalence::Strong => self.compute_changed_afters(),
                Equivalence::Delayed => self.compute_changed_delayed_afters(),
                Equivalence::Weak => self.compute_changed_observed_afters(),
            }
            let changed = self.refine_changed();
            pass += 1;
            debug!(
                "pass {pass}: {} affected, {changed} changed, {} colors",
                self.affected.iter().filter(|a| **a).count(),
                self.colors
            );
            if changed == 0 {
                break;
            }
        }

        self.into_partition()
    }

    /// Assigns one color per combination of signature and pre-partition class. Afterwards `order`
    /// is sorted by color.
    fn first_step_approximation(&mut self) {
        let states = &self.states;
        self.order.sort_by(|&p, &q| {
            (&states[p].signature, states[p].color).cmp(&(&states[q].signature, states[q].color))
        });

        self.colors = 0;
        let mut last: Option<(Vec<usize>, usize)> = None;
        let mut color = 0;
        for i in 0..self.order.len() {
            let s = self.order[i];
            let key = (self.states[s].signature.clone(), self.states[s].color);
            if last.as_ref() != Some(&key) {
                color = self.fresh_color();
                last = Some(key);
            }
            self.states[s].color = color;
        }
        debug!("first step approximation yields {} classes", self.colors);
    }

    /// A state is affected if one of its successors changed its color in the last pass. Initially
    /// every state counts as changed, so the first pass recomputes every state with a successor.
    fn mark_affected(&mut self) {
        self.affected.fill(false);
        for s in 0..self.states.len() {
            if !self.changed[s] {
                continue;
            }
            for &p in &self.states[s].predecessors {
                self.affected[p] = true;
            }
        }
    }

    fn compute_changed_afters(&mut self) {
        for s in 0..self.states.len() {
            if !self.affected[s] {
                continue;
            }
            let cafter = self.states[s]
                .successors
                .iter()
                .map(|successors| {
                    successors
                        .iter()
                        .map(|&t| self.states[t].color)
                        .collect::<BTreeSet<_>>()
                })
                .collect_vec();
            trace!("cafter of {:?} is {:?}", self.states[s].id, cafter);
            self.states[s].cafter = cafter;
        }
    }

    /// Splits every class that contains an affected state according to the cafter vectors of its
    /// members. The largest group keeps the color of the class, all other groups obtain fresh
    /// colors and are marked as changed. Returns the number of changed states.
    fn refine_changed(&mut self) -> usize {
        self.changed.fill(false);
        let mut changed = 0;

        let mut start = 0;
        while start < self.order.len() {
            let color = self.states[self.order[start]].color;
            let end = start
                + self.order[start..]
                    .iter()
                    .take_while(|&&s| self.states[s].color == color)
                    .count();
            let class = &self.order[start..end];
            start = end;
            if class.len() < 2 || !class.iter().any(|&s| self.affected[s]) {
                continue;
            }

            let mut members = class.to_vec();
            members.sort_by(|&p, &q| self.states[p].cafter.cmp(&self.states[q].cafter));
            let groups = {
                let grouped = members
                    .into_iter()
                    .group_by(|&s| &self.states[s].cafter);
                let groups = grouped
                    .into_iter()
                    .map(|(_, group)| group.collect_vec())
                    .collect_vec();
                groups
            };
            if groups.len() < 2 {
                continue;
            }

            let keep = groups.iter().position_max_by_key(|g| g.len()).unwrap_or(0);
            trace!(
                "splitting class {color} into {} groups, group {keep} keeps the color",
                groups.len()
            );
            for (i, group) in groups.into_iter().enumerate() {
                if i == keep {
                    continue;
                }
                let fresh = self.fresh_color();
                for s in group {
                    self.states[s].color = fresh;
                    self.changed[s] = true;
                    changed += 1;
                }
            }
        }

        let states = &self.states;
        self.order.sort_by_key(|&s| states[s].color);
        changed
    }

    /// Collects runs of equal color from `order` and translates them back to state indices.
    fn into_partition(self) -> Partition<Q> {
        let states = &self.states;
        let grouped = self.order.iter().group_by(|&&s| states[s].color);
        let classes = grouped
            .into_iter()
            .map(|(_, class)| class.map(|&s| states[s].id).collect_vec())
            .filter(|class| class.len() > 1)
            .collect_vec();
        Partition::new(classes)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{bisimulation::encode::encode, prelude::*};

    fn refinement(ts: &Nts<char>, pre: Option<&Partition<usize>>) -> Refinement<usize> {
        Refinement::new(encode(ts, None, pre).unwrap())
    }

    #[test]
    fn first_step_separates_signatures_and_pre_classes() {
        let ts: Nts<char> = Nts::from_iter([(0, 'a', 1), (2, 'a', 3), (4, 'b', 1)]);
        let pre = Partition::new([vec![0, 1, 3, 4], vec![2]]);
        let mut run = refinement(&ts, Some(&pre));
        run.first_step_approximation();

        let color = |q: usize| run.states.iter().find(|s| s.id == q).unwrap().color;
        assert_eq!(color(1), color(3));
        assert_ne!(color(0), color(2));
        assert_ne!(color(0), color(4));
        assert_ne!(color(0), color(1));
        assert_eq!(run.colors, 4);
        assert!(run
            .order
            .windows(2)
            .all(|w| run.states[w[0]].color <= run.states[w[1]].color));
    }

    #[test]
    fn refinement_of_a_chain() {
        // 0 -a-> 1 -a-> 2 -a-> 3, all states except 3 enable `a`, only the distance to 3
        // separates them
        let ts: Nts<char> = Nts::from_iter([(0, 'a', 1), (1, 'a', 2), (2, 'a', 3)]);
        assert_eq!(refinement(&ts, None).run(Equivalence::Strong), Partition::default());

        let looping: Nts<char> = Nts::from_iter([
            (0, 'a', 1),
            (1, 'a', 2),
            (2, 'a', 0),
            (3, 'a', 3),
        ]);
        assert_eq!(
            refinement(&looping, None).run(Equivalence::Strong),
            Partition::new([vec![0, 1, 2, 3]])
        );
    }

    #[test]
    fn nondeterministic_branches() {
        let ts: Nts<char> = Nts::from_iter([
            (0, 'a', 1),
            (0, 'a', 2),
            (3, 'a', 4),
            (1, 'b', 5),
            (2, 'c', 5),
            (4, 'b', 5),
            (4, 'c', 5),
        ]);
        // 0 can choose between `b` and `c` after `a`, 3 has to offer both
        assert_eq!(refinement(&ts, None).run(Equivalence::Strong), Partition::default());
        let pre = Partition::new([vec![0, 1, 2, 3, 4], vec![5]]);
        assert_eq!(refinement(&ts, Some(&pre)).run(Equivalence::Strong), Partition::default());

        let merged: Nts<char> = Nts::from_iter([
            (0, 'a', 1),
            (0, 'a', 2),
            (1, 'b', 3),
            (2, 'b', 3),
        ]);
        let pre = Partition::new([vec![0, 1, 2], vec![3]]);
        assert_eq!(
            refinement(&merged, Some(&pre)).run(Equivalence::Strong),
            Partition::new([vec![1, 2]])
        );
    }
}
