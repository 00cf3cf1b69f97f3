//! The parts of the change tracking algorithm that differ for delayed and weak bisimulation.
//! Both rely on the records being ordered such that silent successors come first, which the
//! encoder guarantees, so a single forward scan sees the final cafter sets of all silent
//! successors of a state before the state itself.

use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::trace;

use crate::{
    bisimulation::{encode::SILENT, kernel::Refinement},
    ts::IndexType,
    Set,
};

impl<Q: IndexType> Refinement<Q> {
    /// Marks `state` and everything that reaches it by silent steps only. Marked states are
    /// skipped, since their silent predecessors are marked already.
    fn mark_tau_star(&self, marks: &mut [bool], state: usize) {
        let mut stack = vec![state];
        while let Some(s) = stack.pop() {
            if marks[s] {
                continue;
            }
            marks[s] = true;
            stack.extend(
                self.states[s]
                    .tau_predecessors
                    .iter()
                    .copied()
                    .filter(|&p| !marks[p]),
            );
        }
    }

    /// Collects `state` and everything that reaches it by silent steps only.
    fn tau_star_predecessors(&self, state: usize) -> Set<usize> {
        let mut seen = Set::from_iter([state]);
        let mut stack = vec![state];
        while let Some(s) = stack.pop() {
            for &p in &self.states[s].tau_predecessors {
                if seen.insert(p) {
                    stack.push(p);
                }
            }
        }
        seen
    }

    /// A change of color of some state influences the delayed cafter sets of the state itself,
    /// of its observable predecessors and of everything that reaches one of those silently.
    pub(super) fn mark_delayed_affected(&mut self) {
        let mut affected = vec![false; self.states.len()];
        for s in 0..self.states.len() {
            if !self.changed[s] {
                continue;
            }
            for &p in &self.states[s].predecessors {
                self.mark_tau_star(&mut affected, p);
            }
            self.mark_tau_star(&mut affected, s);
        }
        self.affected = affected;
    }

    /// Weak cafter sets also look past trailing silent steps, so a change of color propagates
    /// to the observable predecessors of every state that silently reaches the changed one.
    pub(super) fn mark_weak_affected(&mut self) {
        let mut affected = vec![false; self.states.len()];
        for s in 0..self.states.len() {
            if !self.changed[s] {
                continue;
            }
            for t in self.tau_star_predecessors(s) {
                for &p in &self.states[t].predecessors {
                    self.mark_tau_star(&mut affected, p);
                }
                affected[t] = true;
            }
        }
        self.affected = affected;
    }

    /// Delayed cafter: staying put is a silent step, and for every event the cafter of a silent
    /// successor is inherited.
    pub(super) fn compute_changed_delayed_afters(&mut self) {
        for s in 0..self.states.len() {
            if !self.affected[s] {
                continue;
            }
            let record = &self.states[s];
            let mut cafter = vec![BTreeSet::new(); self.slots];
            cafter[SILENT].insert(record.color);
            for (slot, successors) in record.successors.iter().enumerate() {
                cafter[slot].extend(successors.iter().map(|&t| self.states[t].color));
            }
            for &t in &record.successors[SILENT] {
                debug_assert!(t < s, "silent successors have to be encoded first");
                for (slot, inherited) in self.states[t].cafter.iter().enumerate() {
                    cafter[slot].extend(inherited.iter().copied());
                }
            }
            trace!("delayed cafter of {:?} is {:?}", record.id, cafter);
            self.states[s].cafter = cafter;
        }
    }

    /// Weak cafter, computed in two scans. The first closes the silent slot under silent steps,
    /// the second lets every observable step absorb the silent closure of its targets and
    /// inherits the observable cafter of silent successors.
    pub(super) fn compute_changed_observed_afters(&mut self) {
        for s in 0..self.states.len() {
            if !self.affected[s] {
                continue;
            }
            let record = &self.states[s];
            let mut closure = BTreeSet::from([record.color]);
            for &t in &record.successors[SILENT] {
                closure.extend(self.states[t].cafter[SILENT].iter().copied());
            }
            let mut cafter = vec![BTreeSet::new(); self.slots];
            cafter[SILENT] = closure;
            self.states[s].cafter = cafter;
        }

        for s in 0..self.states.len() {
            if !self.affected[s] {
                continue;
            }
            let record = &self.states[s];
            let observed = (1..self.slots)
                .map(|slot| {
                    let mut after = BTreeSet::new();
                    for &t in &record.successors[slot] {
                        after.extend(self.states[t].cafter[SILENT].iter().copied());
                    }
                    for &t in &record.successors[SILENT] {
                        after.extend(self.states[t].cafter[slot].iter().copied());
                    }
                    after
                })
                .collect_vec();
            trace!(
                "weak cafter of {:?} is {:?} / {:?}",
                record.id,
                record.cafter[SILENT],
                observed
            );
            for (slot, after) in observed.into_iter().enumerate() {
                self.states[s].cafter[slot + 1] = after;
            }
        }
    }
}
