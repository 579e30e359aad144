//! Lattices produced by the decoder.
//!
//! A [`Lattice`] has one arc per decoded transition: input labels are
//! transition ids, output labels are words, and epsilon (0) fills either
//! side. A [`CompactLattice`] is the word-level acceptor derived from it,
//! where each arc carries the transition ids it spans.

pub mod ops;
pub mod weight;

pub use ops::{Path, connect, is_connected, prune, shortest_path, to_compact, topological_order};
pub use weight::{LatticeWeight, unscale_factor};

use crate::graph::{Label, StateId};

/// Common view of lattice arc types for the generic algorithms in [`ops`].
pub trait WeightedArc: Clone {
    fn next(&self) -> StateId;
    fn set_next(&mut self, next: StateId);
    fn weight(&self) -> LatticeWeight;
    fn weight_mut(&mut self) -> &mut LatticeWeight;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatticeArc {
    pub ilabel: Label,
    pub olabel: Label,
    pub weight: LatticeWeight,
    pub next: StateId,
}

impl WeightedArc for LatticeArc {
    fn next(&self) -> StateId {
        self.next
    }

    fn set_next(&mut self, next: StateId) {
        self.next = next;
    }

    fn weight(&self) -> LatticeWeight {
        self.weight
    }

    fn weight_mut(&mut self) -> &mut LatticeWeight {
        &mut self.weight
    }
}

/// Word arc of a compact lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactArc {
    /// Word id, or epsilon.
    pub word: Label,
    pub weight: LatticeWeight,
    /// Transition ids consumed along this arc, one per frame.
    pub alignment: Vec<Label>,
    pub next: StateId,
}

impl WeightedArc for CompactArc {
    fn next(&self) -> StateId {
        self.next
    }

    fn set_next(&mut self, next: StateId) {
        self.next = next;
    }

    fn weight(&self) -> LatticeWeight {
        self.weight
    }

    fn weight_mut(&mut self) -> &mut LatticeWeight {
        &mut self.weight
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FstState<A> {
    arcs: Vec<A>,
    final_weight: LatticeWeight,
}

/// Mutable weighted automaton over lattice weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedFst<A> {
    start: Option<StateId>,
    states: Vec<FstState<A>>,
}

pub type Lattice = WeightedFst<LatticeArc>;
pub type CompactLattice = WeightedFst<CompactArc>;

impl<A> Default for WeightedFst<A> {
    fn default() -> Self {
        Self {
            start: None,
            states: Vec::new(),
        }
    }
}

impl<A: WeightedArc> WeightedFst<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a non-final state with no arcs.
    pub fn add_state(&mut self) -> StateId {
        self.states.push(FstState {
            arcs: Vec::new(),
            final_weight: LatticeWeight::ZERO,
        });
        (self.states.len() - 1) as StateId
    }

    pub fn set_start(&mut self, state: StateId) {
        self.start = Some(state);
    }

    pub fn start(&self) -> Option<StateId> {
        self.start
    }

    pub fn add_arc(&mut self, state: StateId, arc: A) {
        if let Some(s) = self.states.get_mut(state as usize) {
            s.arcs.push(arc);
        }
    }

    pub fn set_final(&mut self, state: StateId, weight: LatticeWeight) {
        if let Some(s) = self.states.get_mut(state as usize) {
            s.final_weight = weight;
        }
    }

    pub fn final_weight(&self, state: StateId) -> LatticeWeight {
        self.states
            .get(state as usize)
            .map_or(LatticeWeight::ZERO, |s| s.final_weight)
    }

    pub fn is_final(&self, state: StateId) -> bool {
        !self.final_weight(state).is_zero()
    }

    pub fn arcs(&self, state: StateId) -> &[A] {
        self.states
            .get(state as usize)
            .map_or(&[], |s| s.arcs.as_slice())
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_arcs(&self) -> usize {
        self.states.iter().map(|s| s.arcs.len()).sum()
    }

    /// True when there is no start state.
    pub fn is_empty(&self) -> bool {
        self.start.is_none()
    }

    /// Multiply every acoustic cost, including final weights, by `factor`.
    pub fn scale_acoustic(&mut self, factor: f32) {
        for state in &mut self.states {
            state.final_weight = state.final_weight.scale_acoustic(factor);
            for arc in &mut state.arcs {
                let w = arc.weight_mut();
                *w = w.scale_acoustic(factor);
            }
        }
    }

    /// Undo search-time acoustic scaling. A zero scale leaves weights untouched.
    pub fn rescale_acoustic(&mut self, acoustic_scale: f32) {
        if let Some(factor) = unscale_factor(acoustic_scale) {
            self.scale_acoustic(factor);
        }
    }

    /// Iterate all `(state, arc)` pairs.
    pub fn iter_arcs(&self) -> impl Iterator<Item = (StateId, &A)> {
        self.states
            .iter()
            .enumerate()
            .flat_map(|(s, state)| state.arcs.iter().map(move |a| (s as StateId, a)))
    }

    fn clear(&mut self) {
        self.start = None;
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn arc(ilabel: Label, olabel: Label, graph: f32, acoustic: f32, next: StateId) -> LatticeArc {
        LatticeArc {
            ilabel,
            olabel,
            weight: LatticeWeight::new(graph, acoustic),
            next,
        }
    }

    #[test]
    fn build_and_query() {
        let mut lat = Lattice::new();
        let s0 = lat.add_state();
        let s1 = lat.add_state();
        lat.set_start(s0);
        lat.add_arc(s0, arc(1, 0, 0.5, 2.0, s1));
        lat.set_final(s1, LatticeWeight::ONE);

        assert_eq!(lat.num_states(), 2);
        assert_eq!(lat.num_arcs(), 1);
        assert!(lat.is_final(s1));
        assert!(!lat.is_final(s0));
        assert_eq!(lat.iter_arcs().count(), 1);
    }

    #[test]
    fn rescale_divides_every_acoustic_cost() {
        let mut lat = Lattice::new();
        let s0 = lat.add_state();
        let s1 = lat.add_state();
        lat.set_start(s0);
        lat.add_arc(s0, arc(1, 0, 1.0, 7.69, s1));
        lat.set_final(s1, LatticeWeight::new(0.0, 0.769));

        lat.rescale_acoustic(0.0769);

        let w = lat.arcs(s0)[0].weight;
        assert_eq!(w.graph, 1.0);
        assert!((w.acoustic - 100.0).abs() < 1e-3);
        assert!((lat.final_weight(s1).acoustic - 10.0).abs() < 1e-4);
    }

    #[test]
    fn zero_scale_leaves_weights_unmodified() {
        let mut lat = Lattice::new();
        let s0 = lat.add_state();
        lat.set_start(s0);
        lat.add_arc(s0, arc(1, 0, 0.0, 5.0, s0));

        lat.rescale_acoustic(0.0);

        assert_eq!(lat.arcs(s0)[0].weight.acoustic, 5.0);
    }
}
