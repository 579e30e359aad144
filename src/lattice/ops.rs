//! Algorithms over lattices: trimming, ordering, best path, beam pruning,
//! and conversion to the compact word-level form.

use crate::graph::{EPSILON, Label, StateId};
use crate::lattice::{
    CompactArc, CompactLattice, Lattice, LatticeArc, LatticeWeight, WeightedArc, WeightedFst,
};
use std::collections::VecDeque;

/// States that lie on some path from the start state to a final state.
fn useful_states<A: WeightedArc>(fst: &WeightedFst<A>) -> Vec<bool> {
    let n = fst.num_states();
    let mut accessible = vec![false; n];
    if let Some(start) = fst.start()
        && (start as usize) < n
    {
        let mut stack = vec![start];
        accessible[start as usize] = true;
        while let Some(s) = stack.pop() {
            for arc in fst.arcs(s) {
                let next = arc.next() as usize;
                if next < n && !accessible[next] {
                    accessible[next] = true;
                    stack.push(arc.next());
                }
            }
        }
    }

    let mut incoming: Vec<Vec<StateId>> = vec![Vec::new(); n];
    for (s, arc) in fst.iter_arcs() {
        if let Some(list) = incoming.get_mut(arc.next() as usize) {
            list.push(s);
        }
    }
    let mut coaccessible = vec![false; n];
    let mut stack: Vec<StateId> = (0..n as StateId).filter(|&s| fst.is_final(s)).collect();
    for &s in &stack {
        coaccessible[s as usize] = true;
    }
    while let Some(s) = stack.pop() {
        for &prev in &incoming[s as usize] {
            if !coaccessible[prev as usize] {
                coaccessible[prev as usize] = true;
                stack.push(prev);
            }
        }
    }

    accessible
        .iter()
        .zip(&coaccessible)
        .map(|(a, c)| *a && *c)
        .collect()
}

/// Remove every state that is unreachable from the start state or cannot
/// reach a final state, renumbering the survivors in their original order.
///
/// A lattice with no successful path becomes empty.
pub fn connect<A: WeightedArc>(fst: &mut WeightedFst<A>) {
    let keep = useful_states(fst);
    let Some(start) = fst.start().filter(|s| keep.get(*s as usize) == Some(&true)) else {
        fst.clear();
        return;
    };

    let mut new_id = vec![None; keep.len()];
    let mut next_id: StateId = 0;
    for (old, &k) in keep.iter().enumerate() {
        if k {
            new_id[old] = Some(next_id);
            next_id += 1;
        }
    }

    let old_states = std::mem::take(&mut fst.states);
    for (old, mut state) in old_states.into_iter().enumerate() {
        if !keep[old] {
            continue;
        }
        state.arcs.retain_mut(|arc| match new_id[arc.next() as usize] {
            Some(id) => {
                arc.set_next(id);
                true
            }
            None => false,
        });
        fst.states.push(state);
    }
    fst.start = new_id[start as usize];
}

/// True if [`connect`] would remove nothing.
pub fn is_connected<A: WeightedArc>(fst: &WeightedFst<A>) -> bool {
    if fst.is_empty() {
        return fst.num_states() == 0;
    }
    useful_states(fst).iter().all(|&k| k)
}

/// States in an order where every arc goes forward, or `None` if the
/// automaton has a cycle.
pub fn topological_order<A: WeightedArc>(fst: &WeightedFst<A>) -> Option<Vec<StateId>> {
    let n = fst.num_states();
    let mut in_degree = vec![0usize; n];
    for (_, arc) in fst.iter_arcs() {
        in_degree[arc.next() as usize] += 1;
    }
    let mut ready: VecDeque<StateId> = (0..n as StateId)
        .filter(|&s| in_degree[s as usize] == 0)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(s) = ready.pop_front() {
        order.push(s);
        for arc in fst.arcs(s) {
            let d = &mut in_degree[arc.next() as usize];
            *d -= 1;
            if *d == 0 {
                ready.push_back(arc.next());
            }
        }
    }
    (order.len() == n).then_some(order)
}

/// Forward costs from the start state, in topological order.
fn forward_costs<A: WeightedArc>(fst: &WeightedFst<A>, order: &[StateId]) -> Vec<f32> {
    let mut alpha = vec![f32::INFINITY; fst.num_states()];
    if let Some(start) = fst.start() {
        alpha[start as usize] = 0.0;
    }
    for &s in order {
        let a = alpha[s as usize];
        if !a.is_finite() {
            continue;
        }
        for arc in fst.arcs(s) {
            let cost = a + arc.weight().value();
            let slot = &mut alpha[arc.next() as usize];
            if cost < *slot {
                *slot = cost;
            }
        }
    }
    alpha
}

/// Costs from each state to the best final state.
fn backward_costs<A: WeightedArc>(fst: &WeightedFst<A>, order: &[StateId]) -> Vec<f32> {
    let mut beta = vec![f32::INFINITY; fst.num_states()];
    for &s in order.iter().rev() {
        let mut best = fst.final_weight(s).value();
        for arc in fst.arcs(s) {
            best = best.min(arc.weight().value() + beta[arc.next() as usize]);
        }
        beta[s as usize] = best;
    }
    beta
}

/// Best successful path through a lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub arcs: Vec<LatticeArc>,
    /// Product of all arc weights and the final weight.
    pub weight: LatticeWeight,
}

impl Path {
    /// Non-epsilon input labels (transition ids), one per frame.
    pub fn input_labels(&self) -> Vec<Label> {
        self.arcs
            .iter()
            .map(|a| a.ilabel)
            .filter(|&l| l != EPSILON)
            .collect()
    }

    /// Non-epsilon output labels (words).
    pub fn output_labels(&self) -> Vec<Label> {
        self.arcs
            .iter()
            .map(|a| a.olabel)
            .filter(|&l| l != EPSILON)
            .collect()
    }
}

/// Lowest-cost path from the start state to a final state.
///
/// Returns `None` for an empty or cyclic lattice, or when no final state
/// is reachable.
pub fn shortest_path(lat: &Lattice) -> Option<Path> {
    let start = lat.start()?;
    let order = topological_order(lat)?;
    let n = lat.num_states();

    let mut cost = vec![f32::INFINITY; n];
    let mut back: Vec<Option<(StateId, usize)>> = vec![None; n];
    cost[start as usize] = 0.0;
    for &s in &order {
        let c = cost[s as usize];
        if !c.is_finite() {
            continue;
        }
        for (i, arc) in lat.arcs(s).iter().enumerate() {
            let candidate = c + arc.weight.value();
            let next = arc.next as usize;
            if candidate < cost[next] {
                cost[next] = candidate;
                back[next] = Some((s, i));
            }
        }
    }

    let (best_final, _) = (0..n as StateId)
        .filter(|&s| lat.is_final(s))
        .map(|s| (s, cost[s as usize] + lat.final_weight(s).value()))
        .filter(|(_, c)| c.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    let mut arcs = Vec::new();
    let mut state = best_final;
    while let Some((prev, i)) = back[state as usize] {
        arcs.push(lat.arcs(prev)[i].clone());
        state = prev;
    }
    arcs.reverse();

    let weight = arcs
        .iter()
        .fold(LatticeWeight::ONE, |w, a| w.times(a.weight))
        .times(lat.final_weight(best_final));
    Some(Path { arcs, weight })
}

/// Drop every arc and final weight that lies only on paths costing more
/// than `beam` above the best path, then [`connect`].
///
/// Returns `false` (leaving the lattice unpruned) if it has a cycle.
pub fn prune<A: WeightedArc>(fst: &mut WeightedFst<A>, beam: f32) -> bool {
    let Some(order) = topological_order(fst) else {
        return false;
    };
    let Some(start) = fst.start() else {
        return true;
    };
    let alpha = forward_costs(fst, &order);
    let beta = backward_costs(fst, &order);
    let cutoff = beta[start as usize] + beam;

    for (s, state) in fst.states.iter_mut().enumerate() {
        let a = alpha[s];
        if a + state.final_weight.value() > cutoff {
            state.final_weight = LatticeWeight::ZERO;
        }
        state
            .arcs
            .retain(|arc| a + arc.weight().value() + beta[arc.next() as usize] <= cutoff);
    }
    connect(fst);
    true
}

/// Collapse a lattice into a word-level acceptor.
///
/// Runs of states with exactly one incoming and one outgoing arc are merged
/// into a single arc as long as the run carries at most one word. Each
/// compact arc keeps the transition ids it covers. The input should already
/// be connected.
pub fn to_compact(lat: &Lattice) -> CompactLattice {
    let mut out = CompactLattice::new();
    let Some(start) = lat.start() else {
        return out;
    };
    let n = lat.num_states();

    let mut in_count = vec![0usize; n];
    for (_, arc) in lat.iter_arcs() {
        in_count[arc.next as usize] += 1;
    }
    let chain_internal = |s: StateId| {
        s != start && !lat.is_final(s) && in_count[s as usize] == 1 && lat.arcs(s).len() == 1
    };

    let mut mapped: Vec<Option<StateId>> = vec![None; n];
    let mut queue = VecDeque::new();
    let new_start = out.add_state();
    out.set_start(new_start);
    mapped[start as usize] = Some(new_start);
    queue.push_back(start);

    while let Some(s) = queue.pop_front() {
        let Some(from) = mapped[s as usize] else {
            continue;
        };
        out.set_final(from, lat.final_weight(s));

        for arc in lat.arcs(s) {
            let mut alignment = Vec::new();
            if arc.ilabel != EPSILON {
                alignment.push(arc.ilabel);
            }
            let mut word = arc.olabel;
            let mut weight = arc.weight;
            let mut cur = arc.next;

            while chain_internal(cur) {
                let step = &lat.arcs(cur)[0];
                if word != EPSILON && step.olabel != EPSILON {
                    break;
                }
                if step.olabel != EPSILON {
                    word = step.olabel;
                }
                if step.ilabel != EPSILON {
                    alignment.push(step.ilabel);
                }
                weight = weight.times(step.weight);
                cur = step.next;
            }

            let to = match mapped[cur as usize] {
                Some(id) => id,
                None => {
                    let id = out.add_state();
                    mapped[cur as usize] = Some(id);
                    queue.push_back(cur);
                    id
                }
            };
            out.add_arc(
                from,
                CompactArc {
                    word,
                    weight,
                    alignment,
                    next: to,
                },
            );
        }
    }
    out
}
