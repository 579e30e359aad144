//! Incremental lattice-generating search over the decode graph.
//!
//! Token passing with beam pruning: each call to [`LatticeDecoder::decode`]
//! advances the active hypotheses by as many frames as the scorer can
//! supply (up to a caller-chosen limit) and keeps every surviving
//! transition as a forward link, so a lattice can be read back at any time.

mod token;

use crate::config::DecoderConfig;
use crate::defaults;
use crate::graph::{DecodeGraph, EPSILON, Label, StateId};
use crate::lattice::{self, CompactLattice, Lattice, LatticeArc, LatticeWeight, unscale_factor};
use crate::scorer::Decodable;
use std::collections::HashMap;
use std::sync::Arc;
use token::{ForwardLink, FrameTokens, Token, TokenId};
use tracing::{debug, trace, warn};

/// Lifecycle of the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// No search state; the next `decode` starts from the graph's start state.
    Idle,
    Searching,
    /// `prune_final` has run. Decoding may still continue.
    Finalized,
}

/// Single best hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct BestPath {
    /// Frames decoded when the path was taken.
    pub num_frames: usize,
    /// Word ids, epsilons removed.
    pub words: Vec<Label>,
    /// One transition id per frame.
    pub alignment: Vec<Label>,
    /// Path weight with the acoustic part in model scale.
    pub weight: LatticeWeight,
}

pub struct LatticeDecoder {
    graph: Arc<DecodeGraph>,
    config: DecoderConfig,
    tokens: Vec<Token>,
    /// Slots in `tokens` released by pruning, reused before the arena grows.
    free: Vec<TokenId>,
    /// `frames[t]` holds tokens after `t` frames have been consumed.
    frames: Vec<FrameTokens>,
    /// Per consumed frame, the offset added to acoustic costs to keep them near zero.
    cost_offsets: Vec<f32>,
    /// Graph state to token, for the newest frame.
    active: HashMap<StateId, TokenId>,
    start_token: Option<TokenId>,
    /// Final costs of newest-frame tokens, computed by `prune_final`.
    final_costs: HashMap<TokenId, f32>,
    state: DecoderState,
    warned_dead_search: bool,
}

impl LatticeDecoder {
    pub fn new(graph: Arc<DecodeGraph>, config: DecoderConfig) -> Self {
        Self {
            graph,
            config,
            tokens: Vec::new(),
            free: Vec::new(),
            frames: Vec::new(),
            cost_offsets: Vec::new(),
            active: HashMap::new(),
            start_token: None,
            final_costs: HashMap::new(),
            state: DecoderState::Idle,
            warned_dead_search: false,
        }
    }

    pub fn graph(&self) -> &Arc<DecodeGraph> {
        &self.graph
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn num_frames_decoded(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    /// Tokens alive on the newest frame.
    pub fn num_active_tokens(&self) -> usize {
        self.active.len()
    }

    /// Discard all search state and return to [`DecoderState::Idle`].
    pub fn reset(&mut self) {
        self.tokens.clear();
        self.free.clear();
        self.frames.clear();
        self.cost_offsets.clear();
        self.active.clear();
        self.start_token = None;
        self.final_costs.clear();
        self.state = DecoderState::Idle;
        self.warned_dead_search = false;
        debug!("Decoder reset");
    }

    fn init_decoding(&mut self) {
        self.reset();
        self.frames.push(FrameTokens::new());
        let (start, _) = self.find_or_add_token(0, self.graph.start(), 0.0);
        self.start_token = Some(start);
        self.state = DecoderState::Searching;
        self.process_nonemitting(self.config.beam);
    }

    /// Advance the search by at most `max_frames` frames.
    ///
    /// Stops early when the scorer has no further frame ready or reports the
    /// last frame. Returns the number of frames consumed.
    pub fn decode<D: Decodable>(&mut self, decodable: &mut D, max_frames: usize) -> usize {
        match self.state {
            DecoderState::Idle => self.init_decoding(),
            DecoderState::Finalized => {
                self.final_costs.clear();
                self.state = DecoderState::Searching;
            }
            DecoderState::Searching => {}
        }

        let mut consumed = 0;
        while consumed < max_frames {
            let frame = self.num_frames_decoded();
            if !decodable.is_frame_ready(frame) {
                break;
            }
            if frame > 0 && frame % self.config.prune_interval.max(1) == 0 {
                self.prune_active_tokens(self.config.lattice_beam * defaults::PRUNE_SCALE);
            }
            let next_cutoff = self.process_emitting(decodable, frame);
            self.process_nonemitting(next_cutoff);
            consumed += 1;

            if self.active.is_empty() && !self.warned_dead_search {
                warn!(frame, "No active tokens left; the decode graph has no viable path");
                self.warned_dead_search = true;
            }
            if decodable.is_last_frame(frame) {
                break;
            }
        }

        debug!(
            requested = max_frames,
            consumed,
            frames_decoded = self.num_frames_decoded(),
            active = self.active.len(),
            "Decode step"
        );
        consumed
    }

    /// Token for `state` on `frame`, created if needed. Returns whether the
    /// token is new or its cost improved.
    fn find_or_add_token(&mut self, frame: usize, state: StateId, tot_cost: f32) -> (TokenId, bool) {
        if let Some(&id) = self.active.get(&state) {
            let token = &mut self.tokens[id];
            if tot_cost < token.tot_cost {
                token.tot_cost = tot_cost;
                return (id, true);
            }
            return (id, false);
        }
        let token = Token::new(state, tot_cost);
        let id = match self.free.pop() {
            Some(id) => {
                self.tokens[id] = token;
                id
            }
            None => {
                self.tokens.push(token);
                self.tokens.len() - 1
            }
        };
        self.frames[frame].tokens.push(id);
        self.active.insert(state, id);
        (id, true)
    }

    /// Pruning threshold for `ids`: the beam, tightened so at most
    /// `max_active` tokens pass and widened so at least `min_active` do.
    ///
    /// Returns `(cutoff, adaptive_beam, best_token)`.
    fn get_cutoff(&self, ids: &[TokenId]) -> (f32, f32, Option<TokenId>) {
        let beam = self.config.beam;
        let best = ids
            .iter()
            .copied()
            .min_by(|&a, &b| self.tokens[a].tot_cost.total_cmp(&self.tokens[b].tot_cost));
        let Some(best) = best else {
            return (f32::INFINITY, beam, None);
        };
        let best_cost = self.tokens[best].tot_cost;
        let beam_cutoff = best_cost + beam;

        let mut costs: Vec<f32> = ids.iter().map(|&id| self.tokens[id].tot_cost).collect();
        let (max_active, min_active) = (self.config.max_active, self.config.min_active);

        if costs.len() > max_active {
            let (_, nth, _) = costs.select_nth_unstable_by(max_active, f32::total_cmp);
            let max_active_cutoff = *nth;
            if max_active_cutoff < beam_cutoff {
                let adaptive = max_active_cutoff - best_cost + defaults::BEAM_DELTA;
                return (max_active_cutoff, adaptive, Some(best));
            }
        }
        if costs.len() > min_active {
            let min_active_cutoff = if min_active == 0 {
                best_cost
            } else {
                *costs.select_nth_unstable_by(min_active, f32::total_cmp).1
            };
            if min_active_cutoff > beam_cutoff {
                let adaptive = min_active_cutoff - best_cost + defaults::BEAM_DELTA;
                return (min_active_cutoff, adaptive, Some(best));
            }
        }
        (beam_cutoff, beam, Some(best))
    }

    /// Expand emitting arcs of frame `frame`'s tokens into frame `frame + 1`.
    /// Returns the cutoff to use for the epsilon closure that follows.
    fn process_emitting<D: Decodable>(&mut self, decodable: &mut D, frame: usize) -> f32 {
        let graph = Arc::clone(&self.graph);
        let prev_ids = self.frames[frame].tokens.clone();
        let (cur_cutoff, adaptive_beam, best) = self.get_cutoff(&prev_ids);
        trace!(frame, tokens = prev_ids.len(), cutoff = cur_cutoff, "Expanding emitting arcs");

        self.active.clear();
        self.frames.push(FrameTokens::new());

        // Seed the next cutoff from the best token so most arcs are rejected early.
        let mut next_cutoff = f32::INFINITY;
        let mut cost_offset = 0.0;
        if let Some(best) = best {
            let (state, tot_cost) = (self.tokens[best].state, self.tokens[best].tot_cost);
            cost_offset = -tot_cost;
            for arc in graph.arcs(state).iter().filter(|a| a.ilabel != EPSILON) {
                let new_weight = arc.weight + cost_offset
                    - decodable.log_likelihood(frame, arc.ilabel)
                    + tot_cost;
                if new_weight + adaptive_beam < next_cutoff {
                    next_cutoff = new_weight + adaptive_beam;
                }
            }
        }
        self.cost_offsets.push(cost_offset);

        for id in prev_ids {
            let (state, cur_cost) = (self.tokens[id].state, self.tokens[id].tot_cost);
            if cur_cost > cur_cutoff {
                continue;
            }
            for arc in graph.arcs(state).iter().filter(|a| a.ilabel != EPSILON) {
                let acoustic_cost = cost_offset - decodable.log_likelihood(frame, arc.ilabel);
                let tot_cost = cur_cost + acoustic_cost + arc.weight;
                if tot_cost >= next_cutoff {
                    continue;
                }
                if tot_cost + adaptive_beam < next_cutoff {
                    next_cutoff = tot_cost + adaptive_beam;
                }
                let (next, _) = self.find_or_add_token(frame + 1, arc.next, tot_cost);
                self.tokens[id].links.push(ForwardLink {
                    next,
                    ilabel: arc.ilabel,
                    olabel: arc.olabel,
                    graph_cost: arc.weight,
                    acoustic_cost,
                });
            }
        }
        next_cutoff
    }

    /// Epsilon closure over the newest frame.
    fn process_nonemitting(&mut self, cutoff: f32) {
        let graph = Arc::clone(&self.graph);
        let frame = self.num_frames_decoded();
        let has_epsilon = |s: StateId| graph.arcs(s).iter().any(|a| a.ilabel == EPSILON);

        let mut queue: Vec<StateId> = self.frames[frame]
            .tokens
            .iter()
            .map(|&id| self.tokens[id].state)
            .filter(|&s| has_epsilon(s))
            .collect();

        while let Some(state) = queue.pop() {
            let Some(&id) = self.active.get(&state) else {
                continue;
            };
            let cur_cost = self.tokens[id].tot_cost;
            if cur_cost > cutoff {
                continue;
            }
            // Re-expanded with a better cost: the old links are stale.
            self.tokens[id].links.clear();

            for arc in graph.arcs(state).iter().filter(|a| a.ilabel == EPSILON) {
                let tot_cost = cur_cost + arc.weight;
                if tot_cost >= cutoff {
                    continue;
                }
                let (next, changed) = self.find_or_add_token(frame, arc.next, tot_cost);
                self.tokens[id].links.push(ForwardLink {
                    next,
                    ilabel: EPSILON,
                    olabel: arc.olabel,
                    graph_cost: arc.weight,
                    acoustic_cost: 0.0,
                });
                if changed && has_epsilon(arc.next) {
                    queue.push(arc.next);
                }
            }
        }
    }

    /// Recompute extra costs of frame `f`'s tokens and drop links that fall
    /// outside the lattice beam. Returns `(extra_costs_changed, links_pruned)`.
    fn prune_forward_links(&mut self, f: usize, delta: f32) -> (bool, bool) {
        if self.frames[f].tokens.is_empty() {
            return (false, false);
        }
        let lattice_beam = self.config.lattice_beam;
        let mut extra_costs_changed = false;
        let mut links_pruned = false;

        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..self.frames[f].tokens.len() {
                let id = self.frames[f].tokens[i];
                let tot_cost = self.tokens[id].tot_cost;
                let mut links = std::mem::take(&mut self.tokens[id].links);
                let before = links.len();
                let mut tok_extra_cost = f32::INFINITY;

                links.retain(|link| {
                    let next = &self.tokens[link.next];
                    let link_extra_cost = next.extra_cost
                        + ((tot_cost + link.acoustic_cost + link.graph_cost) - next.tot_cost);
                    if link_extra_cost > lattice_beam {
                        return false;
                    }
                    tok_extra_cost = tok_extra_cost.min(link_extra_cost.max(0.0));
                    true
                });
                links_pruned |= links.len() != before;

                let token = &mut self.tokens[id];
                token.links = links;
                if (tok_extra_cost - token.extra_cost).abs() > delta {
                    changed = true;
                }
                token.extra_cost = tok_extra_cost;
            }
            extra_costs_changed |= changed;
        }
        (extra_costs_changed, links_pruned)
    }

    /// Forget tokens on frame `f` that no longer lie on any useful path and
    /// hand their slots back for reuse.
    ///
    /// Links into these tokens are already gone: `prune_forward_links` drops
    /// every link whose target has infinite extra cost.
    fn prune_tokens_for_frame(&mut self, f: usize) {
        let tokens = &mut self.tokens;
        let free = &mut self.free;
        let start = self.start_token;
        let mut start_pruned = false;
        self.frames[f].tokens.retain(|&id| {
            if tokens[id].extra_cost == f32::INFINITY {
                tokens[id].links = Vec::new();
                start_pruned |= Some(id) == start;
                free.push(id);
                false
            } else {
                true
            }
        });
        if start_pruned {
            self.start_token = None;
        }
    }

    /// Periodic lattice pruning, walking back from the newest frame while
    /// extra costs keep changing.
    fn prune_active_tokens(&mut self, delta: f32) {
        let newest = self.num_frames_decoded();
        let before: usize = self.frames.iter().map(|f| f.tokens.len()).sum();

        for f in (0..newest).rev() {
            if self.frames[f].must_prune_links {
                let (extra_costs_changed, links_pruned) = self.prune_forward_links(f, delta);
                if extra_costs_changed && f > 0 {
                    self.frames[f - 1].must_prune_links = true;
                }
                if links_pruned {
                    self.frames[f].must_prune_tokens = true;
                }
                self.frames[f].must_prune_links = false;
            }
            if f + 1 < newest && self.frames[f + 1].must_prune_tokens {
                self.prune_tokens_for_frame(f + 1);
                self.frames[f + 1].must_prune_tokens = false;
            }
        }

        let after: usize = self.frames.iter().map(|f| f.tokens.len()).sum();
        trace!(before, after, "Pruned lattice tokens");
    }

    /// Graph final costs of `ids`, and the best total cost including them.
    /// With no final state among `ids` the map is empty and the best cost
    /// ignores final costs.
    fn compute_final_costs(&self, ids: &[TokenId]) -> (HashMap<TokenId, f32>, f32) {
        let mut final_costs = HashMap::new();
        let mut best_cost = f32::INFINITY;
        let mut best_cost_with_final = f32::INFINITY;
        for &id in ids {
            let token = &self.tokens[id];
            let final_cost = self.graph.final_weight(token.state);
            best_cost = best_cost.min(token.tot_cost);
            if final_cost.is_finite() {
                best_cost_with_final = best_cost_with_final.min(token.tot_cost + final_cost);
                final_costs.insert(id, final_cost);
            }
        }
        let best = if final_costs.is_empty() {
            best_cost
        } else {
            best_cost_with_final
        };
        (final_costs, best)
    }

    fn prune_forward_links_final(&mut self, last: usize) {
        let ids = self.frames[last].tokens.clone();
        let (final_costs, final_best_cost) = self.compute_final_costs(&ids);
        let any_final = !final_costs.is_empty();
        let lattice_beam = self.config.lattice_beam;

        let mut changed = true;
        while changed {
            changed = false;
            for &id in &ids {
                let final_cost = if any_final {
                    final_costs.get(&id).copied().unwrap_or(f32::INFINITY)
                } else {
                    0.0
                };
                let tot_cost = self.tokens[id].tot_cost;
                let mut tok_extra_cost = tot_cost + final_cost - final_best_cost;
                let mut links = std::mem::take(&mut self.tokens[id].links);

                links.retain(|link| {
                    let next = &self.tokens[link.next];
                    let link_extra_cost = next.extra_cost
                        + ((tot_cost + link.acoustic_cost + link.graph_cost) - next.tot_cost);
                    if link_extra_cost > lattice_beam {
                        return false;
                    }
                    tok_extra_cost = tok_extra_cost.min(link_extra_cost.max(0.0));
                    true
                });
                if tok_extra_cost > lattice_beam {
                    tok_extra_cost = f32::INFINITY;
                }

                let token = &mut self.tokens[id];
                token.links = links;
                if token.extra_cost != tok_extra_cost
                    && (token.extra_cost - tok_extra_cost).abs() > 1e-5
                {
                    changed = true;
                }
                token.extra_cost = tok_extra_cost;
            }
        }
        self.final_costs = final_costs;
    }

    /// Prune every hypothesis that cannot reach a final state within the
    /// lattice beam, using the graph's final costs. When no final state is
    /// active, every newest-frame token counts as final.
    pub fn prune_final(&mut self) {
        if self.state == DecoderState::Idle {
            return;
        }
        let last = self.num_frames_decoded();
        self.prune_forward_links_final(last);
        for f in (0..last).rev() {
            self.prune_forward_links(f, 0.0);
            self.prune_tokens_for_frame(f + 1);
        }
        self.prune_tokens_for_frame(0);

        self.active = self.frames[last]
            .tokens
            .iter()
            .map(|&id| (self.tokens[id].state, id))
            .collect();
        self.state = DecoderState::Finalized;
        debug!(
            frames = last,
            active = self.active.len(),
            reached_final = !self.final_costs.is_empty(),
            "Pruned with final costs"
        );
    }

    /// Lattice over all surviving tokens, acoustic costs in search scale,
    /// trimmed to states on a start-to-final path.
    fn build_raw_lattice(&self) -> Option<Lattice> {
        let start_token = self.start_token?;
        let last = self.num_frames_decoded();
        let final_costs = match self.state {
            DecoderState::Idle => return None,
            DecoderState::Finalized => self.final_costs.clone(),
            DecoderState::Searching => self.compute_final_costs(&self.frames[last].tokens).0,
        };

        let mut lat = Lattice::new();
        let mut state_of: HashMap<TokenId, StateId> = HashMap::new();
        for frame in &self.frames {
            for &id in &frame.tokens {
                state_of.insert(id, lat.add_state());
            }
        }
        lat.set_start(*state_of.get(&start_token)?);

        for (f, frame) in self.frames.iter().enumerate() {
            for &id in &frame.tokens {
                let Some(&from) = state_of.get(&id) else {
                    continue;
                };
                for link in &self.tokens[id].links {
                    let Some(&to) = state_of.get(&link.next) else {
                        continue;
                    };
                    let offset = if link.ilabel == EPSILON {
                        0.0
                    } else {
                        self.cost_offsets.get(f).copied().unwrap_or(0.0)
                    };
                    lat.add_arc(
                        from,
                        LatticeArc {
                            ilabel: link.ilabel,
                            olabel: link.olabel,
                            weight: LatticeWeight::new(link.graph_cost, link.acoustic_cost - offset),
                            next: to,
                        },
                    );
                }
                if f == last {
                    let weight = if final_costs.is_empty() {
                        LatticeWeight::ONE
                    } else {
                        final_costs
                            .get(&id)
                            .map_or(LatticeWeight::ZERO, |&c| LatticeWeight::new(c, 0.0))
                    };
                    lat.set_final(from, weight);
                }
            }
        }

        lattice::connect(&mut lat);
        if lat.is_empty() {
            warn!(frames = last, "No surviving path in the search state");
            return None;
        }
        Some(lat)
    }

    /// Raw state-level lattice with acoustic costs divided by
    /// `acoustic_scale` (left as is when the scale is zero). Contains only
    /// states that are reachable from the start and can reach a final state.
    pub fn raw_lattice(&self, acoustic_scale: f32) -> Option<Lattice> {
        let mut lat = self.build_raw_lattice()?;
        lat.rescale_acoustic(acoustic_scale);
        Some(lat)
    }

    pub fn best_path(&self, acoustic_scale: f32) -> Option<BestPath> {
        let lat = self.build_raw_lattice()?;
        let path = lattice::shortest_path(&lat)?;
        let weight = match unscale_factor(acoustic_scale) {
            Some(factor) => path.weight.scale_acoustic(factor),
            None => path.weight,
        };
        Some(BestPath {
            num_frames: self.num_frames_decoded(),
            words: path.output_labels(),
            alignment: path.input_labels(),
            weight,
        })
    }

    /// Word-level lattice, pruned to the lattice beam and rescaled like
    /// [`raw_lattice`](Self::raw_lattice).
    pub fn lattice(&self, acoustic_scale: f32) -> Option<CompactLattice> {
        let mut lat = self.build_raw_lattice()?;
        if !lattice::prune(&mut lat, self.config.lattice_beam) {
            warn!("Lattice has a cycle; skipping lattice-beam pruning");
        }
        let mut compact = lattice::to_compact(&lat);
        if compact.is_empty() {
            return None;
        }
        compact.rescale_acoustic(acoustic_scale);
        Some(compact)
    }
}
