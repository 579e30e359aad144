//! Search tokens and the links between them.

use crate::graph::{Label, StateId};

/// Index of a token in the decoder's arena.
pub(crate) type TokenId = usize;

/// Arc from one token to a token on the same frame (epsilon) or the next
/// frame (emitting). Costs are stored as seen during search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ForwardLink {
    pub next: TokenId,
    pub ilabel: Label,
    pub olabel: Label,
    pub graph_cost: f32,
    /// Includes the frame's cost offset.
    pub acoustic_cost: f32,
}

/// One active hypothesis: a graph state reached at a given frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub state: StateId,
    /// Best cost of reaching this token from the start.
    pub tot_cost: f32,
    /// How much worse than the best complete path the best path through
    /// this token is. Infinite once the token is known to be useless.
    pub extra_cost: f32,
    pub links: Vec<ForwardLink>,
}

impl Token {
    pub fn new(state: StateId, tot_cost: f32) -> Self {
        Self {
            state,
            tot_cost,
            extra_cost: 0.0,
            links: Vec::new(),
        }
    }
}

/// Tokens alive on one frame, plus lattice-pruning bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FrameTokens {
    pub tokens: Vec<TokenId>,
    pub must_prune_links: bool,
    pub must_prune_tokens: bool,
}

impl FrameTokens {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            must_prune_links: true,
            must_prune_tokens: true,
        }
    }
}
