//! Static decoding graph.
//!
//! Read from the AT&T text form of a weighted transducer:
//!
//! ```text
//! 0 1 3 7 0.5     # src dst ilabel olabel [cost]
//! 1 2 4 0
//! 2 1.25          # final state [cost]
//! ```
//!
//! The source of the first arc is the start state. Input label 0 is
//! epsilon; every other input label is a transition id.

pub mod symbols;

pub use symbols::SymbolTable;

use crate::error::{LatgenError, Result};
use std::path::Path;

pub type StateId = u32;
pub type Label = u32;

/// Input/output label reserved for epsilon.
pub const EPSILON: Label = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphArc {
    pub ilabel: Label,
    pub olabel: Label,
    /// Tropical cost (negated log probability).
    pub weight: f32,
    pub next: StateId,
}

/// Immutable weighted automaton searched by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeGraph {
    start: StateId,
    arcs: Vec<Vec<GraphArc>>,
    finals: Vec<f32>,
}

impl DecodeGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Parse the AT&T text form.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut builder = GraphBuilder::default();
        let mut first_final = None;

        for (line_no, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let err = |what: &str| format!("line {}: {}", line_no + 1, what);
            let state = |s: &str| s.parse::<StateId>().map_err(|_| err("invalid state id"));
            let label = |s: &str| s.parse::<Label>().map_err(|_| err("invalid label"));
            let cost = |s: Option<&&str>| match s {
                Some(s) => s
                    .parse::<f32>()
                    .ok()
                    .filter(|c| !c.is_nan())
                    .ok_or_else(|| err("invalid weight")),
                None => Ok(0.0),
            };

            match fields.len() {
                1 | 2 => {
                    let s = state(fields[0])?;
                    builder.set_final(s, cost(fields.get(1))?);
                    first_final.get_or_insert(s);
                }
                4 | 5 => {
                    builder.add_arc(
                        state(fields[0])?,
                        state(fields[1])?,
                        label(fields[2])?,
                        label(fields[3])?,
                        cost(fields.get(4))?,
                    );
                }
                n => return Err(err(&format!("expected 1, 2, 4 or 5 fields, found {}", n))),
            }
        }

        let start = builder
            .first_arc_source
            .or(first_final)
            .ok_or("graph is empty")?;
        Ok(builder.build(start))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |message: String| LatgenError::GraphLoad {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        Self::parse(&text).map_err(load_err)
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn num_states(&self) -> usize {
        self.arcs.len()
    }

    pub fn num_arcs(&self) -> usize {
        self.arcs.iter().map(Vec::len).sum()
    }

    pub fn arcs(&self, state: StateId) -> &[GraphArc] {
        self.arcs.get(state as usize).map_or(&[], Vec::as_slice)
    }

    /// Final cost of `state`; infinite when the state is not final.
    pub fn final_weight(&self, state: StateId) -> f32 {
        self.finals
            .get(state as usize)
            .copied()
            .unwrap_or(f32::INFINITY)
    }

    pub fn is_final(&self, state: StateId) -> bool {
        self.final_weight(state).is_finite()
    }

    /// Largest input label on any arc.
    pub fn max_input_label(&self) -> Label {
        self.arcs
            .iter()
            .flatten()
            .map(|a| a.ilabel)
            .max()
            .unwrap_or(EPSILON)
    }
}

/// Incremental construction of a [`DecodeGraph`]; states are created on first mention.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    arcs: Vec<Vec<GraphArc>>,
    finals: Vec<f32>,
    first_arc_source: Option<StateId>,
}

impl GraphBuilder {
    fn ensure_state(&mut self, state: StateId) {
        let needed = state as usize + 1;
        if self.arcs.len() < needed {
            self.arcs.resize_with(needed, Vec::new);
            self.finals.resize(needed, f32::INFINITY);
        }
    }

    pub fn add_arc(
        &mut self,
        src: StateId,
        next: StateId,
        ilabel: Label,
        olabel: Label,
        weight: f32,
    ) -> &mut Self {
        self.ensure_state(src);
        self.ensure_state(next);
        self.first_arc_source.get_or_insert(src);
        self.arcs[src as usize].push(GraphArc {
            ilabel,
            olabel,
            weight,
            next,
        });
        self
    }

    pub fn set_final(&mut self, state: StateId, weight: f32) -> &mut Self {
        self.ensure_state(state);
        self.finals[state as usize] = weight;
        self
    }

    pub fn build(&mut self, start: StateId) -> DecodeGraph {
        self.ensure_state(start);
        DecodeGraph {
            start,
            arcs: std::mem::take(&mut self.arcs),
            finals: std::mem::take(&mut self.finals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const GRAPH: &str = "\
0 1 1 5 0.5
1 1 2 0
1 2 0 0 1.0
2 0.25
";

    #[test]
    fn parses_arcs_and_finals() {
        let g = DecodeGraph::parse(GRAPH).unwrap();
        assert_eq!(g.start(), 0);
        assert_eq!(g.num_states(), 3);
        assert_eq!(g.num_arcs(), 3);
        assert_eq!(
            g.arcs(0)[0],
            GraphArc {
                ilabel: 1,
                olabel: 5,
                weight: 0.5,
                next: 1
            }
        );
        assert_eq!(g.arcs(1)[0].weight, 0.0);
        assert!(g.is_final(2));
        assert_eq!(g.final_weight(2), 0.25);
        assert!(!g.is_final(1));
        assert_eq!(g.max_input_label(), 2);
    }

    #[test]
    fn final_without_weight_costs_nothing() {
        let g = DecodeGraph::parse("3 4 1 1\n4\n").unwrap();
        assert_eq!(g.start(), 3);
        assert_eq!(g.final_weight(4), 0.0);
        assert!(g.arcs(0).is_empty());
    }

    #[test]
    fn start_is_first_arc_source_even_after_final_line() {
        let g = DecodeGraph::parse("1\n2 1 1 0\n").unwrap();
        assert_eq!(g.start(), 2);
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let g = DecodeGraph::parse("# header\n\n0 1 1 1 # arc\n1\n").unwrap();
        assert_eq!(g.num_arcs(), 1);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(DecodeGraph::parse("").is_err());
        assert!(DecodeGraph::parse("0 1 1\n").is_err());
        assert!(DecodeGraph::parse("0 1 a 1\n").is_err());
        assert!(DecodeGraph::parse("0 1 1 1 heavy\n").is_err());
        assert!(DecodeGraph::parse("-1 1 1 1\n").is_err());
    }

    #[test]
    fn out_of_range_queries_are_empty() {
        let g = DecodeGraph::parse(GRAPH).unwrap();
        assert!(g.arcs(99).is_empty());
        assert!(!g.is_final(99));
    }

    #[test]
    fn load_reports_graph_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0 1 x\n").unwrap();
        let err = DecodeGraph::load(file.path()).unwrap_err();
        assert!(matches!(err, LatgenError::GraphLoad { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn builder_creates_states_on_demand() {
        let g = DecodeGraph::builder()
            .add_arc(0, 3, 1, 0, 0.0)
            .set_final(3, 0.0)
            .build(0);
        assert_eq!(g.num_states(), 4);
        assert!(g.is_final(3));
    }
}
