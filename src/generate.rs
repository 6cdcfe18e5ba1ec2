//! Candidate generation: drive the operator catalog over an annotated tree
//! and yield rendered single-edit variants of the source.

use crate::ast::{Module, NodeId, node_line, strip_ids};
use crate::mutate::Mutator;
use crate::render::render_module;

/// One fully rendered candidate patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Complete rendered source of the mutated tree.
    pub source: String,

    /// Human-readable description, `<operator>@<line>`.
    pub mutator: String,
}

/// Lazy stream of candidates in deterministic order: operators in catalog
/// order, nodes in traversal order within each operator.
///
/// Mutations that fail to apply are skipped and do not count against `max`.
pub struct CandidateStream<'a> {
    module: &'a Module,
    operators: &'a [Mutator],
    max: usize,
    produced: usize,
    next_op: usize,
    current: Option<(Mutator, Vec<NodeId>, usize)>,
}

/// Build a candidate stream over an [`annotate`](crate::ast::annotate)d tree.
pub fn candidates<'a>(
    module: &'a Module,
    operators: &'a [Mutator],
    max: usize,
) -> CandidateStream<'a> {
    CandidateStream {
        module,
        operators,
        max,
        produced: 0,
        next_op: 0,
        current: None,
    }
}

/// Eagerly collect up to `max` candidates.
pub fn generate_candidates(module: &Module, operators: &[Mutator], max: usize) -> Vec<Candidate> {
    candidates(module, operators, max).collect()
}

impl Iterator for CandidateStream<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if self.produced >= self.max {
                return None;
            }

            let (op, nodes, idx) = match &mut self.current {
                Some(state) if state.2 < state.1.len() => state,
                _ => {
                    if self.next_op >= self.operators.len() {
                        return None;
                    }
                    let op = self.operators[self.next_op];
                    self.next_op += 1;
                    self.current = Some((op, op.find_nodes(self.module), 0));
                    continue;
                }
            };

            let target = nodes[*idx];
            *idx += 1;
            let op = *op;

            let mut clone = self.module.clone();
            if !op.apply(&mut clone, target) {
                continue;
            }
            strip_ids(&mut clone);

            let line = node_line(self.module, target)
                .map_or_else(|| "?".to_string(), |l| l.to_string());

            self.produced += 1;
            return Some(Candidate {
                source: render_module(&clone),
                mutator: format!("{}@{line}", op.name()),
            });
        }
    }
}
