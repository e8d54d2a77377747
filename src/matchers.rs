use crate::constants::walk::PATH_DELIMITER;
use crate::graph::Graph;
use crate::types::{EdgeId, NodeId};

/// Per-walk-step predicate controlling which edges and nodes a graph walk
/// may follow and when it has completed. Stateless across invocations apart
/// from the pattern it encodes; never mutates graph state.
pub trait FeatureMatcher: Send + Sync {
    /// True when a walk that has taken `steps_taken` steps is complete.
    fn is_finished(&self, steps_taken: usize) -> bool;
    /// True when `edge` may be traversed as step `steps_taken`.
    fn edge_ok(&self, edge: EdgeId, steps_taken: usize) -> bool;
    /// True when `node` may be visited after `steps_taken` steps.
    fn node_ok(&self, node: NodeId, steps_taken: usize) -> bool;
}

/// Matches walks that follow an exact edge-label sequence, parsed back from
/// a path feature such as `-works_at-_based_in-`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathSequenceMatcher {
    edges: Vec<EdgeId>,
}

impl PathSequenceMatcher {
    /// Parse a path feature into the edge-id sequence it describes. Returns
    /// `None` when the feature is not a path pattern or names an edge label
    /// the graph does not know.
    pub fn parse(feature: &str, graph: &dyn Graph) -> Option<Self> {
        let body = feature
            .strip_prefix(PATH_DELIMITER)?
            .strip_suffix(PATH_DELIMITER)?;
        if body.is_empty() {
            return None;
        }
        let mut edges = Vec::new();
        for label in body.split(PATH_DELIMITER) {
            edges.push(graph.edge_id_for_name(label)?);
        }
        Some(Self { edges })
    }

    /// The edge-id sequence this matcher follows.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}

impl FeatureMatcher for PathSequenceMatcher {
    fn is_finished(&self, steps_taken: usize) -> bool {
        steps_taken >= self.edges.len()
    }

    fn edge_ok(&self, edge: EdgeId, steps_taken: usize) -> bool {
        self.edges.get(steps_taken).copied() == Some(edge)
    }

    fn node_ok(&self, _node: NodeId, _steps_taken: usize) -> bool {
        true
    }
}

/// Matches walks consisting of exactly one step over one edge label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SingleEdgeMatcher {
    edge: EdgeId,
}

impl SingleEdgeMatcher {
    /// Match single steps over `edge`.
    pub fn new(edge: EdgeId) -> Self {
        Self { edge }
    }
}

impl FeatureMatcher for SingleEdgeMatcher {
    fn is_finished(&self, steps_taken: usize) -> bool {
        steps_taken >= 1
    }

    fn edge_ok(&self, edge: EdgeId, steps_taken: usize) -> bool {
        steps_taken == 0 && edge == self.edge
    }

    fn node_ok(&self, _node: NodeId, _steps_taken: usize) -> bool {
        true
    }
}
