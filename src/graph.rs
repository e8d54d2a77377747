use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::constants::walk::INVERSE_EDGE_PREFIX;
use crate::matchers::FeatureMatcher;
use crate::types::{EdgeId, NodeId};

/// One outgoing step from a node: the edge label taken and the node it
/// arrives at. Inverse directions carry their own edge ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphStep {
    /// Edge label traversed by this step.
    pub edge: EdgeId,
    /// Node the step arrives at.
    pub to: NodeId,
}

/// Entity-graph collaborator: node and edge dictionaries plus the step
/// primitive the walk layers are built on. The physical representation is
/// the implementor's business; [`InMemoryGraph`] is the in-crate reference.
pub trait Graph: Send + Sync {
    /// Resolve a node name to its id.
    fn node_id_for_name(&self, name: &str) -> Option<NodeId>;
    /// Resolve a node id back to its name.
    fn node_name(&self, node: NodeId) -> Option<&str>;
    /// Resolve an edge label to its id; inverse labels (`_label`) resolve to
    /// their own ids.
    fn edge_id_for_name(&self, name: &str) -> Option<EdgeId>;
    /// Resolve an edge id back to its label.
    fn edge_name(&self, edge: EdgeId) -> Option<&str>;
    /// Outgoing steps from a node, including inverse-direction steps.
    /// Unknown nodes have no steps.
    fn neighbors(&self, node: NodeId) -> Vec<GraphStep>;

    /// Bounded breadth-first walk from `start`, pruned by the matcher's
    /// `edge_ok`/`node_ok` predicates, collecting every node reached at a
    /// step where `is_finished` holds. `max_steps` caps walks whose matcher
    /// never finishes.
    fn walk_matching(
        &self,
        start: NodeId,
        matcher: &dyn FeatureMatcher,
        max_steps: usize,
    ) -> HashSet<NodeId> {
        let mut matched = HashSet::new();
        let mut visited: HashSet<(NodeId, usize)> = HashSet::new();
        let mut frontier: VecDeque<(NodeId, usize)> = VecDeque::new();
        visited.insert((start, 0));
        frontier.push_back((start, 0));
        let mut truncated = false;
        while let Some((node, steps)) = frontier.pop_front() {
            if matcher.is_finished(steps) {
                matched.insert(node);
                continue;
            }
            if steps >= max_steps {
                truncated = true;
                continue;
            }
            for step in self.neighbors(node) {
                if !matcher.edge_ok(step.edge, steps) {
                    continue;
                }
                if !matcher.node_ok(step.to, steps + 1) {
                    continue;
                }
                if visited.insert((step.to, steps + 1)) {
                    frontier.push_back((step.to, steps + 1));
                }
            }
        }
        if truncated {
            debug!(start, max_steps, "matching walk hit its step bound before finishing");
        }
        matched
    }
}

/// Reference [`Graph`] built from (source, relation, target) name triples.
/// Interns node and edge names in insertion order and materializes an
/// inverse step (edge label `_relation`) for every triple.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGraph {
    node_names: Vec<String>,
    node_ids: HashMap<String, NodeId>,
    edge_names: Vec<String>,
    edge_ids: HashMap<String, EdgeId>,
    adjacency: Vec<Vec<GraphStep>>,
}

impl InMemoryGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from name triples.
    pub fn from_triples(triples: &[(&str, &str, &str)]) -> Self {
        let mut graph = Self::new();
        for &(source, relation, target) in triples {
            graph.add_triple(source, relation, target);
        }
        graph
    }

    /// Add one (source, relation, target) edge plus its inverse step.
    pub fn add_triple(&mut self, source: &str, relation: &str, target: &str) {
        let source_id = self.intern_node(source);
        let target_id = self.intern_node(target);
        let forward = self.intern_edge(relation);
        let inverse = self.intern_edge(&format!("{INVERSE_EDGE_PREFIX}{relation}"));
        self.adjacency[source_id as usize].push(GraphStep { edge: forward, to: target_id });
        self.adjacency[target_id as usize].push(GraphStep { edge: inverse, to: source_id });
    }

    /// Number of interned nodes.
    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    /// Number of interned edge labels, inverse labels included.
    pub fn edge_label_count(&self) -> usize {
        self.edge_names.len()
    }

    fn intern_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.node_ids.get(name) {
            return id;
        }
        let id = self.node_names.len() as NodeId;
        self.node_names.push(name.to_string());
        self.node_ids.insert(name.to_string(), id);
        self.adjacency.push(Vec::new());
        id
    }

    fn intern_edge(&mut self, name: &str) -> EdgeId {
        if let Some(&id) = self.edge_ids.get(name) {
            return id;
        }
        let id = self.edge_names.len() as EdgeId;
        self.edge_names.push(name.to_string());
        self.edge_ids.insert(name.to_string(), id);
        id
    }
}

impl Graph for InMemoryGraph {
    fn node_id_for_name(&self, name: &str) -> Option<NodeId> {
        self.node_ids.get(name).copied()
    }

    fn node_name(&self, node: NodeId) -> Option<&str> {
        self.node_names.get(node as usize).map(String::as_str)
    }

    fn edge_id_for_name(&self, name: &str) -> Option<EdgeId> {
        self.edge_ids.get(name).copied()
    }

    fn edge_name(&self, edge: EdgeId) -> Option<&str> {
        self.edge_names.get(edge as usize).map(String::as_str)
    }

    fn neighbors(&self, node: NodeId) -> Vec<GraphStep> {
        self.adjacency.get(node as usize).cloned().unwrap_or_default()
    }
}
