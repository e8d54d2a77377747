use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::WalkConfig;
use crate::constants::walk::PATH_DELIMITER;
use crate::dataset::Instance;
use crate::extractors::{FeatureExtractor, Subgraph, default_extractors};
use crate::graph::Graph;
use crate::matchers::FeatureMatcher;
use crate::types::{EdgeId, Feature, NodeId};

/// Composes the configured extractors' matchers to answer which nodes are
/// related to a starting node under a feature universe, and discovers the
/// connecting-path structure between an instance's endpoints.
pub struct MatchingEngine {
    extractors: Vec<Arc<dyn FeatureExtractor>>,
    walk: WalkConfig,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(default_extractors(), WalkConfig::default())
    }
}

impl MatchingEngine {
    /// Build an engine over an extractor list and walk bounds. The list is
    /// fixed for the engine's lifetime, one engine per relation run.
    pub fn new(extractors: Vec<Arc<dyn FeatureExtractor>>, walk: WalkConfig) -> Self {
        Self { extractors, walk }
    }

    /// The extractor families this engine composes.
    pub fn extractors(&self) -> &[Arc<dyn FeatureExtractor>] {
        &self.extractors
    }

    /// The walk bounds this engine applies.
    pub fn walk_config(&self) -> WalkConfig {
        self.walk
    }

    /// The set of nodes connected to `node` by any feature's pattern,
    /// according to any extractor: the union of every yielded matcher's
    /// walk results. Extractors yielding no matcher contribute nothing; if
    /// nothing yields a matcher the result is empty, not an error.
    pub fn related_nodes(
        &self,
        node: NodeId,
        features: &[Feature],
        graph: &dyn Graph,
    ) -> HashSet<NodeId> {
        let mut matchers: Vec<Arc<dyn FeatureMatcher>> = Vec::new();
        for feature in features {
            for extractor in &self.extractors {
                if let Some(matcher) = extractor.feature_matcher(feature, graph) {
                    matchers.push(matcher);
                }
            }
        }

        // Dedup is by matcher object identity, never pattern equality.
        // `matchers` holds every matcher for the whole pass, keeping the
        // pointer keys unique.
        let mut walked: HashSet<*const ()> = HashSet::new();
        let mut related = HashSet::new();
        for matcher in &matchers {
            if !walked.insert(Arc::as_ptr(matcher) as *const ()) {
                continue;
            }
            related.extend(graph.walk_matching(node, matcher.as_ref(), self.walk.max_steps));
        }
        related
    }

    /// Enumerate the bounded walks from the instance's source that reach its
    /// target, keyed by path signature with the number of walks that
    /// followed it. Walks may pass through the target and continue; nodes
    /// beyond the fan-out cap are not expanded.
    pub fn find_connecting_paths(
        &self,
        instance: Instance,
        graph: &dyn Graph,
    ) -> IndexMap<String, usize> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        let mut frontier: VecDeque<(NodeId, Vec<EdgeId>)> = VecDeque::new();
        frontier.push_back((instance.source, Vec::new()));
        while let Some((node, path)) = frontier.pop_front() {
            if node == instance.target && !path.is_empty() {
                match render_signature(&path, graph) {
                    Some(signature) => *counts.entry(signature).or_insert(0) += 1,
                    None => debug!(node, "dropping a walk with an unnameable edge"),
                }
            }
            if path.len() >= self.walk.max_steps {
                continue;
            }
            let steps = graph.neighbors(node);
            if steps.len() > self.walk.max_fan_out {
                debug!(node, fan_out = steps.len(), "skipping high fan-out node");
                continue;
            }
            for step in steps {
                let mut extended = path.clone();
                extended.push(step.edge);
                frontier.push_back((step.to, extended));
            }
        }
        counts
    }

    /// Discover the connecting-path structure between an instance's
    /// endpoints as a [`Subgraph`].
    pub fn discover_subgraph(&self, instance: Instance, graph: &dyn Graph) -> Subgraph {
        Subgraph::new(self.find_connecting_paths(instance, graph))
    }
}

fn render_signature(path: &[EdgeId], graph: &dyn Graph) -> Option<String> {
    let mut signature = String::new();
    signature.push(PATH_DELIMITER);
    for &edge in path {
        signature.push_str(graph.edge_name(edge)?);
        signature.push(PATH_DELIMITER);
    }
    Some(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraph;
    use crate::matchers::SingleEdgeMatcher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedMatcherExtractor {
        matcher: Arc<dyn FeatureMatcher>,
    }

    impl FeatureExtractor for FixedMatcherExtractor {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn extract(
            &self,
            _instance: Instance,
            _subgraph: &Subgraph,
            _graph: &dyn Graph,
        ) -> Vec<Feature> {
            Vec::new()
        }
        fn feature_matcher(
            &self,
            _feature: &str,
            _graph: &dyn Graph,
        ) -> Option<Arc<dyn FeatureMatcher>> {
            Some(self.matcher.clone())
        }
    }

    struct NoMatcherExtractor;

    impl FeatureExtractor for NoMatcherExtractor {
        fn name(&self) -> &'static str {
            "opted out"
        }
        fn extract(
            &self,
            _instance: Instance,
            _subgraph: &Subgraph,
            _graph: &dyn Graph,
        ) -> Vec<Feature> {
            Vec::new()
        }
    }

    struct CountingMatcher {
        edge: EdgeId,
        finish_checks: Arc<AtomicUsize>,
    }

    impl FeatureMatcher for CountingMatcher {
        fn is_finished(&self, steps_taken: usize) -> bool {
            self.finish_checks.fetch_add(1, Ordering::SeqCst);
            steps_taken >= 1
        }
        fn edge_ok(&self, edge: EdgeId, steps_taken: usize) -> bool {
            steps_taken == 0 && edge == self.edge
        }
        fn node_ok(&self, _node: NodeId, _steps_taken: usize) -> bool {
            true
        }
    }

    fn hub_graph() -> InMemoryGraph {
        InMemoryGraph::from_triples(&[
            ("start", "e1", "node 1"),
            ("start", "e1", "node 2"),
            ("start", "e2", "node 2"),
            ("start", "e2", "node 3"),
        ])
    }

    #[test]
    fn related_nodes_union_matcher_results() {
        let graph = hub_graph();
        let e1 = graph.edge_id_for_name("e1").unwrap();
        let e2 = graph.edge_id_for_name("e2").unwrap();
        let engine = MatchingEngine::new(
            vec![
                Arc::new(FixedMatcherExtractor {
                    matcher: Arc::new(SingleEdgeMatcher::new(e1)),
                }),
                Arc::new(FixedMatcherExtractor {
                    matcher: Arc::new(SingleEdgeMatcher::new(e2)),
                }),
                Arc::new(NoMatcherExtractor),
            ],
            WalkConfig::default(),
        );

        let start = graph.node_id_for_name("start").unwrap();
        let related = engine.related_nodes(start, &["f".to_string()], &graph);
        let expected: HashSet<NodeId> = ["node 1", "node 2", "node 3"]
            .iter()
            .map(|name| graph.node_id_for_name(name).unwrap())
            .collect();
        assert_eq!(related, expected);
    }

    #[test]
    fn related_nodes_is_empty_without_matchers() {
        let graph = hub_graph();
        let engine = MatchingEngine::new(vec![Arc::new(NoMatcherExtractor)], WalkConfig::default());
        let start = graph.node_id_for_name("start").unwrap();
        assert!(engine.related_nodes(start, &["f".to_string()], &graph).is_empty());
    }

    #[test]
    fn shared_matcher_objects_walk_once() {
        let graph = hub_graph();
        let start = graph.node_id_for_name("start").unwrap();
        let e1 = graph.edge_id_for_name("e1").unwrap();

        let baseline_checks = Arc::new(AtomicUsize::new(0));
        let baseline = MatchingEngine::new(
            vec![Arc::new(FixedMatcherExtractor {
                matcher: Arc::new(CountingMatcher {
                    edge: e1,
                    finish_checks: baseline_checks.clone(),
                }),
            })],
            WalkConfig::default(),
        );
        baseline.related_nodes(start, &["f".to_string()], &graph);
        let single_walk_checks = baseline_checks.load(Ordering::SeqCst);
        assert!(single_walk_checks > 0);

        let shared_checks = Arc::new(AtomicUsize::new(0));
        let shared: Arc<dyn FeatureMatcher> = Arc::new(CountingMatcher {
            edge: e1,
            finish_checks: shared_checks.clone(),
        });
        let engine = MatchingEngine::new(
            vec![
                Arc::new(FixedMatcherExtractor { matcher: shared.clone() }),
                Arc::new(FixedMatcherExtractor { matcher: shared }),
            ],
            WalkConfig::default(),
        );
        engine.related_nodes(start, &["f".to_string()], &graph);
        assert_eq!(shared_checks.load(Ordering::SeqCst), single_walk_checks);
    }

    #[test]
    fn structurally_equal_matcher_objects_walk_separately() {
        let graph = hub_graph();
        let start = graph.node_id_for_name("start").unwrap();
        let e1 = graph.edge_id_for_name("e1").unwrap();

        let first_checks = Arc::new(AtomicUsize::new(0));
        let second_checks = Arc::new(AtomicUsize::new(0));
        let engine = MatchingEngine::new(
            vec![
                Arc::new(FixedMatcherExtractor {
                    matcher: Arc::new(CountingMatcher {
                        edge: e1,
                        finish_checks: first_checks.clone(),
                    }),
                }),
                Arc::new(FixedMatcherExtractor {
                    matcher: Arc::new(CountingMatcher {
                        edge: e1,
                        finish_checks: second_checks.clone(),
                    }),
                }),
            ],
            WalkConfig::default(),
        );
        engine.related_nodes(start, &["f".to_string()], &graph);
        assert!(first_checks.load(Ordering::SeqCst) > 0);
        assert!(second_checks.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn connecting_paths_count_walks_by_signature() {
        let graph = InMemoryGraph::from_triples(&[("a", "r1", "b"), ("b", "r2", "c")]);
        let a = graph.node_id_for_name("a").unwrap();
        let c = graph.node_id_for_name("c").unwrap();

        let engine = MatchingEngine::new(
            default_extractors(),
            WalkConfig::default().with_max_steps(2),
        );
        let counts = engine.find_connecting_paths(Instance::new(a, c), &graph);
        assert_eq!(counts, IndexMap::from([("-r1-r2-".to_string(), 1)]));

        let b = graph.node_id_for_name("b").unwrap();
        let counts = engine.find_connecting_paths(Instance::new(a, b), &graph);
        assert_eq!(counts.get("-r1-"), Some(&1));
    }

    #[test]
    fn high_fan_out_nodes_are_not_expanded() {
        let graph = InMemoryGraph::from_triples(&[
            ("hub", "e", "x1"),
            ("hub", "e", "x2"),
            ("hub", "e", "x3"),
        ]);
        let hub = graph.node_id_for_name("hub").unwrap();
        let x1 = graph.node_id_for_name("x1").unwrap();

        let capped = MatchingEngine::new(
            default_extractors(),
            WalkConfig::default().with_max_fan_out(2),
        );
        assert!(capped.find_connecting_paths(Instance::new(hub, x1), &graph).is_empty());

        let uncapped = MatchingEngine::default();
        assert!(!uncapped.find_connecting_paths(Instance::new(hub, x1), &graph).is_empty());
    }

    #[test]
    fn disconnected_endpoints_yield_no_paths() {
        let graph = InMemoryGraph::from_triples(&[("a", "r1", "b"), ("x", "r2", "y")]);
        let a = graph.node_id_for_name("a").unwrap();
        let y = graph.node_id_for_name("y").unwrap();
        let engine = MatchingEngine::default();
        assert!(engine.find_connecting_paths(Instance::new(a, y), &graph).is_empty());
    }
}
