use std::sync::{Arc, RwLock};

use indexmap::{IndexMap, IndexSet};

use crate::dataset::{Dataset, Instance};
use crate::engine::MatchingEngine;
use crate::errors::PipelineError;
use crate::graph::Graph;
use crate::types::{Feature, Score};

/// A sparse feature vector for one instance. Values are keyed by interned
/// feature index; indices absent from the row are zero. A row that would
/// hold zero entries is represented as `None` at the call sites that
/// produce rows, never as an empty `MatrixRow`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixRow {
    instance: Instance,
    values: Vec<(usize, Score)>,
}

impl MatrixRow {
    /// Build a row from index/value pairs. Entries are sorted by feature
    /// index so rows compare by content.
    pub fn new(instance: Instance, mut values: Vec<(usize, Score)>) -> Self {
        values.sort_unstable_by_key(|&(index, _)| index);
        Self { instance, values }
    }

    /// The instance this row describes.
    pub fn instance(&self) -> Instance {
        self.instance
    }

    /// The non-zero entries, ascending by feature index.
    pub fn values(&self) -> &[(usize, Score)] {
        &self.values
    }

    /// The value stored at `index`, zero when the entry is absent.
    pub fn value_at(&self, index: usize) -> Score {
        self.values
            .iter()
            .find(|&&(entry, _)| entry == index)
            .map_or(0.0, |&(_, value)| value)
    }
}

/// An ordered collection of feature rows for a dataset sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<MatrixRow>,
}

impl FeatureMatrix {
    /// Wrap an already-built row list.
    pub fn new(rows: Vec<MatrixRow>) -> Self {
        Self { rows }
    }

    /// The rows in matrix order.
    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the matrix holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The instances described by the rows, in matrix order.
    pub fn instances(&self) -> Vec<Instance> {
        self.rows.iter().map(MatrixRow::instance).collect()
    }
}

/// Turns instances into sparse feature rows. Implementations are
/// constructed once per relation and already hold their graph, so matrix
/// construction takes only the dataset.
pub trait FeatureGenerator: Send + Sync {
    /// Build the training matrix for a dataset's positive and negative
    /// instances. Instances producing no features are left out.
    fn create_training_matrix(&self, dataset: &Dataset) -> Result<FeatureMatrix, PipelineError>;

    /// Build the testing matrix. Features outside the universe built so
    /// far are not added to it here.
    fn create_test_matrix(&self, dataset: &Dataset) -> Result<FeatureMatrix, PipelineError>;

    /// Extract one instance's row, `None` when the instance yields no
    /// features. Internal failures surface as `None`, never as a panic.
    fn construct_matrix_row(&self, instance: Instance) -> Option<MatrixRow>;

    /// The interned feature universe, in interning order.
    fn feature_names(&self) -> Vec<Feature>;
}

/// A [`FeatureGenerator`] backed by bounded graph walks: it discovers the
/// connecting-path structure for each instance with a [`MatchingEngine`]
/// and asks the engine's extractors to phrase it as features.
///
/// Feature strings are interned into a growing universe shared by every
/// row; a feature's index is its insertion position, so indices are stable
/// for the generator's lifetime. Row values count how many extractors
/// produced the feature for that instance, which is 1 for path signatures.
pub struct WalkFeatureGenerator {
    graph: Arc<dyn Graph>,
    engine: MatchingEngine,
    features: RwLock<IndexSet<Feature>>,
}

impl WalkFeatureGenerator {
    /// Build a generator over a graph and a configured engine, starting
    /// from an empty feature universe.
    pub fn new(graph: Arc<dyn Graph>, engine: MatchingEngine) -> Self {
        Self {
            graph,
            engine,
            features: RwLock::new(IndexSet::new()),
        }
    }

    /// Number of features interned so far.
    pub fn feature_count(&self) -> usize {
        self.features.read().map(|set| set.len()).unwrap_or(0)
    }

    fn extract_features(&self, instance: Instance) -> Vec<Feature> {
        let subgraph = self.engine.discover_subgraph(instance, self.graph.as_ref());
        let mut features = Vec::new();
        for extractor in self.engine.extractors() {
            features.extend(extractor.extract(instance, &subgraph, self.graph.as_ref()));
        }
        features
    }

    /// Extract a row while only reading the universe. Features that were
    /// never interned are dropped rather than added.
    fn known_features_row(&self, instance: Instance) -> Option<MatrixRow> {
        let features = self.extract_features(instance);
        let universe = self.features.read().ok()?;
        let mut values: IndexMap<usize, Score> = IndexMap::new();
        for feature in features {
            if let Some(index) = universe.get_index_of(feature.as_str()) {
                *values.entry(index).or_insert(0.0) += 1.0;
            }
        }
        if values.is_empty() {
            return None;
        }
        Some(MatrixRow::new(instance, values.into_iter().collect()))
    }

    fn matrix_over(
        &self,
        dataset: &Dataset,
        mut row_for: impl FnMut(Instance) -> Option<MatrixRow>,
    ) -> FeatureMatrix {
        let rows = dataset
            .positive_instances()
            .chain(dataset.negative_instances())
            .filter_map(&mut row_for)
            .collect();
        FeatureMatrix::new(rows)
    }
}

impl FeatureGenerator for WalkFeatureGenerator {
    fn create_training_matrix(&self, dataset: &Dataset) -> Result<FeatureMatrix, PipelineError> {
        Ok(self.matrix_over(dataset, |instance| self.construct_matrix_row(instance)))
    }

    fn create_test_matrix(&self, dataset: &Dataset) -> Result<FeatureMatrix, PipelineError> {
        Ok(self.matrix_over(dataset, |instance| self.known_features_row(instance)))
    }

    fn construct_matrix_row(&self, instance: Instance) -> Option<MatrixRow> {
        let features = self.extract_features(instance);
        if features.is_empty() {
            return None;
        }
        let mut universe = self.features.write().ok()?;
        let mut values: IndexMap<usize, Score> = IndexMap::new();
        for feature in features {
            let (index, _) = universe.insert_full(feature);
            *values.entry(index).or_insert(0.0) += 1.0;
        }
        Some(MatrixRow::new(instance, values.into_iter().collect()))
    }

    fn feature_names(&self) -> Vec<Feature> {
        self.features
            .read()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalkConfig;
    use crate::extractors::{ConnectedByExtractor, PathSequenceExtractor, default_extractors};
    use crate::graph::InMemoryGraph;

    fn chain_generator() -> (Arc<InMemoryGraph>, WalkFeatureGenerator) {
        let graph = Arc::new(InMemoryGraph::from_triples(&[
            ("a", "r1", "b"),
            ("b", "r2", "c"),
            ("x", "r3", "y"),
        ]));
        let engine = MatchingEngine::new(default_extractors(), WalkConfig::default().with_max_steps(2));
        let generator = WalkFeatureGenerator::new(graph.clone(), engine);
        (graph, generator)
    }

    #[test]
    fn rows_intern_path_signatures() {
        let (graph, generator) = chain_generator();
        let a = graph.node_id_for_name("a").unwrap();
        let c = graph.node_id_for_name("c").unwrap();

        let row = generator.construct_matrix_row(Instance::new(a, c)).unwrap();
        assert_eq!(row.instance(), Instance::new(a, c));
        assert_eq!(row.values(), &[(0, 1.0)]);
        assert_eq!(generator.feature_names(), vec!["-r1-r2-".to_string()]);
    }

    #[test]
    fn unconnected_instances_have_no_row() {
        let (graph, generator) = chain_generator();
        let a = graph.node_id_for_name("a").unwrap();
        let y = graph.node_id_for_name("y").unwrap();
        assert!(generator.construct_matrix_row(Instance::new(a, y)).is_none());
        assert_eq!(generator.feature_count(), 0);
    }

    #[test]
    fn training_matrix_leaves_out_rowless_instances() {
        let (graph, generator) = chain_generator();
        let a = graph.node_id_for_name("a").unwrap();
        let c = graph.node_id_for_name("c").unwrap();
        let y = graph.node_id_for_name("y").unwrap();

        let dataset = Dataset::from_pairs(vec![(a, c)], Some(vec![(a, y)]));
        let matrix = generator.create_training_matrix(&dataset).unwrap();
        assert_eq!(matrix.instances(), vec![Instance::new(a, c)]);
    }

    #[test]
    fn test_matrix_projects_onto_the_training_universe() {
        let graph = Arc::new(InMemoryGraph::from_triples(&[
            ("a", "r1", "b"),
            ("c", "r1", "d"),
            ("b", "r2", "d"),
        ]));
        let engine = MatchingEngine::new(default_extractors(), WalkConfig::default().with_max_steps(1));
        let generator = WalkFeatureGenerator::new(graph.clone(), engine);

        let id = |name: &str| graph.node_id_for_name(name).unwrap();
        let training = Dataset::from_pairs(vec![(id("a"), id("b"))], None);
        generator.create_training_matrix(&training).unwrap();
        assert_eq!(generator.feature_names(), vec!["-r1-".to_string()]);

        // (c, d) reuses the known "-r1-" pattern; (b, d) only produces the
        // unseen "-r2-" pattern, so it has no test row.
        let testing = Dataset::from_pairs(vec![(id("c"), id("d")), (id("b"), id("d"))], None);
        let matrix = generator.create_test_matrix(&testing).unwrap();
        assert_eq!(matrix.instances(), vec![Instance::new(id("c"), id("d"))]);
        assert_eq!(generator.feature_count(), 1);
    }

    #[test]
    fn extractor_families_share_one_universe() {
        let graph = Arc::new(InMemoryGraph::from_triples(&[("a", "r1", "b")]));
        let engine = MatchingEngine::new(
            vec![Arc::new(PathSequenceExtractor), Arc::new(ConnectedByExtractor)],
            WalkConfig::default().with_max_steps(1),
        );
        let generator = WalkFeatureGenerator::new(graph.clone(), engine);

        let a = graph.node_id_for_name("a").unwrap();
        let b = graph.node_id_for_name("b").unwrap();
        let row = generator.construct_matrix_row(Instance::new(a, b)).unwrap();
        assert_eq!(row.values(), &[(0, 1.0), (1, 1.0)]);
        assert_eq!(
            generator.feature_names(),
            vec!["-r1-".to_string(), "CONNECTED_BY:r1".to_string()]
        );
    }

    #[test]
    fn feature_indices_are_stable_across_rows() {
        let graph = Arc::new(InMemoryGraph::from_triples(&[
            ("a", "r1", "b"),
            ("c", "r1", "d"),
        ]));
        let engine = MatchingEngine::new(default_extractors(), WalkConfig::default().with_max_steps(1));
        let generator = WalkFeatureGenerator::new(graph.clone(), engine);

        let id = |name: &str| graph.node_id_for_name(name).unwrap();
        let first = generator.construct_matrix_row(Instance::new(id("a"), id("b"))).unwrap();
        let second = generator.construct_matrix_row(Instance::new(id("c"), id("d"))).unwrap();
        assert_eq!(first.values(), second.values());
        assert_eq!(generator.feature_count(), 1);
    }
}
