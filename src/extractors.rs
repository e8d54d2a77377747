use std::sync::Arc;

use indexmap::IndexMap;

use crate::constants::features::{
    CONNECTED_BY_PREFIX, EXTRACTOR_CONNECTED_BY, EXTRACTOR_ONE_SIDED_SOURCE,
    EXTRACTOR_PATH_SEQUENCE, SOURCE_PREFIX,
};
use crate::constants::walk::PATH_DELIMITER;
use crate::dataset::Instance;
use crate::errors::PipelineError;
use crate::graph::Graph;
use crate::matchers::{FeatureMatcher, PathSequenceMatcher, SingleEdgeMatcher};
use crate::types::Feature;

/// Bounded path structure discovered between an instance's endpoints: each
/// path signature maps to the number of walks that followed it. Insertion
/// order is discovery order, which keeps derived feature order stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subgraph {
    /// Path signature (e.g. `-r1-_r2-`) to walk count.
    pub path_counts: IndexMap<String, usize>,
}

impl Subgraph {
    /// Wrap discovered path counts.
    pub fn new(path_counts: IndexMap<String, usize>) -> Self {
        Self { path_counts }
    }

    /// True when no connecting path was discovered.
    pub fn is_empty(&self) -> bool {
        self.path_counts.is_empty()
    }
}

/// One feature family: renders an instance's discovered subgraph into
/// textual features and, where the family supports it, reverses a feature
/// back into a walk matcher.
pub trait FeatureExtractor: Send + Sync {
    /// Registry name of this extractor family.
    fn name(&self) -> &'static str;

    /// Render the instance's subgraph into textual features.
    fn extract(&self, instance: Instance, subgraph: &Subgraph, graph: &dyn Graph) -> Vec<Feature>;

    /// Reverse a feature into a matcher that recovers, from one node, the
    /// set of nodes connected to it by the feature's pattern. Families that
    /// cannot reconstruct a pattern return `None`; that is not an error.
    fn feature_matcher(
        &self,
        feature: &str,
        graph: &dyn Graph,
    ) -> Option<Arc<dyn FeatureMatcher>> {
        let _ = (feature, graph);
        None
    }
}

impl std::fmt::Debug for dyn FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("name", &self.name())
            .finish()
    }
}

/// Full path-pattern features: every discovered path signature is a feature,
/// and each one reverses into a [`PathSequenceMatcher`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PathSequenceExtractor;

impl FeatureExtractor for PathSequenceExtractor {
    fn name(&self) -> &'static str {
        EXTRACTOR_PATH_SEQUENCE
    }

    fn extract(
        &self,
        _instance: Instance,
        subgraph: &Subgraph,
        _graph: &dyn Graph,
    ) -> Vec<Feature> {
        subgraph.path_counts.keys().cloned().collect()
    }

    fn feature_matcher(
        &self,
        feature: &str,
        graph: &dyn Graph,
    ) -> Option<Arc<dyn FeatureMatcher>> {
        PathSequenceMatcher::parse(feature, graph)
            .map(|matcher| Arc::new(matcher) as Arc<dyn FeatureMatcher>)
    }
}

/// Single-relation connectivity features: one `CONNECTED_BY:<label>` feature
/// per one-step path in the subgraph, reversing into a [`SingleEdgeMatcher`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectedByExtractor;

impl FeatureExtractor for ConnectedByExtractor {
    fn name(&self) -> &'static str {
        EXTRACTOR_CONNECTED_BY
    }

    fn extract(
        &self,
        _instance: Instance,
        subgraph: &Subgraph,
        _graph: &dyn Graph,
    ) -> Vec<Feature> {
        subgraph
            .path_counts
            .keys()
            .filter_map(|signature| single_step_label(signature))
            .map(|label| format!("{CONNECTED_BY_PREFIX}{label}"))
            .collect()
    }

    fn feature_matcher(
        &self,
        feature: &str,
        graph: &dyn Graph,
    ) -> Option<Arc<dyn FeatureMatcher>> {
        let label = feature.strip_prefix(CONNECTED_BY_PREFIX)?;
        let edge = graph.edge_id_for_name(label)?;
        Some(Arc::new(SingleEdgeMatcher::new(edge)))
    }
}

/// Source-side features (`SOURCE:<node name>`) that characterize the
/// instance by its source node alone. One-sided patterns cannot be walked
/// back from a single node, so this family never yields a matcher.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneSidedSourceExtractor;

impl FeatureExtractor for OneSidedSourceExtractor {
    fn name(&self) -> &'static str {
        EXTRACTOR_ONE_SIDED_SOURCE
    }

    fn extract(
        &self,
        instance: Instance,
        _subgraph: &Subgraph,
        graph: &dyn Graph,
    ) -> Vec<Feature> {
        graph
            .node_name(instance.source)
            .map(|name| vec![format!("{SOURCE_PREFIX}{name}")])
            .unwrap_or_default()
    }
}

/// The extractor list used when no families are configured.
pub fn default_extractors() -> Vec<Arc<dyn FeatureExtractor>> {
    vec![Arc::new(PathSequenceExtractor)]
}

/// Resolve configured extractor family names against the registry. Unknown
/// names are a configuration error naming the offender.
pub fn build_extractors(
    names: &[String],
) -> Result<Vec<Arc<dyn FeatureExtractor>>, PipelineError> {
    names.iter().map(|name| extractor_for(name)).collect()
}

fn extractor_for(name: &str) -> Result<Arc<dyn FeatureExtractor>, PipelineError> {
    match name {
        EXTRACTOR_PATH_SEQUENCE => Ok(Arc::new(PathSequenceExtractor)),
        EXTRACTOR_CONNECTED_BY => Ok(Arc::new(ConnectedByExtractor)),
        EXTRACTOR_ONE_SIDED_SOURCE => Ok(Arc::new(OneSidedSourceExtractor)),
        other => Err(PipelineError::Configuration(format!(
            "unrecognized feature extractor '{other}'"
        ))),
    }
}

fn single_step_label(signature: &str) -> Option<&str> {
    let body = signature
        .strip_prefix(PATH_DELIMITER)?
        .strip_suffix(PATH_DELIMITER)?;
    if body.is_empty() || body.contains(PATH_DELIMITER) {
        None
    } else {
        Some(body)
    }
}
