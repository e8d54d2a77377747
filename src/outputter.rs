use indexmap::IndexMap;
use tracing::{debug, info};

use crate::dataset::{Dataset, Instance};
use crate::generator::FeatureMatrix;
use crate::types::{Feature, Score};

/// Sink for the artifacts an operation produces. Writers for concrete
/// formats live outside this crate; operations only ever hand results to
/// this interface.
pub trait Outputter: Send + Sync {
    /// Receive a feature matrix, flagged as the training or testing half.
    fn output_feature_matrix(
        &self,
        training: bool,
        matrix: &FeatureMatrix,
        feature_names: &[Feature],
    );

    /// Receive classification scores paired with the dataset they were
    /// computed against.
    fn output_scores(&self, scores: &[(Instance, Score)], dataset: &Dataset);

    /// Receive a learned weight vector, indexed like `feature_names`.
    fn output_weights(&self, weights: &[Score], feature_names: &[Feature]);

    /// Receive a path-signature frequency report for a dataset.
    fn output_path_count_map(&self, counts: &IndexMap<String, usize>, dataset: &Dataset);

    /// Free-form run commentary.
    fn info(&self, message: &str);
}

/// Discards every artifact. Commentary and artifact shapes still reach the
/// log, so a run stays observable without any writer configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutputter;

impl Outputter for NullOutputter {
    fn output_feature_matrix(
        &self,
        training: bool,
        matrix: &FeatureMatrix,
        feature_names: &[Feature],
    ) {
        debug!(
            training,
            rows = matrix.len(),
            features = feature_names.len(),
            "discarding feature matrix"
        );
    }

    fn output_scores(&self, scores: &[(Instance, Score)], _dataset: &Dataset) {
        debug!(count = scores.len(), "discarding scores");
    }

    fn output_weights(&self, weights: &[Score], _feature_names: &[Feature]) {
        debug!(count = weights.len(), "discarding weights");
    }

    fn output_path_count_map(&self, counts: &IndexMap<String, usize>, _dataset: &Dataset) {
        debug!(paths = counts.len(), "discarding path count report");
    }

    fn info(&self, message: &str) {
        info!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_outputter_accepts_every_artifact() {
        let outputter = NullOutputter;
        let dataset = Dataset::from_pairs(vec![(1, 2)], None);
        outputter.output_feature_matrix(true, &FeatureMatrix::default(), &[]);
        outputter.output_scores(&[(Instance::new(1, 2), 0.5)], &dataset);
        outputter.output_weights(&[0.1, 0.2], &["-r1-".to_string(), "-r2-".to_string()]);
        outputter.output_path_count_map(&IndexMap::from([("-r1-".to_string(), 3)]), &dataset);
        outputter.info("done");
    }
}
