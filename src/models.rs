use crate::dataset::{Dataset, Instance};
use crate::errors::PipelineError;
use crate::generator::{FeatureMatrix, MatrixRow};
use crate::types::{Feature, Score};

/// A whole-matrix learner. Implementations keep their learned state behind
/// interior mutability so a trained model can be shared across operations.
pub trait BatchModel: Send + Sync {
    /// Fit the model to a training matrix. The dataset supplies the labels
    /// by pair membership; `feature_names` names the row indices.
    fn train(
        &self,
        matrix: &FeatureMatrix,
        dataset: &Dataset,
        feature_names: &[Feature],
    ) -> Result<(), PipelineError>;

    /// Score every row of a matrix, pairing each score with its instance.
    fn classify_instances(&self, matrix: &FeatureMatrix) -> Vec<(Instance, Score)>;
}

/// An incremental learner driven one row at a time by the online training
/// loop.
///
/// `update_weights` is called concurrently from many worker threads with no
/// mutual exclusion between updates. Implementations are expected to accept
/// interleaved or lost updates in the asynchronous stochastic-gradient
/// style; taking a whole-model lock inside `update_weights` would serialize
/// the parallel loop and is not what this contract asks for.
pub trait OnlineModel: Send + Sync {
    /// Number of training epochs to run.
    fn iterations(&self) -> usize;

    /// Advance the model's epoch counter. Called once per epoch before any
    /// instance is processed, never concurrently with updates.
    fn next_iteration(&self);

    /// Fold one feature row into the weights. See the trait docs for the
    /// concurrency contract.
    fn update_weights(&self, row: &MatrixRow);

    /// Score a single feature row. Feature indices beyond the weights
    /// learned so far carry zero weight.
    fn classify_instance(&self, row: &MatrixRow) -> Score;

    /// The current weight vector, indexed by interned feature index.
    fn weights(&self) -> Vec<Score>;
}
