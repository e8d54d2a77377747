use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::FeatureCache;
use crate::config;
use crate::constants::operation::KEY_CACHE_FEATURE_VECTORS;
use crate::constants::sgd::ABSENT_ROW_SCORE;
use crate::dataset::Instance;
use crate::errors::PipelineError;
use crate::generator::{FeatureMatrix, MatrixRow};
use crate::models::OnlineModel;
use crate::operations::PipelineContext;
use crate::types::Score;

/// How the per-epoch instance sweep runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Fan instances out across the rayon pool.
    #[default]
    Parallel,
    /// Process instances on the calling thread. With a shuffle seed this
    /// makes a whole run reproducible.
    Sequential,
}

/// Online training and evaluation.
///
/// Each epoch shuffles the training instances and sweeps them, reusing
/// cached feature rows and extracting missing ones; every present row is
/// pushed into the shared model. Weight updates are applied without mutual
/// exclusion between workers (asynchronous stochastic gradient descent in
/// the Hogwild style), so concurrent updates may interleave; the
/// [`OnlineModel`] contract accepts that in exchange for an unserialized
/// parallel loop. After the epochs, the retained rows are emitted as the
/// training matrix, the cache is cleared, and the testing half is
/// classified with absent rows scored as confident negatives.
///
/// An extraction failure for one instance surfaces as an absent row, never
/// as an abort of the epoch.
///
/// With caching disabled every sweep re-extracts, nothing is retained, and
/// the emitted matrices are empty.
#[derive(Debug, Clone)]
pub struct SgdTrainAndTest {
    cache_enabled: bool,
    mode: ExecutionMode,
    shuffle_seed: Option<u64>,
}

impl Default for SgdTrainAndTest {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            mode: ExecutionMode::Parallel,
            shuffle_seed: None,
        }
    }
}

impl SgdTrainAndTest {
    /// Parallel execution with the row cache enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cache toggle from already-whitelisted operation parameters.
    pub fn from_params(params: &Value) -> Result<Self, PipelineError> {
        let cache_enabled = config::bool_with_default(params, KEY_CACHE_FEATURE_VECTORS, true)?;
        Ok(Self::new().with_cache_enabled(cache_enabled))
    }

    /// Toggle the feature-row cache.
    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Replace the sweep execution mode.
    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Derive each epoch's shuffle from a fixed seed instead of thread
    /// randomness.
    #[must_use]
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Whether extracted rows are cached across epochs.
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub(crate) fn execute(&self, context: &PipelineContext) -> Result<(), PipelineError> {
        let model = context.online_model()?;
        let training = context.training_data()?.ok_or_else(|| {
            context.missing("online training needs training data, which does not exist")
        })?;
        let testing = context.testing_data()?;

        let cache = FeatureCache::new();
        let mut order: Vec<Instance> = training
            .positive_instances()
            .chain(training.negative_instances())
            .collect();

        for epoch in 0..model.iterations() {
            model.next_iteration();
            self.shuffle(&mut order, epoch);
            self.sweep(&order, |instance| {
                if let Some(row) = self.row_for(instance, context, &cache) {
                    model.update_weights(&row);
                }
            });
            debug!(relation = context.relation(), epoch, "epoch finished");
        }

        let names = context.generator().feature_names();
        context.outputter().output_feature_matrix(true, &self.retained_rows(&cache), &names);
        context.outputter().output_weights(&model.weights(), &names);
        let stats = cache.stats();
        info!(
            relation = context.relation(),
            hits = stats.hits,
            misses = stats.misses,
            "training row lookups"
        );

        let Some(testing) = testing else {
            warn!(relation = context.relation(), "no testing data; skipping evaluation");
            return Ok(());
        };
        cache.clear();
        let test_instances: Vec<Instance> = testing
            .positive_instances()
            .chain(testing.negative_instances())
            .collect();
        let scores = self.classify(&test_instances, context, &cache, model);
        context.outputter().output_scores(&scores, &testing);
        let names = context.generator().feature_names();
        context.outputter().output_feature_matrix(false, &self.retained_rows(&cache), &names);
        Ok(())
    }

    fn shuffle(&self, order: &mut [Instance], epoch: usize) {
        match self.shuffle_seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch as u64));
                order.shuffle(&mut rng);
            }
            None => order.shuffle(&mut rand::rng()),
        }
    }

    fn sweep(&self, order: &[Instance], work: impl Fn(Instance) + Send + Sync) {
        match self.mode {
            ExecutionMode::Parallel => order.par_iter().copied().for_each(work),
            ExecutionMode::Sequential => order.iter().copied().for_each(work),
        }
    }

    fn row_for(
        &self,
        instance: Instance,
        context: &PipelineContext,
        cache: &FeatureCache,
    ) -> Option<MatrixRow> {
        if self.cache_enabled {
            cache.get_or_compute(instance, |instance| {
                context.generator().construct_matrix_row(instance)
            })
        } else {
            context.generator().construct_matrix_row(instance)
        }
    }

    fn retained_rows(&self, cache: &FeatureCache) -> FeatureMatrix {
        if self.cache_enabled { cache.materialize_rows() } else { FeatureMatrix::default() }
    }

    fn classify(
        &self,
        instances: &[Instance],
        context: &PipelineContext,
        cache: &FeatureCache,
        model: &dyn OnlineModel,
    ) -> Vec<(Instance, Score)> {
        let score_one = |instance: Instance| {
            let score = match self.row_for(instance, context, cache) {
                Some(row) => model.classify_instance(&row),
                None => {
                    debug!(
                        source = instance.source,
                        target = instance.target,
                        "no feature row; scoring the absent-row default"
                    );
                    ABSENT_ROW_SCORE
                }
            };
            (instance, score)
        };
        match self.mode {
            ExecutionMode::Parallel => instances.par_iter().copied().map(score_one).collect(),
            ExecutionMode::Sequential => instances.iter().copied().map(score_one).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_toggle_the_cache() {
        assert!(SgdTrainAndTest::from_params(&Value::Null).unwrap().cache_enabled());
        let parsed =
            SgdTrainAndTest::from_params(&json!({"cache feature vectors": false})).unwrap();
        assert!(!parsed.cache_enabled());
    }

    #[test]
    fn builders_replace_run_settings() {
        let sgd = SgdTrainAndTest::new()
            .with_cache_enabled(false)
            .with_execution_mode(ExecutionMode::Sequential)
            .with_shuffle_seed(7);
        assert!(!sgd.cache_enabled());
        assert_eq!(sgd.mode, ExecutionMode::Sequential);
        assert_eq!(sgd.shuffle_seed, Some(7));
    }
}
