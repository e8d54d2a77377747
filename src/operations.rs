use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{self, DataSelection};
use crate::constants::operation;
use crate::dataset::Dataset;
use crate::engine::MatchingEngine;
use crate::errors::PipelineError;
use crate::generator::FeatureGenerator;
use crate::graph::Graph;
use crate::models::{BatchModel, OnlineModel};
use crate::outputter::Outputter;
use crate::sgd::SgdTrainAndTest;
use crate::split::Split;

/// The collaborators one relation run is wired with. Construction takes
/// the pieces every operation needs; the variants that train attach their
/// model through the `with_` builders.
pub struct PipelineContext {
    relation: String,
    graph: Arc<dyn Graph>,
    split: Arc<dyn Split>,
    generator: Arc<dyn FeatureGenerator>,
    outputter: Arc<dyn Outputter>,
    engine: MatchingEngine,
    batch_model: Option<Arc<dyn BatchModel>>,
    online_model: Option<Arc<dyn OnlineModel>>,
}

impl PipelineContext {
    /// Wire a context for one relation.
    pub fn new(
        relation: impl Into<String>,
        graph: Arc<dyn Graph>,
        split: Arc<dyn Split>,
        generator: Arc<dyn FeatureGenerator>,
        outputter: Arc<dyn Outputter>,
    ) -> Self {
        Self {
            relation: relation.into(),
            graph,
            split,
            generator,
            outputter,
            engine: MatchingEngine::default(),
            batch_model: None,
            online_model: None,
        }
    }

    /// Replace the default path-discovery engine.
    #[must_use]
    pub fn with_engine(mut self, engine: MatchingEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Attach the model batch training uses.
    #[must_use]
    pub fn with_batch_model(mut self, model: Arc<dyn BatchModel>) -> Self {
        self.batch_model = Some(model);
        self
    }

    /// Attach the model online training uses.
    #[must_use]
    pub fn with_online_model(mut self, model: Arc<dyn OnlineModel>) -> Self {
        self.online_model = Some(model);
        self
    }

    /// The relation this run is about.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// The graph collaborator.
    pub fn graph(&self) -> &dyn Graph {
        &*self.graph
    }

    /// The feature generator collaborator.
    pub fn generator(&self) -> &dyn FeatureGenerator {
        &*self.generator
    }

    /// The artifact sink.
    pub fn outputter(&self) -> &dyn Outputter {
        &*self.outputter
    }

    /// The path-discovery engine.
    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    /// The relation's training data, absent when the split has none.
    pub fn training_data(&self) -> Result<Option<Dataset>, PipelineError> {
        self.split.training_data(&self.relation, &*self.graph)
    }

    /// The relation's testing data, absent when the split has none.
    pub fn testing_data(&self) -> Result<Option<Dataset>, PipelineError> {
        self.split.testing_data(&self.relation, &*self.graph)
    }

    pub(crate) fn batch_model(&self) -> Result<&dyn BatchModel, PipelineError> {
        self.batch_model.as_deref().ok_or_else(|| {
            PipelineError::Configuration(format!(
                "relation '{}': batch training requested but no batch model is configured",
                self.relation
            ))
        })
    }

    pub(crate) fn online_model(&self) -> Result<&dyn OnlineModel, PipelineError> {
        self.online_model.as_deref().ok_or_else(|| {
            PipelineError::Configuration(format!(
                "relation '{}': online training requested but no online model is configured",
                self.relation
            ))
        })
    }

    pub(crate) fn missing(&self, details: &str) -> PipelineError {
        PipelineError::MissingData {
            relation: self.relation.clone(),
            details: details.to_string(),
        }
    }

    /// Resolve a selection into one dataset. An explicitly selected half
    /// must exist; `both` merges whichever halves exist and fails only
    /// when neither does.
    pub(crate) fn resolve_data(&self, selection: DataSelection) -> Result<Dataset, PipelineError> {
        match selection {
            DataSelection::Training => self
                .training_data()?
                .ok_or_else(|| self.missing("training data was selected but does not exist")),
            DataSelection::Testing => self
                .testing_data()?
                .ok_or_else(|| self.missing("testing data was selected but does not exist")),
            DataSelection::Both => match (self.training_data()?, self.testing_data()?) {
                (Some(training), Some(testing)) => Ok(training.merge(&testing)),
                (Some(training), None) => Ok(training),
                (None, Some(testing)) => Ok(testing),
                (None, None) => Err(self.missing("neither training nor testing data exists")),
            },
        }
    }
}

/// The closed set of pipeline variants, dispatched by the `type` tag.
#[derive(Debug)]
pub enum Operation {
    /// Validates configuration and does nothing else.
    NoOp,
    /// Batch training followed by test-set classification.
    TrainAndTest(TrainAndTest),
    /// Path discovery over a selected dataset.
    ExploreGraph(ExploreGraph),
    /// Feature-matrix dumps without training.
    CreateMatrices(CreateMatrices),
    /// Online, parallel, cached training.
    SgdTrainAndTest(SgdTrainAndTest),
}

impl Operation {
    /// Parse an operation from its configuration value. An absent or null
    /// value selects the default variant; unknown tags and parameters
    /// outside the variant's whitelist are configuration errors.
    pub fn from_params(params: &Value) -> Result<Self, PipelineError> {
        let tag = config::string_with_default(params, operation::TAG_KEY, operation::DEFAULT_TAG)?;
        match tag.as_str() {
            operation::TAG_NO_OP => {
                config::ensure_no_extra_keys(params, operation::TAG_NO_OP, &[operation::TAG_KEY])?;
                Ok(Self::NoOp)
            }
            operation::TAG_TRAIN_AND_TEST => {
                config::ensure_no_extra_keys(
                    params,
                    operation::TAG_TRAIN_AND_TEST,
                    &[operation::TAG_KEY, operation::KEY_FEATURES, operation::KEY_LEARNING],
                )?;
                Ok(Self::TrainAndTest(TrainAndTest))
            }
            operation::TAG_EXPLORE_GRAPH => {
                config::ensure_no_extra_keys(
                    params,
                    operation::TAG_EXPLORE_GRAPH,
                    &[operation::TAG_KEY, operation::KEY_FEATURES, operation::KEY_DATA],
                )?;
                Ok(Self::ExploreGraph(ExploreGraph::new(config::data_selection(params)?)))
            }
            operation::TAG_CREATE_MATRICES => {
                config::ensure_no_extra_keys(
                    params,
                    operation::TAG_CREATE_MATRICES,
                    &[operation::TAG_KEY, operation::KEY_FEATURES, operation::KEY_DATA],
                )?;
                Ok(Self::CreateMatrices(CreateMatrices::new(config::data_selection(params)?)))
            }
            operation::TAG_SGD_TRAIN_AND_TEST => {
                config::ensure_no_extra_keys(
                    params,
                    operation::TAG_SGD_TRAIN_AND_TEST,
                    &[
                        operation::TAG_KEY,
                        operation::KEY_FEATURES,
                        operation::KEY_LEARNING,
                        operation::KEY_CACHE_FEATURE_VECTORS,
                    ],
                )?;
                Ok(Self::SgdTrainAndTest(SgdTrainAndTest::from_params(params)?))
            }
            other => Err(PipelineError::Configuration(format!(
                "unrecognized operation type '{other}'"
            ))),
        }
    }

    /// The configuration tag naming this variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::NoOp => operation::TAG_NO_OP,
            Self::TrainAndTest(_) => operation::TAG_TRAIN_AND_TEST,
            Self::ExploreGraph(_) => operation::TAG_EXPLORE_GRAPH,
            Self::CreateMatrices(_) => operation::TAG_CREATE_MATRICES,
            Self::SgdTrainAndTest(_) => operation::TAG_SGD_TRAIN_AND_TEST,
        }
    }

    /// Run the variant against a wired context.
    pub fn execute(&self, context: &PipelineContext) -> Result<(), PipelineError> {
        info!(relation = context.relation(), operation = self.tag(), "starting operation");
        match self {
            Self::NoOp => Ok(()),
            Self::TrainAndTest(op) => op.execute(context),
            Self::ExploreGraph(op) => op.execute(context),
            Self::CreateMatrices(op) => op.execute(context),
            Self::SgdTrainAndTest(op) => op.execute(context),
        }
    }
}

/// Batch training and evaluation: build the training matrix, fit the
/// batch model, classify the test matrix, and hand every artifact to the
/// outputter. Missing testing data skips evaluation with a warning;
/// missing training data is fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainAndTest;

impl TrainAndTest {
    fn execute(&self, context: &PipelineContext) -> Result<(), PipelineError> {
        let model = context.batch_model()?;
        let training = context.training_data()?.ok_or_else(|| {
            context.missing("batch training needs training data, which does not exist")
        })?;

        let matrix = context.generator().create_training_matrix(&training)?;
        let names = context.generator().feature_names();
        context.outputter().output_feature_matrix(true, &matrix, &names);
        model.train(&matrix, &training, &names)?;

        let Some(testing) = context.testing_data()? else {
            warn!(relation = context.relation(), "no testing data; skipping evaluation");
            return Ok(());
        };
        let test_matrix = context.generator().create_test_matrix(&testing)?;
        let names = context.generator().feature_names();
        context.outputter().output_feature_matrix(false, &test_matrix, &names);
        let scores = model.classify_instances(&test_matrix);
        context.outputter().output_scores(&scores, &testing);
        Ok(())
    }
}

/// Path discovery: resolve the selected dataset, enumerate the connecting
/// paths of every instance, and report how often each signature appears.
#[derive(Debug, Clone, Copy)]
pub struct ExploreGraph {
    data: DataSelection,
}

impl ExploreGraph {
    /// Explore the given dataset halves.
    pub fn new(data: DataSelection) -> Self {
        Self { data }
    }

    /// The halves this exploration covers.
    pub fn data(&self) -> DataSelection {
        self.data
    }

    fn execute(&self, context: &PipelineContext) -> Result<(), PipelineError> {
        let dataset = context.resolve_data(self.data)?;
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for instance in dataset.positive_instances().chain(dataset.negative_instances()) {
            for (path, count) in context.engine().find_connecting_paths(instance, context.graph())
            {
                *counts.entry(path).or_insert(0) += count;
            }
        }
        debug!(relation = context.relation(), paths = counts.len(), "path discovery finished");
        context.outputter().output_path_count_map(&counts, &dataset);
        Ok(())
    }
}

/// Matrix dumps without training: build the selected feature matrices and
/// hand them to the outputter. The training matrix is built first so the
/// test matrix projects onto a populated feature universe.
#[derive(Debug, Clone, Copy)]
pub struct CreateMatrices {
    data: DataSelection,
}

impl CreateMatrices {
    /// Dump matrices for the given dataset halves.
    pub fn new(data: DataSelection) -> Self {
        Self { data }
    }

    /// The halves this dump covers.
    pub fn data(&self) -> DataSelection {
        self.data
    }

    fn execute(&self, context: &PipelineContext) -> Result<(), PipelineError> {
        let training = context.training_data()?;
        let testing = context.testing_data()?;
        match self.data {
            DataSelection::Training if training.is_none() => {
                return Err(context
                    .missing("training matrices were requested but training data does not exist"));
            }
            DataSelection::Testing if testing.is_none() => {
                return Err(context
                    .missing("testing matrices were requested but testing data does not exist"));
            }
            DataSelection::Both if training.is_none() && testing.is_none() => {
                return Err(context.missing("neither training nor testing data exists"));
            }
            _ => {}
        }

        let wants_training = matches!(self.data, DataSelection::Training | DataSelection::Both);
        let wants_testing = matches!(self.data, DataSelection::Testing | DataSelection::Both);
        if wants_training {
            if let Some(dataset) = &training {
                let matrix = context.generator().create_training_matrix(dataset)?;
                let names = context.generator().feature_names();
                context.outputter().output_feature_matrix(true, &matrix, &names);
            }
        }
        if wants_testing {
            if let Some(dataset) = &testing {
                let matrix = context.generator().create_test_matrix(dataset)?;
                let names = context.generator().feature_names();
                context.outputter().output_feature_matrix(false, &matrix, &names);
            }
        }
        Ok(())
    }
}
