#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Feature-row cache shared by the online training loop.
pub mod cache;
/// Walk bounds, data selection, and operation-parameter helpers.
pub mod config;
/// Centralized constants used across datasets, walks, and operations.
pub mod constants;
/// Labeled node-pair datasets, splits, and membership queries.
pub mod dataset;
/// Subgraph feature matching and connecting-path discovery.
pub mod engine;
/// Feature extractor families and their registry.
pub mod extractors;
/// Feature matrices and the walk-backed feature generator.
pub mod generator;
/// Graph access trait and the in-memory reference graph.
pub mod graph;
/// Per-step walk predicates contributed by extractors.
pub mod matchers;
/// Contracts for batch and online models.
pub mod models;
/// Pipeline operation variants and their dispatch.
pub mod operations;
/// Artifact sinks.
pub mod outputter;
/// Online, parallel, cached training.
pub mod sgd;
/// Per-relation training/testing data lookup.
pub mod split;
/// Shared type aliases.
pub mod types;

mod errors;

pub use cache::{CacheStatsSnapshot, FeatureCache};
pub use config::{DataSelection, WalkConfig};
pub use dataset::{Dataset, Instance, PairColumns, PairView};
pub use engine::MatchingEngine;
pub use errors::PipelineError;
pub use extractors::{
    ConnectedByExtractor, FeatureExtractor, OneSidedSourceExtractor, PathSequenceExtractor,
    Subgraph, build_extractors, default_extractors,
};
pub use generator::{FeatureGenerator, FeatureMatrix, MatrixRow, WalkFeatureGenerator};
pub use graph::{Graph, GraphStep, InMemoryGraph};
pub use matchers::{FeatureMatcher, PathSequenceMatcher, SingleEdgeMatcher};
pub use models::{BatchModel, OnlineModel};
pub use operations::{CreateMatrices, ExploreGraph, Operation, PipelineContext, TrainAndTest};
pub use outputter::{NullOutputter, Outputter};
pub use sgd::{ExecutionMode, SgdTrainAndTest};
pub use split::{DirectorySplit, Split, sanitize_relation};
pub use types::{EdgeId, Feature, NodeId, Score};
