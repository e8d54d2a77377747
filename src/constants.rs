/// Constants used by operation tag dispatch and parameter whitelists.
pub mod operation {
    /// Configuration key selecting the operation variant.
    pub const TAG_KEY: &str = "type";
    /// Tag for the do-nothing configuration-check variant.
    pub const TAG_NO_OP: &str = "no op";
    /// Tag for batch training plus test classification.
    pub const TAG_TRAIN_AND_TEST: &str = "train and test";
    /// Tag for path discovery over a selected dataset.
    pub const TAG_EXPLORE_GRAPH: &str = "explore graph";
    /// Tag for dumping feature matrices without training.
    pub const TAG_CREATE_MATRICES: &str = "create matrices";
    /// Tag for online, parallel, cached training.
    pub const TAG_SGD_TRAIN_AND_TEST: &str = "sgd train and test";
    /// Variant used when the tag key is absent.
    pub const DEFAULT_TAG: &str = TAG_TRAIN_AND_TEST;

    /// Key for the feature-generation sub-object (consumed by the caller
    /// when building the Feature Generator, whitelisted here).
    pub const KEY_FEATURES: &str = "features";
    /// Key for the model sub-object (consumed by the caller when building
    /// the Model, whitelisted here).
    pub const KEY_LEARNING: &str = "learning";
    /// Key selecting which dataset halves an operation works on.
    pub const KEY_DATA: &str = "data";
    /// Key toggling the online loop's feature-row cache.
    pub const KEY_CACHE_FEATURE_VECTORS: &str = "cache feature vectors";

    /// `data` value selecting training data only.
    pub const DATA_TRAINING: &str = "training";
    /// `data` value selecting testing data only.
    pub const DATA_TESTING: &str = "testing";
    /// `data` value selecting both halves, merged where an operation needs
    /// one dataset.
    pub const DATA_BOTH: &str = "both";
}

/// Constants used by dataset parsing and serialization.
pub mod dataset {
    /// Label column value marking a positive instance.
    pub const POSITIVE_LABEL: &str = "1";
    /// Label column value marking a negative instance.
    pub const NEGATIVE_LABEL: &str = "-1";
    /// Column separator in dataset files.
    pub const FIELD_DELIMITER: char = '\t';
    /// Separator inside `"<source> <target>"` membership keys.
    pub const INSTANCE_KEY_DELIMITER: &str = " ";
}

/// Constants used by graph walks and path-feature rendering.
pub mod walk {
    /// Separator between edge labels in a rendered path signature.
    /// Edge labels must not contain it.
    pub const PATH_DELIMITER: char = '-';
    /// Prefix marking the inverse direction of an edge label.
    pub const INVERSE_EDGE_PREFIX: &str = "_";
    /// Default bound on walk length during path discovery and matching.
    pub const DEFAULT_MAX_STEPS: usize = 3;
    /// Default cap on a node's outgoing steps before it is skipped as too
    /// high-degree to expand.
    pub const DEFAULT_MAX_FAN_OUT: usize = 100;
}

/// Constants used by the feature extractor registry and feature naming.
pub mod features {
    /// Registry name of the path-sequence extractor family.
    pub const EXTRACTOR_PATH_SEQUENCE: &str = "path sequence";
    /// Registry name of the single-relation connectivity extractor family.
    pub const EXTRACTOR_CONNECTED_BY: &str = "connected by";
    /// Registry name of the source-side-only extractor family.
    pub const EXTRACTOR_ONE_SIDED_SOURCE: &str = "one sided source";
    /// Prefix of single-relation connectivity features.
    pub const CONNECTED_BY_PREFIX: &str = "CONNECTED_BY:";
    /// Prefix of source-side features.
    pub const SOURCE_PREFIX: &str = "SOURCE:";
}

/// Constants used by directory-backed splits.
pub mod split {
    /// File holding a relation's training instances.
    pub const TRAINING_FILE: &str = "training.tsv";
    /// File holding a relation's testing instances.
    pub const TESTING_FILE: &str = "testing.tsv";
}

/// Constants used by online training.
pub mod sgd {
    /// Score assigned to an instance whose feature row is absent.
    pub const ABSENT_ROW_SCORE: f64 = 0.0;
}
