use std::path::PathBuf;

use tracing::debug;

use crate::constants::split::{TESTING_FILE, TRAINING_FILE};
use crate::dataset::Dataset;
use crate::errors::PipelineError;
use crate::graph::Graph;

/// Supplies the training and testing halves of a relation's data. Either
/// half may legitimately not exist; `Ok(None)` reports that, while `Err`
/// is reserved for data that exists but cannot be loaded.
///
/// The graph is passed through so implementations whose files store node
/// names can resolve them to ids.
pub trait Split: Send + Sync {
    /// The relation's training data, if any was prepared.
    fn training_data(
        &self,
        relation: &str,
        graph: &dyn Graph,
    ) -> Result<Option<Dataset>, PipelineError>;

    /// The relation's held-out testing data, if any was prepared.
    fn testing_data(
        &self,
        relation: &str,
        graph: &dyn Graph,
    ) -> Result<Option<Dataset>, PipelineError>;
}

/// A [`Split`] over a directory tree laid out as
/// `<root>/<relation>/training.tsv` and `<root>/<relation>/testing.tsv`,
/// with the relation name made path-safe first. Files hold integer node
/// ids, so the graph is not consulted.
#[derive(Debug, Clone)]
pub struct DirectorySplit {
    root: PathBuf,
}

impl DirectorySplit {
    /// A split rooted at `root`. The directory does not have to exist yet;
    /// missing relation directories read as absent data.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding `relation`'s files.
    pub fn relation_dir(&self, relation: &str) -> PathBuf {
        self.root.join(sanitize_relation(relation))
    }

    fn load(&self, relation: &str, file: &str) -> Result<Option<Dataset>, PipelineError> {
        let path = self.relation_dir(relation).join(file);
        if !path.exists() {
            debug!(path = %path.display(), "split file absent");
            return Ok(None);
        }
        Dataset::from_tsv_path(&path).map(Some)
    }
}

impl Split for DirectorySplit {
    fn training_data(
        &self,
        relation: &str,
        _graph: &dyn Graph,
    ) -> Result<Option<Dataset>, PipelineError> {
        self.load(relation, TRAINING_FILE)
    }

    fn testing_data(
        &self,
        relation: &str,
        _graph: &dyn Graph,
    ) -> Result<Option<Dataset>, PipelineError> {
        self.load(relation, TESTING_FILE)
    }
}

/// Relation names may carry path separators and spaces (Freebase-style
/// `/people/person/nationality`); both become underscores on disk.
pub fn sanitize_relation(relation: &str) -> String {
    relation
        .chars()
        .map(|c| if c == '/' || c == ' ' || c == std::path::MAIN_SEPARATOR { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraph;
    use std::fs;

    fn empty_graph() -> InMemoryGraph {
        InMemoryGraph::new()
    }

    #[test]
    fn sanitizes_relation_names_for_the_filesystem() {
        assert_eq!(sanitize_relation("/people/person/nationality"), "_people_person_nationality");
        assert_eq!(sanitize_relation("works at"), "works_at");
        assert_eq!(sanitize_relation("plain"), "plain");
    }

    #[test]
    fn loads_the_halves_that_exist() {
        let dir = tempfile::tempdir().unwrap();
        let split = DirectorySplit::new(dir.path());
        let relation_dir = split.relation_dir("works at");
        fs::create_dir_all(&relation_dir).unwrap();
        fs::write(relation_dir.join(TRAINING_FILE), "1\t2\n3\t4\t-1\n").unwrap();

        let graph = empty_graph();
        let training = split.training_data("works at", &graph).unwrap().unwrap();
        assert_eq!(training.positive_count(), 1);
        assert_eq!(training.negative_count(), 1);
        assert!(split.testing_data("works at", &graph).unwrap().is_none());
    }

    #[test]
    fn missing_relation_directory_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let split = DirectorySplit::new(dir.path());
        let graph = empty_graph();
        assert!(split.training_data("unknown", &graph).unwrap().is_none());
    }

    #[test]
    fn unreadable_data_is_an_error_rather_than_absent() {
        let dir = tempfile::tempdir().unwrap();
        let split = DirectorySplit::new(dir.path());
        let relation_dir = split.relation_dir("rel");
        fs::create_dir_all(&relation_dir).unwrap();
        fs::write(relation_dir.join(TESTING_FILE), "not\tan\tinteger\n").unwrap();

        let graph = empty_graph();
        let err = split.testing_data("rel", &graph).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { line: 1, .. }));
    }
}
