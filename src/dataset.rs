use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::constants::dataset::{
    FIELD_DELIMITER, INSTANCE_KEY_DELIMITER, NEGATIVE_LABEL, POSITIVE_LABEL,
};
use crate::errors::PipelineError;
use crate::types::NodeId;

/// One (source, target) query under the relation an operation is running
/// for. Compared and hashed by value so it can key the feature-row cache.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Instance {
    /// Source node of the query.
    pub source: NodeId,
    /// Target node of the query.
    pub target: NodeId,
}

impl Instance {
    /// Pair a source node with a target node.
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self { source, target }
    }

    /// Render the `"<source> <target>"` membership key.
    pub fn as_key(&self) -> String {
        format!("{}{}{}", self.source, INSTANCE_KEY_DELIMITER, self.target)
    }
}

/// Which labeled pairs a dataset query covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairView {
    /// Positive pairs only.
    Positive,
    /// Negative pairs only; empty when negatives are absent.
    Negative,
    /// Positives and negatives together.
    Combined,
}

/// Two parallel node-id sequences paired by position: `sources[i]` belongs
/// with `targets[i]`. Reordering one sequence without the other corrupts the
/// pairing, so splitting rebuilds both from one shared permutation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PairColumns {
    sources: Vec<NodeId>,
    targets: Vec<NodeId>,
}

impl PairColumns {
    /// Pair two sequences, rejecting a length mismatch.
    pub fn new(sources: Vec<NodeId>, targets: Vec<NodeId>) -> Result<Self, PipelineError> {
        if sources.len() != targets.len() {
            return Err(PipelineError::Dataset(format!(
                "source and target sequences must pair positionally, got {} sources and {} targets",
                sources.len(),
                targets.len()
            )));
        }
        Ok(Self { sources, targets })
    }

    /// Build columns from already-paired tuples.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (NodeId, NodeId)>) -> Self {
        let mut columns = Self::default();
        for (source, target) in pairs {
            columns.push(source, target);
        }
        columns
    }

    /// Source ids in pairing order.
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    /// Target ids in pairing order.
    pub fn targets(&self) -> &[NodeId] {
        &self.targets
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True when no pairs are present.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate the pairs as instances, in pairing order.
    pub fn instances(&self) -> impl Iterator<Item = Instance> + '_ {
        self.sources
            .iter()
            .zip(self.targets.iter())
            .map(|(&source, &target)| Instance::new(source, target))
    }

    fn push(&mut self, source: NodeId, target: NodeId) {
        self.sources.push(source);
        self.targets.push(target);
    }

    fn concat(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.sources.extend_from_slice(&other.sources);
        merged.targets.extend_from_slice(&other.targets);
        merged
    }

    fn group_targets_by_source(&self, map: &mut HashMap<NodeId, HashSet<NodeId>>) {
        for instance in self.instances() {
            map.entry(instance.source).or_default().insert(instance.target);
        }
    }

    fn instance_keys_into(&self, keys: &mut HashSet<String>) {
        for instance in self.instances() {
            keys.insert(instance.as_key());
        }
    }

    /// Shuffle the pairing order and cut at `floor(fraction * len)`. Both
    /// sequences are rebuilt from the same permutation.
    fn split(&self, fraction: f64, rng: &mut impl Rng) -> (Self, Self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        let cut = ((fraction * self.len() as f64).floor() as usize).min(self.len());
        let mut training = Self::default();
        let mut testing = Self::default();
        for (position, &index) in order.iter().enumerate() {
            let half = if position < cut { &mut training } else { &mut testing };
            half.push(self.sources[index], self.targets[index]);
        }
        (training, testing)
    }
}

/// Immutable collection of positive and negative (source, target) pairs for
/// one relation.
///
/// Negatives are tri-state: absent (`None`, no negative examples were ever
/// specified), present but empty, or present and populated. Downstream
/// operations branch on absent vs. empty, so loading never collapses one
/// into the other: a file with zero negative records loads with absent
/// negatives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dataset {
    positives: PairColumns,
    negatives: Option<PairColumns>,
}

impl Dataset {
    /// Assemble a dataset from validated pair columns.
    pub fn new(positives: PairColumns, negatives: Option<PairColumns>) -> Self {
        Self { positives, negatives }
    }

    /// Assemble a dataset from already-paired tuples.
    pub fn from_pairs(
        positive: Vec<(NodeId, NodeId)>,
        negative: Option<Vec<(NodeId, NodeId)>>,
    ) -> Self {
        Self {
            positives: PairColumns::from_pairs(positive),
            negatives: negative.map(PairColumns::from_pairs),
        }
    }

    /// Parse TSV instance lines: `source\ttarget` (positive by convention)
    /// or `source\ttarget\t{1|-1}`. The first malformed line aborts the
    /// load. Zero negative records leave the negatives absent.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut positives = PairColumns::default();
        let mut negatives = PairColumns::default();
        for (index, line) in lines.into_iter().enumerate() {
            let number = index + 1;
            let content = line.as_ref().trim_end_matches('\r');
            let fields: Vec<&str> = content.split(FIELD_DELIMITER).collect();
            let (source_field, target_field, label) = match fields.as_slice() {
                [source, target] => (*source, *target, POSITIVE_LABEL),
                [source, target, label] => (*source, *target, *label),
                _ => {
                    return Err(PipelineError::Parse {
                        line: number,
                        content: content.to_string(),
                        reason: format!(
                            "expected 2 or 3 tab-separated fields, got {}",
                            fields.len()
                        ),
                    });
                }
            };
            let source = parse_node_id(source_field, number, content)?;
            let target = parse_node_id(target_field, number, content)?;
            match label {
                POSITIVE_LABEL => positives.push(source, target),
                NEGATIVE_LABEL => negatives.push(source, target),
                other => {
                    return Err(PipelineError::Parse {
                        line: number,
                        content: content.to_string(),
                        reason: format!(
                            "label must be {POSITIVE_LABEL} or {NEGATIVE_LABEL}, got '{other}'"
                        ),
                    });
                }
            }
        }
        let negatives = if negatives.is_empty() { None } else { Some(negatives) };
        Ok(Self { positives, negatives })
    }

    /// Load a dataset from a TSV file.
    pub fn from_tsv_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path)?;
        Self::from_lines(contents.lines())
    }

    /// Render the dataset in its TSV file format. Labels are written only
    /// when negatives are present; a positive-only dataset round-trips
    /// through the 2-column form.
    pub fn to_tsv_string(&self) -> String {
        let mut out = String::new();
        match &self.negatives {
            None => {
                for instance in self.positives.instances() {
                    out.push_str(&format!(
                        "{}{FIELD_DELIMITER}{}\n",
                        instance.source, instance.target
                    ));
                }
            }
            Some(negatives) => {
                for instance in self.positives.instances() {
                    out.push_str(&format!(
                        "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{POSITIVE_LABEL}\n",
                        instance.source, instance.target
                    ));
                }
                for instance in negatives.instances() {
                    out.push_str(&format!(
                        "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{NEGATIVE_LABEL}\n",
                        instance.source, instance.target
                    ));
                }
            }
        }
        out
    }

    /// Write the dataset in its TSV file format.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<(), PipelineError> {
        writer.write_all(self.to_tsv_string().as_bytes())?;
        Ok(())
    }

    /// Positive pairs.
    pub fn positives(&self) -> &PairColumns {
        &self.positives
    }

    /// Negative pairs; `None` when no negative examples were ever specified.
    pub fn negatives(&self) -> Option<&PairColumns> {
        self.negatives.as_ref()
    }

    /// Number of positive pairs.
    pub fn positive_count(&self) -> usize {
        self.positives.len()
    }

    /// Number of negative pairs; zero when negatives are absent.
    pub fn negative_count(&self) -> usize {
        self.negatives.as_ref().map_or(0, PairColumns::len)
    }

    /// Total number of pairs across both labels.
    pub fn instance_count(&self) -> usize {
        self.positive_count() + self.negative_count()
    }

    /// Iterate the positive pairs as instances.
    pub fn positive_instances(&self) -> impl Iterator<Item = Instance> + '_ {
        self.positives.instances()
    }

    /// Iterate the negative pairs as instances; empty when absent.
    pub fn negative_instances(&self) -> impl Iterator<Item = Instance> + '_ {
        self.negatives.iter().flat_map(PairColumns::instances)
    }

    /// `"<source> <target>"` keys of the positive pairs, for O(1)
    /// membership tests.
    pub fn positive_instances_as_strings(&self) -> HashSet<String> {
        let mut keys = HashSet::new();
        self.positives.instance_keys_into(&mut keys);
        keys
    }

    /// `"<source> <target>"` keys of the negative pairs; empty when absent.
    pub fn negative_instances_as_strings(&self) -> HashSet<String> {
        let mut keys = HashSet::new();
        if let Some(negatives) = &self.negatives {
            negatives.instance_keys_into(&mut keys);
        }
        keys
    }

    /// Every source id appearing in the dataset, across both labels.
    pub fn all_sources(&self) -> HashSet<NodeId> {
        let mut sources: HashSet<NodeId> = self.positives.sources().iter().copied().collect();
        if let Some(negatives) = &self.negatives {
            sources.extend(negatives.sources().iter().copied());
        }
        sources
    }

    /// Every target id appearing in the dataset, across both labels.
    pub fn all_targets(&self) -> HashSet<NodeId> {
        let mut targets: HashSet<NodeId> = self.positives.targets().iter().copied().collect();
        if let Some(negatives) = &self.negatives {
            targets.extend(negatives.targets().iter().copied());
        }
        targets
    }

    /// Map each source id to the set of target ids observed with it under
    /// the given view. Absent negatives yield an empty map under the
    /// negative view.
    pub fn source_map(&self, view: PairView) -> HashMap<NodeId, HashSet<NodeId>> {
        let mut map = HashMap::new();
        if matches!(view, PairView::Positive | PairView::Combined) {
            self.positives.group_targets_by_source(&mut map);
        }
        if matches!(view, PairView::Negative | PairView::Combined) {
            if let Some(negatives) = &self.negatives {
                negatives.group_targets_by_source(&mut map);
            }
        }
        map
    }

    /// Partition into (training, testing) datasets. Positives and negatives
    /// are shuffled and cut independently at `floor(fraction * n)`, which
    /// preserves the label ratio modulo rounding. Absent negatives stay
    /// absent in both halves. Reproducible under a seeded rng.
    pub fn split(
        &self,
        fraction: f64,
        rng: &mut impl Rng,
    ) -> Result<(Self, Self), PipelineError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(PipelineError::Configuration(format!(
                "split fraction must be within [0, 1], got {fraction}"
            )));
        }
        let (training_positives, testing_positives) = self.positives.split(fraction, rng);
        let (training_negatives, testing_negatives) = match &self.negatives {
            None => (None, None),
            Some(negatives) => {
                let (training, testing) = negatives.split(fraction, rng);
                (Some(training), Some(testing))
            }
        };
        Ok((
            Self::new(training_positives, training_negatives),
            Self::new(testing_positives, testing_negatives),
        ))
    }

    /// Concatenate two datasets positionally. Negatives are absent only when
    /// absent on both sides.
    pub fn merge(&self, other: &Self) -> Self {
        let positives = self.positives.concat(&other.positives);
        let negatives = match (&self.negatives, &other.negatives) {
            (None, None) => None,
            (Some(ours), None) => Some(ours.clone()),
            (None, Some(theirs)) => Some(theirs.clone()),
            (Some(ours), Some(theirs)) => Some(ours.concat(theirs)),
        };
        Self::new(positives, negatives)
    }
}

fn parse_node_id(field: &str, line: usize, content: &str) -> Result<NodeId, PipelineError> {
    field.parse::<NodeId>().map_err(|_| PipelineError::Parse {
        line,
        content: content.to_string(),
        reason: format!("non-integer node id '{field}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sorted_pairs(columns: &PairColumns) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<(NodeId, NodeId)> = columns
            .instances()
            .map(|instance| (instance.source, instance.target))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    fn labeled_pairs(dataset: &Dataset) -> Vec<(NodeId, NodeId, bool)> {
        let mut pairs: Vec<(NodeId, NodeId, bool)> = dataset
            .positive_instances()
            .map(|i| (i.source, i.target, true))
            .chain(dataset.negative_instances().map(|i| (i.source, i.target, false)))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn parses_two_and_three_column_lines() {
        let dataset =
            Dataset::from_lines(["1\t2", "3\t4\t1", "5\t6\t-1"]).unwrap();
        assert_eq!(dataset.positive_count(), 2);
        assert_eq!(dataset.negative_count(), 1);
        assert_eq!(sorted_pairs(dataset.positives()), vec![(1, 2), (3, 4)]);
        assert_eq!(
            sorted_pairs(dataset.negatives().unwrap()),
            vec![(5, 6)]
        );
    }

    #[test]
    fn zero_negative_records_leave_negatives_absent() {
        let dataset = Dataset::from_lines(["1\t2", "3\t4\t1"]).unwrap();
        assert!(dataset.negatives().is_none());

        let explicit_empty = Dataset::from_pairs(vec![(1, 2)], Some(Vec::new()));
        assert!(explicit_empty.negatives().is_some());
        assert_eq!(explicit_empty.negative_count(), 0);
    }

    #[test]
    fn rejects_non_integer_fields_naming_the_line() {
        let err = Dataset::from_lines(["1\t2", "x\t4"]).unwrap_err();
        match err {
            PipelineError::Parse { line, content, reason } => {
                assert_eq!(line, 2);
                assert_eq!(content, "x\t4");
                assert!(reason.contains("'x'"), "unexpected reason: {reason}");
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_labels() {
        let err = Dataset::from_lines(["1\t2\t2"]).unwrap_err();
        assert!(err.to_string().contains("'2'"), "unexpected error: {err}");
    }

    #[test]
    fn rejects_wrong_field_counts() {
        assert!(Dataset::from_lines(["1"]).is_err());
        assert!(Dataset::from_lines(["1\t2\t1\t9"]).is_err());
        assert!(Dataset::from_lines([""]).is_err());
    }

    #[test]
    fn split_preserves_pair_multisets_and_ratio() {
        let positive: Vec<(NodeId, NodeId)> = (0..10).map(|i| (i, i + 100)).collect();
        let negative: Vec<(NodeId, NodeId)> = (0..4).map(|i| (i, i + 200)).collect();
        let dataset = Dataset::from_pairs(positive, Some(negative));

        let mut rng = StdRng::seed_from_u64(11);
        let (training, testing) = dataset.split(0.5, &mut rng).unwrap();

        assert_eq!(training.positive_count(), 5);
        assert_eq!(testing.positive_count(), 5);
        assert_eq!(training.negative_count(), 2);
        assert_eq!(testing.negative_count(), 2);

        let mut recombined = sorted_pairs(training.positives());
        recombined.extend(sorted_pairs(testing.positives()));
        recombined.sort_unstable();
        assert_eq!(recombined, sorted_pairs(dataset.positives()));

        let mut recombined_negatives = sorted_pairs(training.negatives().unwrap());
        recombined_negatives.extend(sorted_pairs(testing.negatives().unwrap()));
        recombined_negatives.sort_unstable();
        assert_eq!(
            recombined_negatives,
            sorted_pairs(dataset.negatives().unwrap())
        );
    }

    #[test]
    fn split_of_positive_only_dataset_keeps_negatives_absent() {
        let dataset = Dataset::from_pairs(vec![(1, 2), (3, 4), (5, 6)], None);
        let mut rng = StdRng::seed_from_u64(3);
        let (training, testing) = dataset.split(0.67, &mut rng).unwrap();
        assert!(training.negatives().is_none());
        assert!(testing.negatives().is_none());
        assert_eq!(training.positive_count() + testing.positive_count(), 3);
    }

    #[test]
    fn split_is_reproducible_under_a_seeded_rng() {
        let dataset =
            Dataset::from_pairs((0..20).map(|i| (i, i + 50)).collect(), None);
        let first = dataset.split(0.8, &mut StdRng::seed_from_u64(99)).unwrap();
        let second = dataset.split(0.8, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn split_rejects_out_of_range_fractions() {
        let dataset = Dataset::from_pairs(vec![(1, 2)], None);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(dataset.split(1.5, &mut rng).is_err());
        assert!(dataset.split(-0.1, &mut rng).is_err());
        assert!(dataset.split(f64::NAN, &mut rng).is_err());
    }

    #[test]
    fn merge_concatenates_and_combines_negatives() {
        let with_negatives = Dataset::from_pairs(vec![(1, 2)], Some(vec![(3, 4)]));
        let without_negatives = Dataset::from_pairs(vec![(5, 6)], None);

        let merged = with_negatives.merge(&without_negatives);
        assert_eq!(merged.positive_count(), 2);
        assert_eq!(merged.negative_count(), 1);

        let merged = without_negatives.merge(&without_negatives);
        assert!(merged.negatives().is_none());
        assert_eq!(merged.positive_count(), 2);
    }

    #[test]
    fn source_maps_group_targets_by_view() {
        let dataset = Dataset::from_pairs(
            vec![(1, 10), (1, 11), (2, 12)],
            Some(vec![(1, 20), (3, 21)]),
        );

        let positive = dataset.source_map(PairView::Positive);
        assert_eq!(positive[&1], HashSet::from([10, 11]));
        assert_eq!(positive[&2], HashSet::from([12]));
        assert!(!positive.contains_key(&3));

        let negative = dataset.source_map(PairView::Negative);
        assert_eq!(
            negative.keys().copied().collect::<HashSet<_>>(),
            HashSet::from([1, 3])
        );
        assert_eq!(negative[&1], HashSet::from([20]));

        let combined = dataset.source_map(PairView::Combined);
        assert_eq!(combined[&1], HashSet::from([10, 11, 20]));
    }

    #[test]
    fn negative_source_map_is_empty_when_negatives_are_absent() {
        let dataset = Dataset::from_pairs(vec![(1, 2)], None);
        assert!(dataset.source_map(PairView::Negative).is_empty());
    }

    #[test]
    fn instance_keys_render_source_space_target() {
        let dataset = Dataset::from_pairs(vec![(7, 8)], Some(vec![(9, 10)]));
        assert_eq!(
            dataset.positive_instances_as_strings(),
            HashSet::from(["7 8".to_string()])
        );
        assert_eq!(
            dataset.negative_instances_as_strings(),
            HashSet::from(["9 10".to_string()])
        );
    }

    #[test]
    fn tsv_round_trip_preserves_labeled_pairs() {
        let with_negatives = Dataset::from_pairs(
            vec![(1, 2), (3, 4)],
            Some(vec![(5, 6)]),
        );
        let reloaded = Dataset::from_lines(with_negatives.to_tsv_string().lines()).unwrap();
        assert_eq!(labeled_pairs(&reloaded), labeled_pairs(&with_negatives));

        let positive_only = Dataset::from_pairs(vec![(1, 2), (3, 4)], None);
        let rendered = positive_only.to_tsv_string();
        assert!(rendered.lines().all(|line| line.split(FIELD_DELIMITER).count() == 2));
        let reloaded = Dataset::from_lines(rendered.lines()).unwrap();
        assert_eq!(labeled_pairs(&reloaded), labeled_pairs(&positive_only));
        assert!(reloaded.negatives().is_none());
    }

    #[test]
    fn all_sources_and_targets_union_both_labels() {
        let dataset = Dataset::from_pairs(vec![(1, 10)], Some(vec![(2, 20)]));
        assert_eq!(dataset.all_sources(), HashSet::from([1, 2]));
        assert_eq!(dataset.all_targets(), HashSet::from([10, 20]));
    }

    #[test]
    fn pair_columns_reject_length_mismatches() {
        let err = PairColumns::new(vec![1, 2], vec![3]).unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(_)));
    }
}
