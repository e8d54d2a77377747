/// Integer identifier of a graph node (its position in the graph's node
/// dictionary).
/// Examples: `0`, `4821`
pub type NodeId = u32;
/// Integer identifier of a graph edge label. Inverse labels are interned as
/// their own ids (`born_in` and `_born_in` are distinct edges).
/// Examples: `2`, `3`
pub type EdgeId = u32;
/// Textual encoding of a graph path pattern connecting two nodes.
/// Examples: `-works_at-based_in-`, `CONNECTED_BY:works_at`, `SOURCE:alice`
pub type Feature = String;
/// Classifier output for one instance; higher means more likely positive.
/// Examples: `0.0`, `2.75`
pub type Score = f64;
