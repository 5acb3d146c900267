/// An error that occurred while checking a claimed range proof for a merkle tree.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum RangeProofError {
    /// The tree is not empty, but no leaves were provided. Even proofs of absence
    /// must pin down a leaf.
    #[error("proof must cover at least one leaf")]
    NoLeavesProvided,
    /// The number of leaves provided does not match the claimed size of the range.
    #[error("number of leaves does not match the claimed range")]
    WrongAmountOfLeavesProvided,
    /// The claimed proof does not reconstruct the provided root.
    #[error("proof does not reconstruct the root")]
    InvalidRoot,
    /// The claimed range left out a leaf.
    #[error("range is missing a leaf")]
    MissingLeaf,
    /// The proof is missing a sibling node needed for verification.
    #[error("proof is missing a sibling node")]
    MissingProofNode,
    /// A claimed leaf is not present in the tree.
    #[error("tree does not contain the claimed leaf")]
    TreeDoesNotContainLeaf,
    /// The claimed tree exceeds the maximum supported size of 2^32 leaves.
    #[error("tree exceeds the maximum supported size")]
    TreeTooLarge,
    /// The tree is not ordered by namespace.
    #[error("tree nodes are not ordered by namespace")]
    MalformedTree,
    /// The proof is structurally invalid.
    #[error("malformed proof: {0}")]
    MalformedProof(&'static str),
}
