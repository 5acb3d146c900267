use std::ops::Range;

use super::db::NoopDb;
use super::error::RangeProofError;
use super::tree::{MerkleHash, MerkleTree};
use super::utils::compute_num_left_siblings;

/// A proof that a contiguous range of leaves occurs in a merkle tree.
///
/// Holds the sibling hashes along the edges of the range, in left-to-right
/// depth-first order, together with the half-open range of leaf indices
/// being proven.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound(
        serialize = "M::Output: serde::Serialize",
        deserialize = "M::Output: serde::Deserialize<'de>"
    ))
)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshSerialize, borsh::BorshDeserialize)
)]
pub struct Proof<M: MerkleHash> {
    /// The sibling hashes needed to reconstruct the root from the range's leaves.
    #[cfg_attr(
        feature = "borsh",
        borsh(bound(
            serialize = "M::Output: borsh::BorshSerialize",
            deserialize = "M::Output: borsh::BorshDeserialize"
        ))
    )]
    pub siblings: Vec<M::Output>,
    /// The half-open range of leaf indices covered by the proof.
    pub range: Range<u32>,
}

impl<M: MerkleHash> Default for Proof<M> {
    fn default() -> Self {
        Self {
            siblings: Default::default(),
            range: Default::default(),
        }
    }
}

impl<M> Proof<M>
where
    M: MerkleHash + Default,
{
    /// Checks that the provided leaf hashes occupy this proof's range in the
    /// tree committed to by `root`.
    pub fn verify_range(
        &self,
        root: &M::Output,
        leaf_hashes: &[M::Output],
    ) -> Result<(), RangeProofError> {
        self.verify_range_with_hasher(root, leaf_hashes, M::default())
    }
}

impl<M> Proof<M>
where
    M: MerkleHash,
{
    /// Like [`Self::verify_range`], with an explicit hasher instance.
    pub fn verify_range_with_hasher(
        &self,
        root: &M::Output,
        leaf_hashes: &[M::Output],
        hasher: M,
    ) -> Result<(), RangeProofError> {
        if leaf_hashes.len() != self.range_len() {
            return Err(RangeProofError::WrongAmountOfLeavesProvided);
        }

        let tree = MerkleTree::<NoopDb, M>::with_hasher(hasher);
        tree.check_range_proof(root, leaf_hashes, self.siblings(), self.start_idx() as usize)
    }

    /// The sibling hashes carried by the proof.
    pub fn siblings(&self) -> &[M::Output] {
        &self.siblings
    }

    /// The index of the first leaf covered by the proof.
    pub fn start_idx(&self) -> u32 {
        self.range.start
    }

    /// The index *after* the last leaf covered by the proof.
    pub fn end_idx(&self) -> u32 {
        self.range.end
    }

    /// The number of leaves covered by the proof.
    pub fn range_len(&self) -> usize {
        self.range.end.saturating_sub(self.range.start) as usize
    }

    /// The nearest sibling to the right of the proven range, if one exists.
    pub fn leftmost_right_sibling(&self) -> Option<&M::Output> {
        let siblings = self.siblings();
        let num_left_siblings = compute_num_left_siblings(self.start_idx() as usize);
        if siblings.len() > num_left_siblings {
            return Some(&siblings[num_left_siblings]);
        }
        None
    }

    /// The nearest sibling to the left of the proven range, if one exists.
    pub fn rightmost_left_sibling(&self) -> Option<&M::Output> {
        let siblings = self.siblings();
        let num_left_siblings = compute_num_left_siblings(self.start_idx() as usize);
        if num_left_siblings != 0 && num_left_siblings <= siblings.len() {
            return Some(&siblings[num_left_siblings - 1]);
        }
        None
    }
}
