//! Namespace proofs over the simple merkle tree: demonstrate that a range of
//! leaves is the complete set for a namespace, or that a namespace has no
//! leaves at all.

use std::mem;

use crate::namespaced_hash::{NamespaceId, NamespaceMerkleHasher, NamespacedHash};
use crate::simple_merkle::{
    db::NoopDb, error::RangeProofError, proof::Proof, utils::compute_num_left_siblings,
};
use crate::NamespaceMerkleTree;

/// A proof of some statement about the leaves of a namespace.
///
/// Either a presence proof covering the namespace's contiguous leaf range, or
/// an absence proof pinning down the leaf which occupies the position where the
/// namespace would have been.
#[derive(Debug, PartialEq, Clone)]
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
pub enum NamespaceProof<M, const NS_ID_SIZE: usize>
where
    M: NamespaceMerkleHasher<NS_ID_SIZE>,
{
    /// A proof that no leaf carries the target namespace.
    AbsenceProof {
        /// The range proof against the inner merkle tree.
        #[cfg_attr(
            feature = "borsh",
            borsh(bound(
                serialize = "M::Output: borsh::BorshSerialize",
                deserialize = "M::Output: borsh::BorshDeserialize"
            ))
        )]
        proof: Proof<M>,
        /// Whether the maximum namespace is treated as a marker value and
        /// excluded from namespace ranges.
        ignore_max_ns: bool,
        /// The hash of the first leaf whose namespace exceeds the target, if
        /// the target falls inside the namespace range covered by the root.
        leaf: Option<NamespacedHash<NS_ID_SIZE>>,
    },
    /// A proof that a range of leaves is included in the tree.
    PresenceProof {
        /// The range proof against the inner merkle tree.
        #[cfg_attr(
            feature = "borsh",
            borsh(bound(
                serialize = "M::Output: borsh::BorshSerialize",
                deserialize = "M::Output: borsh::BorshDeserialize"
            ))
        )]
        proof: Proof<M>,
        /// Whether the maximum namespace is treated as a marker value and
        /// excluded from namespace ranges.
        ignore_max_ns: bool,
    },
}

impl<M, const NS_ID_SIZE: usize> NamespaceProof<M, NS_ID_SIZE>
where
    M: NamespaceMerkleHasher<NS_ID_SIZE>,
{
    /// Verify that the provided *raw* leaves are the complete namespace. This
    /// may be a proof of presence or of absence.
    ///
    /// For presence proofs, `raw_leaves` must hold the payloads of every leaf
    /// in the namespace; for absence proofs it must be empty. The root's
    /// authenticated namespace range stands in for a proof whenever the
    /// namespace falls outside it.
    pub fn verify_complete_namespace(
        &self,
        root: &NamespacedHash<NS_ID_SIZE>,
        raw_leaves: &[impl AsRef<[u8]>],
        namespace: NamespaceId<NS_ID_SIZE>,
    ) -> Result<(), RangeProofError> {
        if self.is_of_presence() && raw_leaves.len() != self.range_len() {
            return Err(RangeProofError::WrongAmountOfLeavesProvided);
        }

        let tree = NamespaceMerkleTree::<NoopDb, M, NS_ID_SIZE>::with_hasher(
            M::with_ignore_max_ns(self.ignores_max_ns()),
        );
        tree.verify_namespace(root, raw_leaves, namespace, self)
    }

    /// Verify that the provided *raw* leaves are (1) present and (2) form a
    /// contiguous subrange of some namespace. Unlike
    /// [`Self::verify_complete_namespace`], leaves of the same namespace may
    /// exist outside the proven range.
    pub fn verify_range(
        &self,
        root: &NamespacedHash<NS_ID_SIZE>,
        raw_leaves: &[impl AsRef<[u8]>],
        leaf_namespace: NamespaceId<NS_ID_SIZE>,
    ) -> Result<(), RangeProofError> {
        if self.is_of_absence() {
            return Err(RangeProofError::MalformedProof(
                "cannot prove that a partial namespace is absent",
            ));
        }

        if raw_leaves.len() != self.range_len() {
            return Err(RangeProofError::WrongAmountOfLeavesProvided);
        }

        let hasher = M::with_ignore_max_ns(self.ignores_max_ns());
        let leaf_hashes: Vec<_> = raw_leaves
            .iter()
            .map(|data| hasher.hash_leaf_with_namespace(data.as_ref(), leaf_namespace))
            .collect();
        let tree = NamespaceMerkleTree::<NoopDb, M, NS_ID_SIZE>::with_hasher(hasher);
        tree.check_range_proof(root, &leaf_hashes, self.siblings(), self.start_idx() as usize)
            .map(|_| ())
    }

    /// Convert a proof of the presence of some leaf into a proof of the absence
    /// of a namespace, pinning the presently proven leaf as the witness.
    pub fn convert_to_absence_proof(&mut self, leaf: NamespacedHash<NS_ID_SIZE>) {
        match self {
            NamespaceProof::AbsenceProof { .. } => {}
            NamespaceProof::PresenceProof {
                proof,
                ignore_max_ns,
            } => {
                let pf = mem::take(proof);
                *self = Self::AbsenceProof {
                    proof: pf,
                    ignore_max_ns: *ignore_max_ns,
                    leaf: Some(leaf),
                }
            }
        }
    }

    fn merkle_proof(&self) -> &Proof<M> {
        match self {
            NamespaceProof::AbsenceProof { proof, .. }
            | NamespaceProof::PresenceProof { proof, .. } => proof,
        }
    }

    /// The sibling hashes provided as part of the proof.
    pub fn siblings(&self) -> &[NamespacedHash<NS_ID_SIZE>] {
        self.merkle_proof().siblings()
    }

    /// The index of the first leaf covered by the proof.
    pub fn start_idx(&self) -> u32 {
        self.merkle_proof().start_idx()
    }

    /// The index *after* the last leaf covered by the proof.
    pub fn end_idx(&self) -> u32 {
        self.merkle_proof().end_idx()
    }

    /// The number of leaves covered by the proof.
    pub fn range_len(&self) -> usize {
        self.merkle_proof().range_len()
    }

    /// The nearest sibling to the right of the proven range, if one exists.
    pub fn leftmost_right_sibling(&self) -> Option<&NamespacedHash<NS_ID_SIZE>> {
        let siblings = self.siblings();
        let num_left_siblings = compute_num_left_siblings(self.start_idx() as usize);
        if siblings.len() > num_left_siblings {
            return Some(&siblings[num_left_siblings]);
        }
        None
    }

    /// The nearest sibling to the left of the proven range, if one exists.
    pub fn rightmost_left_sibling(&self) -> Option<&NamespacedHash<NS_ID_SIZE>> {
        let siblings = self.siblings();
        let num_left_siblings = compute_num_left_siblings(self.start_idx() as usize);
        if num_left_siblings != 0 && num_left_siblings <= siblings.len() {
            return Some(&siblings[num_left_siblings - 1]);
        }
        None
    }

    pub(crate) fn ignores_max_ns(&self) -> bool {
        match self {
            Self::AbsenceProof { ignore_max_ns, .. }
            | Self::PresenceProof { ignore_max_ns, .. } => *ignore_max_ns,
        }
    }

    /// Returns true if the proof is an absence proof.
    pub fn is_of_absence(&self) -> bool {
        matches!(self, Self::AbsenceProof { .. })
    }

    /// Returns true if the proof is a presence proof.
    pub fn is_of_presence(&self) -> bool {
        !self.is_of_absence()
    }
}
