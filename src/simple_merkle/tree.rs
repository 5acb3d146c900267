use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Range;

use super::db::{LeafWithHash, Node, PreimageDb};
use super::error::RangeProofError;
use super::proof::Proof;
use super::utils::{compute_num_left_siblings, compute_tree_size};

/// A hasher usable for building a merkle tree.
pub trait MerkleHash {
    /// The digest type produced by this hasher.
    type Output: Debug + PartialEq + Eq + Clone + Default + Hash + Ord;

    /// The root of the empty tree.
    const EMPTY_ROOT: Self::Output;

    /// Hashes data as a leaf of the tree. This operation must be domain separated
    /// from [`Self::hash_nodes`].
    fn hash_leaf(&self, data: &[u8]) -> Self::Output;

    /// Hashes two child digests into their parent. This operation must be domain
    /// separated from [`Self::hash_leaf`].
    fn hash_nodes(&self, l: &Self::Output, r: &Self::Output) -> Self::Output;
}

/// An [RFC 6962](https://www.rfc-editor.org/rfc/rfc6962#section-2.1) compatible
/// merkle tree: the split point at every level is the largest power of two
/// strictly smaller than the number of leaves, so any leaf count yields a
/// unique shape.
pub struct MerkleTree<Db, M>
where
    M: MerkleHash,
{
    leaves: Vec<LeafWithHash<M>>,
    db: Db,
    root: Option<M::Output>,
    hasher: M,
}

impl<Db, M> Default for MerkleTree<Db, M>
where
    Db: PreimageDb<M::Output>,
    M: MerkleHash + Default,
{
    fn default() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<Db, M> MerkleTree<Db, M>
where
    Db: PreimageDb<M::Output>,
    M: MerkleHash + Default,
{
    /// Constructs an empty merkle tree with a default hasher.
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<Db, M> MerkleTree<Db, M>
where
    Db: PreimageDb<M::Output>,
    M: MerkleHash,
{
    /// Constructs an empty merkle tree with the given hasher.
    pub fn with_hasher(hasher: M) -> Self {
        Self {
            leaves: Vec::new(),
            db: Default::default(),
            root: Some(M::EMPTY_ROOT),
            hasher,
        }
    }

    /// Appends the given leaf to the tree.
    pub fn push_raw_leaf(&mut self, raw_leaf: &[u8]) {
        let leaf = LeafWithHash::with_hasher(raw_leaf.to_vec(), &self.hasher);
        self.push_leaf_with_hash(leaf);
    }

    /// Appends a pre-hashed leaf to the tree.
    pub fn push_leaf_with_hash(&mut self, leaf_with_hash: LeafWithHash<M>) {
        self.root = None;
        self.leaves.push(leaf_with_hash);
    }

    /// Returns the root of the tree, computing it if necessary. Repeated queries
    /// return a cached result.
    pub fn root(&mut self) -> M::Output {
        if let Some(inner) = &self.root {
            return inner.clone();
        }
        let inner = self.compute_root(0..self.leaves.len());
        self.root = Some(inner.clone());
        inner
    }

    /// Returns the requested range of leaves.
    pub fn get_leaves(&self, range: Range<usize>) -> Vec<Vec<u8>> {
        self.leaves[range]
            .iter()
            .map(|leaf| leaf.data().to_vec())
            .collect()
    }

    /// Returns all leaves in the tree.
    pub fn leaves(&self) -> &[LeafWithHash<M>] {
        &self.leaves[..]
    }

    fn compute_root(&mut self, leaf_range: Range<usize>) -> M::Output {
        match leaf_range.len() {
            0 => M::EMPTY_ROOT,
            1 => {
                let leaf_with_hash = &self.leaves[leaf_range.start];
                let root = leaf_with_hash.hash().clone();
                self.db
                    .put(root.clone(), Node::Leaf(leaf_with_hash.data().to_vec()));
                root
            }
            _ => {
                let split_point = next_smaller_po2(leaf_range.len()) + leaf_range.start;
                let left = self.compute_root(leaf_range.start..split_point);
                let right = self.compute_root(split_point..leaf_range.end);
                let root = self.hasher.hash_nodes(&left, &right);
                self.db.put(root.clone(), Node::Inner(left, right));
                root
            }
        }
    }

    /// Creates a range proof providing the sibling hashes required to show that a
    /// set of values really does occur in the merkle tree at some half-open range
    /// of indices. Siblings are identified by an in-order traversal and returned
    /// in that same order. Panics if the range extends past the tree's leaf array.
    ///
    /// Example: consider the following merkle tree with leaves [C, D, E, F]
    /// ```ascii
    ///          root
    ///        /      \
    ///       A        B
    ///      / \      /  \
    ///     C   D    E    F
    ///
    /// ```
    ///
    /// A range proof of `1..3` returns the vector [C, F], since those two hashes,
    /// together with the two leaves in the range, suffice to reconstruct the tree.
    pub fn build_range_proof(&mut self, leaf_range: Range<usize>) -> Proof<M> {
        // Calculating the root ensures the preimage db is populated
        let root = self.root();
        let start = leaf_range.start as u32;
        let end = leaf_range.end as u32;
        if leaf_range.end > self.leaves.len() {
            panic!(
                "index out of range: cannot access leaf {} in leaves array of size {}",
                leaf_range.end,
                self.leaves.len()
            )
        }

        let mut siblings = Vec::new();
        self.build_range_proof_inner(leaf_range, root, 0..self.leaves.len(), &mut siblings);
        Proof {
            siblings,
            range: start..end,
        }
    }

    fn build_range_proof_inner(
        &self,
        range_to_prove: Range<usize>,
        subtree_root: M::Output,
        subtree_range: Range<usize>,
        out: &mut Vec<M::Output>,
    ) {
        let Some(node) = self.db.get(&subtree_root) else {
            // Nodes outside the empty tree are never queried
            debug_assert_eq!(&subtree_root, &M::EMPTY_ROOT);
            out.push(subtree_root);
            return;
        };
        match node {
            Node::Leaf(_) => {
                if !range_to_prove.contains(&subtree_range.start) {
                    out.push(subtree_root.clone())
                }
            }
            Node::Inner(l, r) => {
                let split_point = next_smaller_po2(subtree_range.len()) + subtree_range.start;
                // If the range to prove doesn't overlap the left subtree, the left
                // subtree root becomes a sibling and we're done with that side
                if range_to_prove.start >= split_point {
                    out.push(l.clone())
                } else if range_to_prove.start > subtree_range.start
                    || range_to_prove.end < split_point
                {
                    // Recurse unless the range completely contains the left subtree
                    self.build_range_proof_inner(
                        range_to_prove.clone(),
                        l.clone(),
                        subtree_range.start..split_point,
                        out,
                    );
                }

                if range_to_prove.end <= split_point {
                    out.push(r.clone())
                } else if range_to_prove.start > split_point
                    || range_to_prove.end < subtree_range.end
                {
                    self.build_range_proof_inner(
                        range_to_prove,
                        r.clone(),
                        split_point..subtree_range.end,
                        out,
                    );
                }
            }
        }
    }

    /// Checks that a claimed range of leaf hashes, together with the proof's
    /// sibling hashes, reconstructs the provided root. The total size of the
    /// tree is recovered from the proof shape rather than transmitted.
    pub fn check_range_proof(
        &self,
        root: &M::Output,
        leaves: &[M::Output],
        proof: &[M::Output],
        leaves_start_idx: usize,
    ) -> Result<(), RangeProofError> {
        // The recursion doesn't descend into subtrees smaller than 2, so handle
        // trees of size 0 and 1 up front
        match leaves.len() {
            0 => {
                if root == &M::EMPTY_ROOT && proof.is_empty() {
                    return Ok(());
                }
                return Err(RangeProofError::NoLeavesProvided);
            }
            1 => {
                if proof.is_empty() {
                    if &leaves[0] == root && leaves_start_idx == 0 {
                        return Ok(());
                    }
                    return Err(RangeProofError::TreeDoesNotContainLeaf);
                }
            }
            _ => {}
        };

        let num_left_siblings = compute_num_left_siblings(leaves_start_idx);
        let num_right_siblings = proof
            .len()
            .checked_sub(num_left_siblings)
            .ok_or(RangeProofError::MissingProofNode)?;

        let tree_size = compute_tree_size(num_right_siblings, leaves_start_idx + leaves.len() - 1)?;

        let computed_root = self.check_range_proof_inner(
            &mut &leaves[..],
            &mut &proof[..],
            leaves_start_idx,
            tree_size,
            0,
        )?;
        if &computed_root == root {
            return Ok(());
        }
        Err(RangeProofError::InvalidRoot)
    }

    /// Reconstructs the root of a subtree of `subtree_size` leaves starting at
    /// `offset`, consuming leaves and sibling hashes from the back as it
    /// recurses right-to-left.
    fn check_range_proof_inner(
        &self,
        leaves: &mut &[M::Output],
        proof: &mut &[M::Output],
        leaves_start_idx: usize,
        subtree_size: usize,
        offset: usize,
    ) -> Result<M::Output, RangeProofError> {
        let split_point = next_smaller_po2(subtree_size);
        let leaves_end_idx = (leaves.len() + leaves_start_idx) - 1;

        let right = if leaves_end_idx >= split_point + offset {
            // The leaf range overlaps the right subtree
            let right_subtree_size = subtree_size - split_point;
            if right_subtree_size == 1 {
                take_last(leaves)
                    .ok_or(RangeProofError::MissingLeaf)?
                    .clone()
            } else {
                self.check_range_proof_inner(
                    leaves,
                    proof,
                    leaves_start_idx,
                    right_subtree_size,
                    offset + split_point,
                )?
            }
        } else {
            // Otherwise the right subtree root must be a proof sibling
            take_last(proof)
                .ok_or(RangeProofError::MissingProofNode)?
                .clone()
        };

        let left = if leaves_start_idx < split_point + offset {
            if split_point == 1 {
                take_last(leaves)
                    .ok_or(RangeProofError::MissingLeaf)?
                    .clone()
            } else {
                self.check_range_proof_inner(leaves, proof, leaves_start_idx, split_point, offset)?
            }
        } else {
            take_last(proof)
                .ok_or(RangeProofError::MissingProofNode)?
                .clone()
        };

        Ok(self.hasher.hash_nodes(&left, &right))
    }

    /// Fetches the requested range of leaves, along with a proof of correctness.
    pub fn get_range_with_proof(&mut self, leaf_range: Range<usize>) -> (Vec<Vec<u8>>, Proof<M>) {
        let leaves = self.get_leaves(leaf_range.clone());
        (leaves, self.build_range_proof(leaf_range))
    }

    /// Fetches the leaf at the given index, along with a proof of inclusion.
    pub fn get_index_with_proof(&mut self, idx: usize) -> (Vec<u8>, Proof<M>) {
        (
            self.leaves[idx].data().to_vec(),
            self.build_range_proof(idx..idx + 1),
        )
    }
}

/// Pops the last element off a shared slice, shrinking it in place.
fn take_last<'a, T>(slice: &mut &'a [T]) -> Option<&'a T> {
    let (last, rest) = slice.split_last()?;
    *slice = rest;
    Some(last)
}

/// The largest power of two strictly smaller than the argument.
pub fn next_smaller_po2(int: usize) -> usize {
    // The first power of two greater than or equal to the argument, halved
    int.next_power_of_two() >> 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_merkle::db::MemDb;
    use crate::{NamespaceId, NamespacedHash, NamespacedSha2Hasher};

    type Hasher = NamespacedSha2Hasher<8>;
    type Tree = MerkleTree<MemDb<NamespacedHash<8>>, Hasher>;

    fn tree_with_n_leaves(n: usize) -> Tree {
        let mut tree = Tree::new();
        for x in 0..n as u64 {
            let mut raw = x.to_be_bytes().to_vec();
            raw.extend_from_slice(b"leaf");
            tree.push_raw_leaf(&raw);
        }
        tree
    }

    #[test]
    fn root_is_cached_and_deterministic() {
        let mut tree = tree_with_n_leaves(9);
        let root = tree.root();
        assert_eq!(tree.root(), root);
        assert_eq!(tree_with_n_leaves(9).root(), root);
        assert_ne!(tree_with_n_leaves(10).root(), root);
    }

    #[test]
    fn split_point_is_next_smaller_power_of_two() {
        assert_eq!(next_smaller_po2(2), 1);
        assert_eq!(next_smaller_po2(3), 2);
        assert_eq!(next_smaller_po2(4), 2);
        assert_eq!(next_smaller_po2(5), 4);
        assert_eq!(next_smaller_po2(9), 8);
        assert_eq!(next_smaller_po2(16), 8);
    }

    #[test]
    fn unbalanced_root_splits_at_power_of_two() {
        // With 6 leaves the top-level split must be 4/2
        let mut tree = tree_with_n_leaves(6);
        let root = tree.root();

        let hasher = Hasher::default();
        let hashes: Vec<_> = tree.leaves().iter().map(|l| l.hash().clone()).collect();
        let left = hasher.hash_nodes(
            &hasher.hash_nodes(&hashes[0], &hashes[1]),
            &hasher.hash_nodes(&hashes[2], &hashes[3]),
        );
        let right = hasher.hash_nodes(&hashes[4], &hashes[5]);
        assert_eq!(root, hasher.hash_nodes(&left, &right));
    }

    #[test]
    fn single_leaf_root_is_the_leaf_hash() {
        let mut tree = tree_with_n_leaves(1);
        assert_eq!(&tree.root(), tree.leaves()[0].hash());
    }

    #[test]
    fn range_proof_against_sibling_layout() {
        let mut tree = tree_with_n_leaves(4);
        let root = tree.root();
        let proof = tree.build_range_proof(1..3);
        // Proving [D, E] in the doc example requires exactly [C, F]
        assert_eq!(proof.siblings().len(), 2);
        assert_eq!(proof.siblings()[0], tree.leaves()[0].hash().clone());
        assert_eq!(proof.siblings()[1], tree.leaves()[3].hash().clone());

        let leaf_hashes: Vec<_> = tree.leaves()[1..3].iter().map(|l| l.hash().clone()).collect();
        assert!(tree
            .check_range_proof(&root, &leaf_hashes, proof.siblings(), 1)
            .is_ok());
    }

    #[test]
    fn empty_tree_root_is_the_empty_root() {
        let mut tree = Tree::new();
        assert_eq!(tree.root(), NamespacedHash::EMPTY_ROOT);
        assert!(Tree::new()
            .check_range_proof(&NamespacedHash::EMPTY_ROOT, &[], &[], 0)
            .is_ok());
    }

    #[test]
    fn wrong_leaf_count_fails_verification() {
        let mut tree = tree_with_n_leaves(8);
        let root = tree.root();
        let proof = tree.build_range_proof(2..5);
        // Claim a narrower range than the proof covers
        let leaf_hashes: Vec<_> = tree.leaves()[2..4].iter().map(|l| l.hash().clone()).collect();
        assert!(tree
            .check_range_proof(&root, &leaf_hashes, proof.siblings(), 2)
            .is_err());
    }

    #[test]
    fn tampered_sibling_fails_verification() {
        let mut tree = tree_with_n_leaves(8);
        let root = tree.root();
        let proof = tree.build_range_proof(2..5);
        let leaf_hashes: Vec<_> = tree.leaves()[2..5].iter().map(|l| l.hash().clone()).collect();

        let mut siblings = proof.siblings().to_vec();
        siblings[0] = NamespacedHash::with_min_and_max_ns(
            NamespaceId([0; 8]),
            NamespaceId([0; 8]),
        );
        assert_eq!(
            tree.check_range_proof(&root, &leaf_hashes, &siblings, 2),
            Err(RangeProofError::InvalidRoot)
        );
    }
}
