//! A namespaced merkle tree: an append-only, RFC 6962 shaped binary merkle
//! tree in which every leaf carries a fixed-size namespace id and every node
//! is annotated with the minimum and maximum namespace of its subtree.
//!
//! Leaves must be pushed in non-decreasing namespace order, which makes each
//! namespace a contiguous range of leaves. Given a root and a namespace, the
//! tree can then produce a proof that the returned leaves are the *complete*
//! set for that namespace, or that the namespace has no leaves at all.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::Range;

pub use nmt_proof::NamespaceProof;
use simple_merkle::{
    db::{LeafWithHash, MemDb, PreimageDb},
    error::RangeProofError,
    proof::Proof,
    tree::{MerkleHash, MerkleTree},
    utils::compute_num_left_siblings,
};

mod namespaced_hash;
pub use namespaced_hash::*;

pub mod nmt_proof;
pub mod simple_merkle;

/// A namespaced merkle tree using sha2-256 and an in-memory node store.
pub type DefaultNmt<const NS_ID_SIZE: usize> = NamespaceMerkleTree<
    MemDb<NamespacedHash<NS_ID_SIZE>>,
    NamespacedSha2Hasher<NS_ID_SIZE>,
    NS_ID_SIZE,
>;

/// Whether a namespaced range proof covers whole namespaces or cuts one short.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RangeProofType {
    /// A range proof over a single namespace is complete if it includes all the
    /// leaves in that namespace. A range proof over several namespaces is
    /// complete if all individual namespaces are complete.
    Complete,
    /// A range proof over a single namespace is partial if it omits at least one
    /// leaf from that namespace. A range proof over several namespaces is
    /// partial if it includes at least one partial namespace.
    ///
    /// Since ranges are contiguous, only the first or last namespace covered by
    /// a proof can be partial.
    Partial,
}

/// Classifies a namespaced range proof as complete or partial by inspecting the
/// namespaces of the siblings bordering the range.
fn check_proof_completeness<const NS_ID_SIZE: usize>(
    leaves: &[NamespacedHash<NS_ID_SIZE>],
    proof: &[NamespacedHash<NS_ID_SIZE>],
    num_left_siblings: usize,
) -> RangeProofType {
    let mut proof_type = RangeProofType::Complete;

    if num_left_siblings != 0 {
        let rightmost_left_sibling = &proof[num_left_siblings - 1];
        if rightmost_left_sibling.max_namespace() >= leaves[0].min_namespace() {
            proof_type = RangeProofType::Partial
        }
    }

    let num_right_siblings = proof.len() - num_left_siblings;
    if num_right_siblings != 0 {
        let leftmost_right_sibling = &proof[num_left_siblings];
        if leftmost_right_sibling.min_namespace()
            <= leaves
                .last()
                .expect("leaves has already been checked to be non-empty")
                .max_namespace()
        {
            proof_type = RangeProofType::Partial
        }
    }

    proof_type
}

/// An append-only merkle tree whose leaves are ordered by namespace, capable of
/// proving the presence or absence of entire namespaces.
pub struct NamespaceMerkleTree<Db, M: MerkleHash, const NS_ID_SIZE: usize> {
    namespace_ranges: HashMap<NamespaceId<NS_ID_SIZE>, Range<usize>>,
    highest_ns: NamespaceId<NS_ID_SIZE>,
    ignore_max_ns: bool,
    inner: MerkleTree<Db, M>,
}

impl<Db, M, const NS_ID_SIZE: usize> NamespaceMerkleTree<Db, M, NS_ID_SIZE>
where
    Db: PreimageDb<M::Output>,
    M: NamespaceMerkleHasher<NS_ID_SIZE>,
{
    /// Creates a new tree with the default hasher.
    pub fn new() -> Self
    where
        M: Default,
    {
        Self::default()
    }

    /// Creates a new tree with the given hasher.
    pub fn with_hasher(hasher: M) -> Self {
        Self {
            namespace_ranges: Default::default(),
            highest_ns: NamespaceId::ZERO,
            ignore_max_ns: hasher.ignores_max_ns(),
            inner: MerkleTree::with_hasher(hasher),
        }
    }

    /// Appends a leaf with the given payload and namespace. Leaves must be
    /// pushed in non-decreasing namespace order; the tree is unchanged when an
    /// error is returned.
    pub fn push_leaf(
        &mut self,
        raw_data: &[u8],
        namespace: NamespaceId<NS_ID_SIZE>,
    ) -> Result<(), PushError> {
        if namespace < self.highest_ns {
            return Err(PushError::InvalidPushOrder);
        }
        self.highest_ns = namespace;

        let leaf =
            LeafWithHash::new_with_namespace(raw_data.to_vec(), namespace, self.ignore_max_ns);
        self.inner.push_leaf_with_hash(leaf);

        let leaves_len = self.leaves().len();
        match self.namespace_ranges.entry(namespace) {
            Entry::Occupied(entry) => {
                entry.into_mut().end = leaves_len;
            }
            Entry::Vacant(entry) => {
                entry.insert(leaves_len - 1..leaves_len);
            }
        }
        Ok(())
    }

    /// Appends a leaf given as namespace-prefixed bytes: the first `NS_ID_SIZE`
    /// bytes are the namespace, the rest is the payload. Fails if the data is
    /// too short to contain a namespace.
    pub fn push_prefixed_leaf(&mut self, prefixed_data: &[u8]) -> Result<(), PushError> {
        let namespace = NamespaceId::try_from(
            prefixed_data
                .get(..NS_ID_SIZE)
                .ok_or(PushError::MismatchedNamespaceSize)?,
        )?;
        self.push_leaf(&prefixed_data[NS_ID_SIZE..], namespace)
    }

    /// Returns the root of the tree, computing it if necessary. Repeated
    /// queries return a cached result.
    pub fn root(&mut self) -> NamespacedHash<NS_ID_SIZE> {
        self.inner.root()
    }

    /// Checks a range proof against the tree's hasher, additionally classifying
    /// it as covering complete or partial namespaces.
    fn check_range_proof(
        &self,
        root: &NamespacedHash<NS_ID_SIZE>,
        leaves: &[NamespacedHash<NS_ID_SIZE>],
        proof: &[NamespacedHash<NS_ID_SIZE>],
        leaves_start_idx: usize,
    ) -> Result<RangeProofType, RangeProofError> {
        // The inner check doesn't recurse into subtrees smaller than 2, so
        // handle trees of size 0 and 1 up front
        match leaves.len() {
            0 => {
                if root == &NamespacedHash::EMPTY_ROOT && proof.is_empty() {
                    return Ok(RangeProofType::Complete);
                }
                return Err(RangeProofError::NoLeavesProvided);
            }
            1 => {
                if proof.is_empty() {
                    if &leaves[0] == root && leaves_start_idx == 0 {
                        return Ok(RangeProofType::Complete);
                    }
                    return Err(RangeProofError::TreeDoesNotContainLeaf);
                }
            }
            _ => {}
        };

        let num_left_siblings = compute_num_left_siblings(leaves_start_idx);
        if num_left_siblings > proof.len() {
            return Err(RangeProofError::MissingProofNode);
        }

        // Laid out in order, the left siblings, the leaves, and the right
        // siblings retrace the in-order traversal that produced the proof, so
        // their namespace ranges must be well-formed and non-decreasing. This
        // also guarantees the reconstruction below only hashes ordered pairs.
        let (left_siblings, right_siblings) = proof.split_at(num_left_siblings);
        let mut prev_max = NamespaceId::ZERO;
        for node in left_siblings
            .iter()
            .chain(leaves.iter())
            .chain(right_siblings.iter())
        {
            if node.min_namespace() > node.max_namespace() || node.min_namespace() < prev_max {
                return Err(RangeProofError::MalformedTree);
            }
            prev_max = node.max_namespace();
        }

        let proof_completeness = check_proof_completeness(leaves, proof, num_left_siblings);

        self.inner
            .check_range_proof(root, leaves, proof, leaves_start_idx)?;

        Ok(proof_completeness)
    }

    /// Creates a range proof providing the sibling hashes required to show that
    /// a set of values really does occur in the merkle tree at some half-open
    /// range of indices. Siblings are identified by an in-order traversal and
    /// returned in that same order. Panics if the range extends past the tree's
    /// leaf array.
    pub fn build_range_proof(&mut self, leaf_range: Range<usize>) -> Proof<M> {
        self.inner.build_range_proof(leaf_range)
    }

    /// Fetches the leaves in the requested range, along with a presence proof.
    pub fn get_range_with_proof(
        &mut self,
        leaf_range: Range<usize>,
    ) -> (Vec<Vec<u8>>, NamespaceProof<M, NS_ID_SIZE>) {
        let (leaves, proof) = self.inner.get_range_with_proof(leaf_range);
        (
            leaves,
            NamespaceProof::PresenceProof {
                proof,
                ignore_max_ns: self.ignore_max_ns,
            },
        )
    }

    /// Fetches the leaf at the given index, along with a proof of inclusion.
    pub fn get_index_with_proof(&mut self, idx: usize) -> (Vec<u8>, Proof<M>) {
        self.inner.get_index_with_proof(idx)
    }

    /// Fetches the leaves of the given namespace (possibly none), along with a
    /// proof that they are complete.
    pub fn get_namespace_with_proof(
        &mut self,
        namespace: NamespaceId<NS_ID_SIZE>,
    ) -> (Vec<Vec<u8>>, NamespaceProof<M, NS_ID_SIZE>) {
        let leaf_range = if let Some(range) = self.namespace_ranges.get(&namespace) {
            range.clone()
        } else {
            0..0
        };
        let leaves = self.inner.get_leaves(leaf_range);

        (leaves, self.get_namespace_proof(namespace))
    }

    /// Returns all leaves of the tree, together with their hashes.
    pub fn leaves(&self) -> &[LeafWithHash<M>] {
        self.inner.leaves()
    }

    /// Builds a proof that the given namespace is either present as a complete
    /// contiguous range of leaves, or absent from the tree.
    pub fn get_namespace_proof(
        &mut self,
        namespace: NamespaceId<NS_ID_SIZE>,
    ) -> NamespaceProof<M, NS_ID_SIZE> {
        // Namespaces outside the root's range need no proof: the root itself is
        // the evidence
        if !self.root().contains(namespace) {
            return NamespaceProof::AbsenceProof {
                proof: Default::default(),
                ignore_max_ns: self.ignore_max_ns,
                leaf: None,
            };
        }

        // If the namespace has leaves, prove its recorded range
        if let Some(leaf_range) = self.namespace_ranges.get(&namespace) {
            return NamespaceProof::PresenceProof {
                proof: self.inner.build_range_proof(leaf_range.clone()),
                ignore_max_ns: self.ignore_max_ns,
            };
        }

        // The namespace lies inside the root's range but has no leaves. Prove
        // the leaf occupying its insertion position: that leaf's namespace is
        // greater, and everything to its left is smaller, which pins the gap.
        let idx = self
            .inner
            .leaves()
            .partition_point(|l| l.hash().min_namespace() < namespace);
        let proof = self.build_range_proof(idx..idx + 1);

        let mut proof = NamespaceProof::PresenceProof {
            proof,
            ignore_max_ns: self.ignore_max_ns,
        };
        proof.convert_to_absence_proof(self.inner.leaves()[idx].hash().clone());
        proof
    }

    /// Verifies a namespace proof against a root. Dispatched to from
    /// [`NamespaceProof::verify_complete_namespace`].
    fn verify_namespace(
        &self,
        root: &NamespacedHash<NS_ID_SIZE>,
        raw_leaves: &[impl AsRef<[u8]>],
        namespace: NamespaceId<NS_ID_SIZE>,
        proof: &NamespaceProof<M, NS_ID_SIZE>,
    ) -> Result<(), RangeProofError> {
        if root.is_empty_root() && raw_leaves.is_empty() {
            return Ok(());
        }

        match proof {
            NamespaceProof::AbsenceProof { proof, leaf, .. } => {
                // The authenticated namespace range in the root already rules
                // the namespace out
                if !root.contains(namespace) {
                    return Ok(());
                }
                let leaf = leaf.as_ref().ok_or(RangeProofError::MalformedProof(
                    "an in-range absence proof must pin a witness leaf",
                ))?;
                if !raw_leaves.is_empty() {
                    return Err(RangeProofError::MalformedProof(
                        "an absence proof cannot vouch for leaves",
                    ));
                }
                // The witness must be a leaf-level hash which strictly follows
                // the missing namespace
                if leaf.min_namespace() != leaf.max_namespace() {
                    return Err(RangeProofError::MalformedProof(
                        "witness must be a leaf hash",
                    ));
                }
                if leaf.min_namespace() <= namespace {
                    return Err(RangeProofError::MalformedProof(
                        "witness leaf must follow the missing namespace",
                    ));
                }
                // Everything left of the witness must stay strictly below the
                // missing namespace
                if let Some(rightmost_left_sibling) = proof.rightmost_left_sibling() {
                    if rightmost_left_sibling.max_namespace() >= namespace {
                        return Err(RangeProofError::MalformedProof(
                            "leaves preceding the witness reach into the namespace",
                        ));
                    }
                }
                // Finally, check that the witness is real
                self.check_range_proof(
                    root,
                    &[leaf.clone()],
                    proof.siblings(),
                    proof.start_idx() as usize,
                )?;
            }
            NamespaceProof::PresenceProof { proof, .. } => {
                if !root.contains(namespace) {
                    return Err(RangeProofError::TreeDoesNotContainLeaf);
                }
                let hasher = M::with_ignore_max_ns(self.ignore_max_ns);
                let leaf_hashes: Vec<NamespacedHash<NS_ID_SIZE>> = raw_leaves
                    .iter()
                    .map(|data| hasher.hash_leaf_with_namespace(data.as_ref(), namespace))
                    .collect();
                if let RangeProofType::Partial = self.check_range_proof(
                    root,
                    &leaf_hashes,
                    proof.siblings(),
                    proof.start_idx() as usize,
                )? {
                    return Err(RangeProofError::MissingLeaf);
                }
            }
        }
        Ok(())
    }
}

impl<Db, M, const NS_ID_SIZE: usize> Default for NamespaceMerkleTree<Db, M, NS_ID_SIZE>
where
    Db: PreimageDb<M::Output>,
    M: NamespaceMerkleHasher<NS_ID_SIZE> + Default,
{
    fn default() -> Self {
        Self::with_hasher(M::default())
    }
}

#[cfg(test)]
mod tests {
    use sha2::{Digest, Sha256};

    use crate::{
        DefaultNmt, NamespaceId, NamespaceMerkleHasher, NamespaceProof, NamespacedHash,
        NamespacedSha2Hasher, PushError, RangeProofType, INTERNAL_NODE_DOMAIN_SEPARATOR,
        LEAF_DOMAIN_SEPARATOR,
    };

    /// Builds a tree with n leaves, one namespace per leaf
    fn tree_with_n_leaves(n: usize) -> DefaultNmt<8> {
        let mut tree = DefaultNmt::new();
        for x in 0..n as u64 {
            let namespace = NamespaceId((x + 1).to_be_bytes());
            tree.push_leaf(&x.to_be_bytes(), namespace).unwrap();
        }
        tree
    }

    /// Builds and checks proofs of the min and max namespaces, then adds a leaf
    /// in the max namespace and checks the max again.
    fn test_min_and_max_ns_against(tree: &mut DefaultNmt<8>) {
        let root = tree.root();
        let min_namespace = NamespaceId([0u8; 8]);
        let max_namespace = NamespaceId([0xffu8; 8]);

        let (leaves, proof) = tree.get_namespace_with_proof(min_namespace);
        assert!(proof
            .verify_complete_namespace(&root, &leaves, min_namespace)
            .is_ok());

        let (leaves, proof) = tree.get_namespace_with_proof(max_namespace);
        assert!(proof
            .verify_complete_namespace(&root, &leaves, max_namespace)
            .is_ok());

        tree.push_leaf(b"some_leaf", max_namespace)
            .expect("can always push max namespace");

        let root = tree.root();
        let (leaves, proof) = tree.get_namespace_with_proof(max_namespace);
        assert!(proof
            .verify_complete_namespace(&root, &leaves, max_namespace)
            .is_ok());
    }

    #[test]
    fn test_empty_tree_has_the_zero_root() {
        let mut tree = DefaultNmt::<3>::new();
        let root = tree.root();
        assert_eq!(root, NamespacedHash::EMPTY_ROOT);
        assert_eq!(root.min_namespace(), NamespaceId::ZERO);
        assert_eq!(root.max_namespace(), NamespaceId::ZERO);
        assert_eq!(hex::encode(root.hash()), "0".repeat(64));
    }

    #[test]
    fn test_root_vectors_for_tiny_trees() {
        let zero_ns = NamespaceId([0u8; 3]);
        let ones_ns = NamespaceId([1u8; 3]);

        let leaf_digest = |ns: NamespaceId<3>| -> [u8; 32] {
            let mut h = Sha256::new_with_prefix(LEAF_DOMAIN_SEPARATOR);
            h.update(ns);
            h.update(b"leaf1");
            h.finalize().into()
        };
        let node_digest = |children: [(NamespaceId<3>, [u8; 32]); 2]| -> [u8; 32] {
            let mut h = Sha256::new_with_prefix(INTERNAL_NODE_DOMAIN_SEPARATOR);
            for (ns, digest) in children {
                h.update(ns);
                h.update(ns);
                h.update(digest);
            }
            h.finalize().into()
        };

        // One leaf: the root is the leaf hash
        let mut tree = DefaultNmt::<3>::new();
        tree.push_leaf(b"leaf1", zero_ns).unwrap();
        let root = tree.root();
        assert_eq!(root.min_namespace(), zero_ns);
        assert_eq!(root.max_namespace(), zero_ns);
        assert_eq!(root.hash(), leaf_digest(zero_ns));

        // Two leaves in the same namespace
        let mut tree = DefaultNmt::<3>::new();
        tree.push_leaf(b"leaf1", zero_ns).unwrap();
        tree.push_leaf(b"leaf1", zero_ns).unwrap();
        let root = tree.root();
        assert_eq!(root.min_namespace(), zero_ns);
        assert_eq!(root.max_namespace(), zero_ns);
        assert_eq!(
            root.hash(),
            node_digest([(zero_ns, leaf_digest(zero_ns)), (zero_ns, leaf_digest(zero_ns))])
        );

        // Two leaves in different namespaces
        let mut tree = DefaultNmt::<3>::new();
        tree.push_leaf(b"leaf1", zero_ns).unwrap();
        tree.push_leaf(b"leaf1", ones_ns).unwrap();
        let root = tree.root();
        assert_eq!(root.min_namespace(), zero_ns);
        assert_eq!(root.max_namespace(), ones_ns);
        assert_eq!(
            root.hash(),
            node_digest([(zero_ns, leaf_digest(zero_ns)), (ones_ns, leaf_digest(ones_ns))])
        );
    }

    #[test]
    fn test_push_order_is_enforced() {
        let mut tree = DefaultNmt::<3>::new();
        let pushes: &[([u8; 3], Result<(), PushError>)] = &[
            ([0, 0, 0], Ok(())),
            ([0, 0, 0], Ok(())),
            ([0, 0, 1], Ok(())),
            ([0, 0, 0], Err(PushError::InvalidPushOrder)),
            ([0, 0, 1], Ok(())),
            ([1, 0, 0], Ok(())),
            ([0, 0, 1], Err(PushError::InvalidPushOrder)),
            ([0, 0, 0], Err(PushError::InvalidPushOrder)),
            ([0, 1, 0], Err(PushError::InvalidPushOrder)),
            ([1, 0, 0], Ok(())),
            ([1, 1, 0], Ok(())),
        ];
        for (namespace, expected) in pushes {
            assert_eq!(
                tree.push_leaf(b"dummy data", NamespaceId(*namespace)),
                *expected
            );
        }
    }

    #[test]
    fn test_failed_push_leaves_tree_unchanged() {
        let mut tree = DefaultNmt::<3>::new();
        tree.push_leaf(b"x", NamespaceId([0, 0, 0])).unwrap();
        tree.push_leaf(b"x", NamespaceId([0, 0, 1])).unwrap();
        let root = tree.root();

        assert_eq!(
            tree.push_leaf(b"x", NamespaceId([0, 0, 0])),
            Err(PushError::InvalidPushOrder)
        );
        assert_eq!(tree.leaves().len(), 2);
        assert_eq!(tree.root(), root);
    }

    #[test]
    fn test_prefixed_push_splits_namespace_and_payload() {
        let mut prefixed_tree = DefaultNmt::<3>::new();
        prefixed_tree.push_prefixed_leaf(b"\x00\x00\x01payload").unwrap();
        let mut plain_tree = DefaultNmt::<3>::new();
        plain_tree.push_leaf(b"payload", NamespaceId([0, 0, 1])).unwrap();
        assert_eq!(prefixed_tree.root(), plain_tree.root());

        // A leaf may be all namespace with an empty payload, but never shorter
        prefixed_tree.push_prefixed_leaf(&[0, 0, 2]).unwrap();
        assert_eq!(
            prefixed_tree.push_prefixed_leaf(&[0, 3]),
            Err(PushError::MismatchedNamespaceSize)
        );
        assert_eq!(prefixed_tree.leaves().len(), 2);
    }

    #[test]
    fn test_prove_namespace_ranges() {
        // (leaves, namespace to prove, start, end, found)
        let single_byte_cases: &[(&[&[u8]], &[u8; 1], u32, u32, bool)] = &[
            (&[b"0_data"], b"0", 0, 1, true),
            (&[b"0_data"], b"1", 0, 0, false),
            (&[b"0_data", b"1_data"], b"1", 1, 2, true),
            (&[b"0_data", b"0_data"], b"1", 0, 0, false),
            (&[b"0_data", b"0_data", b"1_data"], b"1", 2, 3, true),
        ];
        for (leaves, nid, start, end, found) in single_byte_cases {
            let mut tree = DefaultNmt::<1>::new();
            for leaf in *leaves {
                tree.push_prefixed_leaf(leaf).unwrap();
            }
            let root = tree.root();
            let namespace = NamespaceId(**nid);
            let (raw_leaves, proof) = tree.get_namespace_with_proof(namespace);
            assert_eq!(proof.start_idx(), *start);
            assert_eq!(proof.end_idx(), *end);
            assert_eq!(proof.is_of_presence(), *found);
            assert!(proof
                .verify_complete_namespace(&root, &raw_leaves, namespace)
                .is_ok());
        }

        let two_byte_cases: &[(&[&[u8]], &[u8; 2], u32, u32, bool)] = &[
            // Absent, but inside the root's namespace range: the proof pins the
            // leaf at the namespace's insertion position
            (&[b"00_data", b"00_data", b"11_data"], b"01", 2, 3, false),
            (
                &[b"00_data", b"00_data", b"11_data", b"11_data"],
                b"01",
                2,
                3,
                false,
            ),
            // Outside the root's namespace range: no proof is needed at all
            (
                &[b"01_data", b"01_data", b"01_data", b"11_data"],
                b"00",
                0,
                0,
                false,
            ),
            (
                &[b"00_data", b"00_data", b"01_data", b"01_data"],
                b"11",
                0,
                0,
                false,
            ),
        ];
        for (leaves, nid, start, end, found) in two_byte_cases {
            let mut tree = DefaultNmt::<2>::new();
            for leaf in *leaves {
                tree.push_prefixed_leaf(leaf).unwrap();
            }
            let root = tree.root();
            let namespace = NamespaceId(**nid);
            let (raw_leaves, proof) = tree.get_namespace_with_proof(namespace);
            assert_eq!(proof.start_idx(), *start);
            assert_eq!(proof.end_idx(), *end);
            assert_eq!(proof.is_of_presence(), *found);
            assert!(proof
                .verify_complete_namespace(&root, &raw_leaves, namespace)
                .is_ok());
        }
    }

    #[test]
    fn test_absence_proof_pins_the_following_leaf() {
        let mut tree = DefaultNmt::<2>::new();
        tree.push_prefixed_leaf(b"00_data").unwrap();
        tree.push_prefixed_leaf(b"00_data").unwrap();
        tree.push_prefixed_leaf(b"11_data").unwrap();
        let root = tree.root();

        let namespace = NamespaceId(*b"01");
        let (leaves, proof) = tree.get_namespace_with_proof(namespace);
        assert!(leaves.is_empty());
        assert!(proof.is_of_absence());
        assert_eq!(proof.start_idx(), 2);
        assert_eq!(proof.end_idx(), 3);
        match &proof {
            NamespaceProof::AbsenceProof {
                leaf: Some(leaf), ..
            } => {
                assert_eq!(leaf.min_namespace(), NamespaceId(*b"11"));
                assert_eq!(leaf.max_namespace(), NamespaceId(*b"11"));
            }
            _ => panic!("expected an absence proof with a witness leaf"),
        }
        assert!(proof
            .verify_complete_namespace(&root, &leaves, namespace)
            .is_ok());

        // An absence proof cannot claim leaves
        assert!(proof
            .verify_complete_namespace(&root, &[b"raw leaf"], namespace)
            .is_err());
        // Nor vouch for a namespace the tree does contain
        let present = NamespaceId(*b"00");
        assert!(proof
            .verify_complete_namespace(&root, &Vec::<Vec<u8>>::new(), present)
            .is_err());
        let witness_ns = NamespaceId(*b"11");
        assert!(proof
            .verify_complete_namespace(&root, &Vec::<Vec<u8>>::new(), witness_ns)
            .is_err());
    }

    #[test]
    fn test_out_of_range_namespace_needs_no_proof() {
        let mut tree = DefaultNmt::<2>::new();
        for _ in 0..4 {
            tree.push_prefixed_leaf(b"01_data").unwrap();
        }
        let root = tree.root();

        let namespace = NamespaceId(*b"00");
        let (leaves, proof) = tree.get_namespace_with_proof(namespace);
        assert!(leaves.is_empty());
        assert!(proof.is_of_absence());
        assert!(proof.siblings().is_empty());
        assert_eq!((proof.start_idx(), proof.end_idx()), (0, 0));
        assert!(proof
            .verify_complete_namespace(&root, &leaves, namespace)
            .is_ok());

        // The empty proof must not vouch for a namespace the root covers
        assert!(proof
            .verify_complete_namespace(&root, &leaves, NamespaceId(*b"01"))
            .is_err());
    }

    /// Builds a tree with n leaves, then creates and checks proofs of all valid
    /// ranges.
    fn test_range_proof_roundtrip_with_n_leaves(n: usize) {
        let mut tree = tree_with_n_leaves(n);
        let root = tree.root();
        for i in 1..=n {
            for j in 0..=i {
                let proof = tree.build_range_proof(j..i);
                let leaf_hashes: Vec<NamespacedHash<8>> =
                    tree.leaves()[j..i].iter().map(|l| l.hash().clone()).collect();
                let res = tree.check_range_proof(&root, &leaf_hashes, proof.siblings(), j);
                if i != j {
                    assert_eq!(res, Ok(RangeProofType::Complete));
                } else {
                    // Cannot prove the empty range
                    assert!(res.is_err())
                }
            }
        }
        test_min_and_max_ns_against(&mut tree)
    }

    #[test]
    fn test_range_proof_roundtrip() {
        for x in 0..20 {
            test_range_proof_roundtrip_with_n_leaves(x)
        }
    }

    #[test]
    fn test_completeness_check() {
        // Build a tree with 32 leaves spread evenly across 8 namespaces
        let mut tree = DefaultNmt::<8>::new();
        for x in 0..32u64 {
            let namespace = NamespaceId((x / 4).to_be_bytes());
            tree.push_leaf(&x.to_be_bytes(), namespace).unwrap();
        }
        let root = tree.root();
        let leaf_hashes: Vec<NamespacedHash<8>> =
            tree.leaves().iter().map(|x| x.hash().clone()).collect();

        // Check a range proof for every potential range of size four
        for i in 0..=28 {
            let leaf_range = i..i + 4;
            let proof = tree.build_range_proof(leaf_range.clone());
            let result = tree.check_range_proof(&root, &leaf_hashes[leaf_range], proof.siblings(), i);

            // Each namespace holds four leaves, so a range covers complete
            // namespaces if and only if it starts at a multiple of four
            if i % 4 == 0 {
                assert_eq!(result, Ok(RangeProofType::Complete))
            } else {
                assert_eq!(result, Ok(RangeProofType::Partial))
            }
        }

        // Complete-namespace proofs must verify for present and absent namespaces alike
        for nid in 0..100u64 {
            let namespace = NamespaceId(nid.to_be_bytes());
            let (leaves, proof) = tree.get_namespace_with_proof(namespace);
            assert!(proof
                .verify_complete_namespace(&root, &leaves, namespace)
                .is_ok());
        }
    }

    #[test]
    fn test_namespace_verification() {
        let mut tree = DefaultNmt::<8>::new();
        // Put a bunch of data in the tree, skipping some namespaces (including
        // the zero namespace)
        for x in 0..33u64 {
            let namespace = NamespaceId((((x / 5) * 3) + 1).to_be_bytes());
            tree.push_leaf(&x.to_be_bytes(), namespace).unwrap();
        }
        let root = tree.root();
        let raw_leaves: Vec<Vec<u8>> = tree.leaves().iter().map(|x| x.data().to_vec()).collect();

        // Build proofs for each namespace that is actually included, and check
        // that the range can be retrieved correctly
        for (namespace, range) in tree.namespace_ranges.clone().iter() {
            assert!(!range.is_empty());
            let proof = tree.build_range_proof(range.clone());
            let proof = NamespaceProof::PresenceProof {
                proof,
                ignore_max_ns: true,
            };
            assert!(tree
                .verify_namespace(&root, &raw_leaves[range.clone()], *namespace, &proof)
                .is_ok());
        }

        // Check proofs for a bunch of namespaces, present and absent
        for nid in 0..100u64 {
            let namespace = NamespaceId(nid.to_be_bytes());
            let (leaves, proof) = tree.get_namespace_with_proof(namespace);
            assert!(proof
                .verify_complete_namespace(&root, &leaves, namespace)
                .is_ok());
        }

        test_min_and_max_ns_against(&mut tree)
    }

    #[test]
    fn test_tampered_proofs_are_rejected() {
        let mut tree = tree_with_n_leaves(8);
        let root = tree.root();
        let namespace = NamespaceId(3u64.to_be_bytes());
        let (leaves, proof) = tree.get_namespace_with_proof(namespace);
        assert!(proof
            .verify_complete_namespace(&root, &leaves, namespace)
            .is_ok());

        // Corrupting a sibling hash must break verification
        let mut tampered = proof.clone();
        match &mut tampered {
            NamespaceProof::PresenceProof { proof, .. } => {
                let sibling = proof.siblings[0].clone();
                proof.siblings[0] = NamespacedHash::with_min_and_max_ns(
                    sibling.min_namespace(),
                    sibling.max_namespace(),
                );
            }
            _ => unreachable!("the namespace is present"),
        }
        assert!(tampered
            .verify_complete_namespace(&root, &leaves, namespace)
            .is_err());

        // Shifting the claimed range must break verification
        let mut tampered = proof.clone();
        match &mut tampered {
            NamespaceProof::PresenceProof { proof, .. } => {
                proof.range = proof.range.start + 1..proof.range.end + 1;
            }
            _ => unreachable!("the namespace is present"),
        }
        assert!(tampered
            .verify_complete_namespace(&root, &leaves, namespace)
            .is_err());

        // Substituting leaf data must break verification
        assert!(proof
            .verify_complete_namespace(&root, &[b"not the leaf"], namespace)
            .is_err());

        // As must claiming the leaves belong to a different namespace
        assert!(proof
            .verify_complete_namespace(&root, &leaves, NamespaceId(4u64.to_be_bytes()))
            .is_err());

        // The untampered proof still verifies
        assert!(proof
            .verify_complete_namespace(&root, &leaves, namespace)
            .is_ok());
    }

    #[test]
    fn test_subrange_proofs() {
        // Eight leaves in a single namespace; prove and verify a strict subrange
        let mut tree = DefaultNmt::<8>::new();
        let namespace = NamespaceId(5u64.to_be_bytes());
        for x in 0..8u64 {
            tree.push_leaf(&x.to_be_bytes(), namespace).unwrap();
        }
        let root = tree.root();

        let (leaves, proof) = tree.get_range_with_proof(2..5);
        assert!(proof.verify_range(&root, &leaves, namespace).is_ok());
        // A subrange is not a complete namespace
        assert!(proof
            .verify_complete_namespace(&root, &leaves, namespace)
            .is_err());

        // The single-leaf accessor agrees with the range proof machinery
        let (leaf, proof) = tree.get_index_with_proof(3);
        let hasher = NamespacedSha2Hasher::<8>::default();
        let leaf_hash = hasher.hash_leaf_with_namespace(&leaf, namespace);
        assert!(proof.verify_range(&root, &[leaf_hash]).is_ok());
    }

    #[test]
    fn test_verification_is_idempotent() {
        let mut tree = tree_with_n_leaves(7);
        let root = tree.root();
        let namespace = NamespaceId(2u64.to_be_bytes());
        let (leaves, proof) = tree.get_namespace_with_proof(namespace);
        let first = proof.verify_complete_namespace(&root, &leaves, namespace);
        let second = proof.verify_complete_namespace(&root, &leaves, namespace);
        assert_eq!(first, second);
        assert!(first.is_ok());
    }
}
