use std::collections::HashMap;
use std::hash::Hash;

use super::tree::MerkleHash;
use crate::{NamespaceId, NamespaceMerkleHasher, NamespacedHash};

/// A node of a merkle tree.
#[derive(PartialEq, Clone, Debug)]
pub enum Node<H> {
    /// A leaf node, holding the raw leaf data.
    Leaf(Vec<u8>),
    /// An inner node, holding the hashes of its two children.
    Inner(H, H),
}

/// Read access to a store mapping hashes to their preimages.
pub trait PreimageReader<H> {
    /// Get the preimage of a given hash.
    fn get(&self, image: &H) -> Option<&Node<H>>;
}

/// Write access to a store mapping hashes to their preimages.
pub trait PreimageWriter<H> {
    /// Store the preimage of a given hash.
    fn put(&mut self, image: H, preimage: Node<H>);
}

/// Read and write access to a store mapping hashes to their preimages.
pub trait PreimageDb<H>: PreimageReader<H> + PreimageWriter<H> + Default {}

/// An in-memory preimage store. Trees that create proofs need one, since proof
/// construction walks the tree from the root down.
#[derive(Default)]
pub struct MemDb<H>(HashMap<H, Node<H>>);

impl<H: Eq + Hash> PreimageReader<H> for MemDb<H> {
    fn get(&self, image: &H) -> Option<&Node<H>> {
        self.0.get(image)
    }
}

impl<H: Eq + Hash> PreimageWriter<H> for MemDb<H> {
    fn put(&mut self, image: H, preimage: Node<H>) {
        self.0.insert(image, preimage);
    }
}

impl<H: Default + Eq + Hash> PreimageDb<H> for MemDb<H> {}

/// A preimage store that drops everything written to it. Suitable only for
/// trees that never create proofs, such as the throwaway trees built during
/// proof verification.
#[derive(Default)]
pub struct NoopDb;

impl<H> PreimageReader<H> for NoopDb {
    fn get(&self, _image: &H) -> Option<&Node<H>> {
        None
    }
}

impl<H> PreimageWriter<H> for NoopDb {
    fn put(&mut self, _image: H, _preimage: Node<H>) {}
}

impl<H: Default> PreimageDb<H> for NoopDb {}

/// The raw data of a leaf, together with its hash under some [`MerkleHash`]er.
#[derive(Clone)]
pub struct LeafWithHash<M: MerkleHash> {
    data: Vec<u8>,
    hash: M::Output,
}

impl<M: MerkleHash> LeafWithHash<M> {
    /// Construct a [`LeafWithHash`] by hashing the provided data.
    pub fn with_hasher(data: Vec<u8>, hasher: &M) -> Self {
        let hash = hasher.hash_leaf(&data);
        Self { data, hash }
    }

    /// The raw leaf data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The hash of the leaf.
    pub fn hash(&self) -> &M::Output {
        &self.hash
    }
}

impl<M, const NS_ID_SIZE: usize> LeafWithHash<M>
where
    M: NamespaceMerkleHasher<NS_ID_SIZE, Output = NamespacedHash<NS_ID_SIZE>>,
{
    /// Construct a leaf under the provided namespace. Only available if the
    /// hasher supports namespacing.
    pub fn new_with_namespace(
        data: Vec<u8>,
        namespace: NamespaceId<NS_ID_SIZE>,
        ignore_max_ns: bool,
    ) -> Self {
        let hasher = M::with_ignore_max_ns(ignore_max_ns);
        let hash = hasher.hash_leaf_with_namespace(&data, namespace);
        Self { data, hash }
    }
}
