use std::cmp::{max, min};

use sha2::{Digest, Sha256};

use crate::simple_merkle::tree::MerkleHash;

/// Size in bytes of the digest produced by the default [`NamespacedSha2Hasher`].
pub const HASH_LEN: usize = 32;

/// Prepended to a leaf's bytes before hashing. Part of the wire format.
pub const LEAF_DOMAIN_SEPARATOR: [u8; 1] = [0u8];
/// Prepended to a pair of child nodes before hashing. Part of the wire format.
pub const INTERNAL_NODE_DOMAIN_SEPARATOR: [u8; 1] = [1u8];

/// A fixed-length namespace identifier, ordered lexicographically.
#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Copy, Clone, Hash)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshSerialize, borsh::BorshDeserialize)
)]
pub struct NamespaceId<const NS_ID_SIZE: usize>(pub [u8; NS_ID_SIZE]);

impl<const NS_ID_SIZE: usize> NamespaceId<NS_ID_SIZE> {
    /// The all-zeroes namespace, used as the min and max of the empty root.
    pub const ZERO: Self = Self([0u8; NS_ID_SIZE]);

    /// The maximum possible namespace, reserved as a parity marker by hashers
    /// which ignore it. See [`NamespaceMerkleHasher::ignores_max_ns`].
    pub const MAX_ID: Self = Self([0xff; NS_ID_SIZE]);
}

impl<const NS_ID_SIZE: usize> Default for NamespaceId<NS_ID_SIZE> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<const NS_ID_SIZE: usize> AsRef<[u8]> for NamespaceId<NS_ID_SIZE> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// A byte slice of the wrong length was provided as a namespace id.
#[derive(Debug, PartialEq, Eq, Copy, Clone, thiserror::Error)]
#[error("invalid namespace id")]
pub struct InvalidNamespace;

impl<const NS_ID_SIZE: usize> TryFrom<&[u8]> for NamespaceId<NS_ID_SIZE> {
    type Error = InvalidNamespace;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != NS_ID_SIZE {
            return Err(InvalidNamespace);
        }
        let mut out = [0u8; NS_ID_SIZE];
        out.copy_from_slice(value);
        Ok(Self(out))
    }
}

#[cfg(feature = "serde")]
impl<const NS_ID_SIZE: usize> serde::Serialize for NamespaceId<NS_ID_SIZE> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de, const NS_ID_SIZE: usize> serde::Deserialize<'de> for NamespaceId<NS_ID_SIZE> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct BytesVisitor<const NS_ID_SIZE: usize>;

        impl<'de, const NS_ID_SIZE: usize> serde::de::Visitor<'de> for BytesVisitor<NS_ID_SIZE> {
            type Value = NamespaceId<NS_ID_SIZE>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "{NS_ID_SIZE} bytes")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                NamespaceId::try_from(v).map_err(|_| E::invalid_length(v.len(), &self))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut out = [0u8; NS_ID_SIZE];
                for (idx, byte) in out.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(idx, &self))?;
                }
                if seq.next_element::<u8>()?.is_some() {
                    return Err(serde::de::Error::invalid_length(NS_ID_SIZE + 1, &self));
                }
                Ok(NamespaceId(out))
            }
        }

        deserializer.deserialize_bytes(BytesVisitor)
    }
}

/// An error that can occur when appending a leaf to a namespaced tree.
#[derive(Debug, PartialEq, Eq, Copy, Clone, thiserror::Error)]
pub enum PushError {
    /// The leaf bytes are too short to contain a namespace of the configured size.
    #[error("leaf must begin with a namespace id of the configured size")]
    MismatchedNamespaceSize,
    /// The leaf's namespace is smaller than the namespace of the last leaf in the tree.
    #[error("leaves must be pushed in non-decreasing namespace order")]
    InvalidPushOrder,
}

impl From<InvalidNamespace> for PushError {
    fn from(_: InvalidNamespace) -> Self {
        Self::MismatchedNamespaceSize
    }
}

/// The hash of a node in a namespaced merkle tree: the minimum and maximum
/// namespace of the node's subtree, followed by the digest.
///
/// For a leaf, the min and max namespace are both the leaf's namespace.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshSerialize, borsh::BorshDeserialize)
)]
pub struct NamespacedHash<const NS_ID_SIZE: usize> {
    min_ns: NamespaceId<NS_ID_SIZE>,
    max_ns: NamespaceId<NS_ID_SIZE>,
    hash: [u8; HASH_LEN],
}

impl<const NS_ID_SIZE: usize> Default for NamespacedHash<NS_ID_SIZE> {
    fn default() -> Self {
        Self::EMPTY_ROOT
    }
}

impl<const NS_ID_SIZE: usize> NamespacedHash<NS_ID_SIZE> {
    /// The root of the empty tree: zero namespaces and an all-zero digest.
    /// This is a convention, not the hash of any input.
    pub const EMPTY_ROOT: Self = Self {
        min_ns: NamespaceId::ZERO,
        max_ns: NamespaceId::ZERO,
        hash: [0u8; HASH_LEN],
    };

    /// Construct a hash with the given namespace range and an all-zero digest.
    pub fn with_min_and_max_ns(
        min_ns: NamespaceId<NS_ID_SIZE>,
        max_ns: NamespaceId<NS_ID_SIZE>,
    ) -> Self {
        Self {
            min_ns,
            max_ns,
            hash: [0u8; HASH_LEN],
        }
    }

    /// The smallest namespace in the subtree under this hash.
    pub fn min_namespace(&self) -> NamespaceId<NS_ID_SIZE> {
        self.min_ns
    }

    /// The largest namespace in the subtree under this hash.
    pub fn max_namespace(&self) -> NamespaceId<NS_ID_SIZE> {
        self.max_ns
    }

    /// The raw digest, without the namespace annotations.
    pub fn hash(&self) -> [u8; HASH_LEN] {
        self.hash
    }

    fn set_hash(&mut self, hash: &[u8]) {
        self.hash.copy_from_slice(hash)
    }

    /// Returns the root of the empty tree.
    pub fn empty() -> Self {
        Self::EMPTY_ROOT
    }

    pub fn is_empty_root(&self) -> bool {
        self == &Self::EMPTY_ROOT
    }

    /// Whether the namespace falls inside this node's namespace range.
    /// Always false on the empty root, which covers no namespaces.
    pub fn contains(&self, namespace: NamespaceId<NS_ID_SIZE>) -> bool {
        self.min_namespace() <= namespace
            && self.max_namespace() >= namespace
            && !self.is_empty_root()
    }
}

/// A [`MerkleHash`] which annotates nodes with the namespace range of their subtree.
pub trait NamespaceMerkleHasher<const NS_ID_SIZE: usize>:
    MerkleHash<Output = NamespacedHash<NS_ID_SIZE>>
{
    /// Create an instance of the hasher, choosing whether the maximum namespace
    /// is treated as a marker value and excluded from namespace ranges.
    fn with_ignore_max_ns(ignore_max_ns: bool) -> Self;

    /// Whether the hasher excludes the maximum namespace from namespace ranges.
    fn ignores_max_ns(&self) -> bool;

    /// Hash a leaf whose payload and namespace are provided separately.
    fn hash_leaf_with_namespace(
        &self,
        data: &[u8],
        namespace: NamespaceId<NS_ID_SIZE>,
    ) -> Self::Output;
}

/// A sha2-256 namespaced hasher.
///
/// Leaves hash as `sha256(0x00 || namespace || payload)`, inner nodes as
/// `sha256(0x01 || left || right)` where each child is fed in full, namespace
/// annotations included, so the root commits to every namespace range.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NamespacedSha2Hasher<const NS_ID_SIZE: usize> {
    ignore_max_ns: bool,
}

impl<const NS_ID_SIZE: usize> Default for NamespacedSha2Hasher<NS_ID_SIZE> {
    fn default() -> Self {
        Self {
            ignore_max_ns: true,
        }
    }
}

impl<const NS_ID_SIZE: usize> NamespaceMerkleHasher<NS_ID_SIZE>
    for NamespacedSha2Hasher<NS_ID_SIZE>
{
    fn with_ignore_max_ns(ignore_max_ns: bool) -> Self {
        Self { ignore_max_ns }
    }

    fn ignores_max_ns(&self) -> bool {
        self.ignore_max_ns
    }

    fn hash_leaf_with_namespace(
        &self,
        data: &[u8],
        namespace: NamespaceId<NS_ID_SIZE>,
    ) -> Self::Output {
        let mut output = NamespacedHash::with_min_and_max_ns(namespace, namespace);
        let mut hasher = Sha256::new_with_prefix(LEAF_DOMAIN_SEPARATOR);
        hasher.update(namespace.as_ref());
        hasher.update(data);
        output.set_hash(hasher.finalize().as_ref());
        output
    }
}

impl<const NS_ID_SIZE: usize> MerkleHash for NamespacedSha2Hasher<NS_ID_SIZE> {
    type Output = NamespacedHash<NS_ID_SIZE>;

    const EMPTY_ROOT: Self::Output = NamespacedHash::EMPTY_ROOT;

    fn hash_leaf(&self, data: &[u8]) -> Self::Output {
        // Precondition: the leaf begins with a full namespace
        let mut ns_bytes = [0u8; NS_ID_SIZE];
        ns_bytes.copy_from_slice(&data[..NS_ID_SIZE]);
        let namespace = NamespaceId(ns_bytes);

        let mut output = NamespacedHash::with_min_and_max_ns(namespace, namespace);
        let mut hasher = Sha256::new_with_prefix(LEAF_DOMAIN_SEPARATOR);
        hasher.update(data);
        output.set_hash(hasher.finalize().as_ref());
        output
    }

    fn hash_nodes(&self, left: &Self::Output, right: &Self::Output) -> Self::Output {
        if left.max_namespace() > right.min_namespace() {
            panic!("invalid nodes: left max namespace must be <= right min namespace")
        }

        let min_ns = min(left.min_namespace(), right.min_namespace());
        let max_ns = if self.ignore_max_ns && left.min_namespace() == NamespaceId::MAX_ID {
            NamespaceId::MAX_ID
        } else if self.ignore_max_ns && right.min_namespace() == NamespaceId::MAX_ID {
            left.max_namespace()
        } else {
            max(left.max_namespace(), right.max_namespace())
        };

        let mut output = NamespacedHash::with_min_and_max_ns(min_ns, max_ns);
        let mut hasher = Sha256::new_with_prefix(INTERNAL_NODE_DOMAIN_SEPARATOR);
        for child in [left, right] {
            hasher.update(child.min_namespace());
            hasher.update(child.max_namespace());
            hasher.update(child.hash());
        }
        output.set_hash(hasher.finalize().as_ref());
        output
    }
}
