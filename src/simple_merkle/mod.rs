//! A simple [RFC 6962](https://www.rfc-editor.org/rfc/rfc6962#section-2.1)
//! compatible merkle tree over an in-memory store mapping hashes to preimages.

/// Traits and types for storing hashes and preimages.
pub mod db;
/// Errors that can arise during proof verification.
pub mod error;
/// Proofs over contiguous leaf ranges.
pub mod proof;
/// The merkle tree itself.
pub mod tree;
/// Utilities for computing facts about trees from proofs.
pub mod utils;
