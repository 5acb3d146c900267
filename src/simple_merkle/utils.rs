use super::error::RangeProofError;

/// Compute the number of left siblings an inclusion proof starting at the
/// provided leaf index must contain.
pub fn compute_num_left_siblings(node_idx: usize) -> usize {
    // One left sibling per set bit in the binary decomposition of the start index
    let mut num_left_siblings = 0;
    let mut start_idx = node_idx;
    while start_idx != 0 {
        if start_idx & 1 != 0 {
            num_left_siblings += 1;
        }
        start_idx >>= 1;
    }
    num_left_siblings
}

/// Reconstruct the total number of leaves in the tree from an inclusion proof.
///
/// Interprets the binary representation of a node's index as a path to the
/// node: a 1 bit in the (remaining) path turns right, a 0 turns left. Each
/// right sibling in the proof converts one left turn into a right turn, so the
/// index of the final node in the tree is the index of the last included leaf
/// with `num_right_siblings` zero bits promoted to ones.
pub fn compute_tree_size(
    num_right_siblings: usize,
    index_of_last_included_leaf: usize,
) -> Result<usize, RangeProofError> {
    let mut index_of_final_node = index_of_last_included_leaf;
    let mut mask = 1;
    let mut remaining_right_siblings = num_right_siblings;
    while remaining_right_siblings > 0 {
        if index_of_final_node & mask == 0 {
            index_of_final_node |= mask;
            remaining_right_siblings -= 1;
        }
        mask <<= 1;
        // The next iteration must not overflow on 32 bit platforms
        if index_of_final_node == u32::MAX as usize {
            return Err(RangeProofError::TreeTooLarge);
        }
    }
    Ok(index_of_final_node + 1)
}
