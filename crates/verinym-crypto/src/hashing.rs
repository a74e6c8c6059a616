/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Compute the Merkle root of a list of hashes.
/// Returns the single root hash. If the input is empty, returns a zero hash.
/// If the input has one element, returns that element.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return [0u8; 32];
    }
    if hashes.len() == 1 {
        return hashes[0];
    }

    let mut current_level: Vec<Hash> = hashes.to_vec();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));
        for chunk in current_level.chunks(2) {
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            let mut combined = Vec::with_capacity(64);
            combined.extend_from_slice(&chunk[0]);
            combined.extend_from_slice(right);
            next_level.push(hash(&combined));
        }
        current_level = next_level;
    }

    current_level[0]
}

/// One step of a Merkle inclusion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleStep {
    /// Sibling hash at this level.
    pub sibling: Hash,
    /// True when the sibling sits to the right of the running hash.
    pub sibling_is_right: bool,
}

/// Inclusion path for `hashes[index]` under `merkle_root(hashes)`.
/// Returns `None` when `index` is out of bounds.
pub fn merkle_path(hashes: &[Hash], index: usize) -> Option<Vec<MerkleStep>> {
    if index >= hashes.len() {
        return None;
    }
    let mut path = Vec::new();
    let mut position = index;
    let mut current_level: Vec<Hash> = hashes.to_vec();

    while current_level.len() > 1 {
        let sibling_index = position ^ 1;
        let sibling = current_level
            .get(sibling_index)
            .copied()
            .unwrap_or(current_level[position]);
        path.push(MerkleStep {
            sibling,
            sibling_is_right: position % 2 == 0,
        });

        let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));
        for chunk in current_level.chunks(2) {
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            let mut combined = Vec::with_capacity(64);
            combined.extend_from_slice(&chunk[0]);
            combined.extend_from_slice(right);
            next_level.push(hash(&combined));
        }
        current_level = next_level;
        position /= 2;
    }

    Some(path)
}

/// Fold an inclusion path from `leaf` and compare with `root`.
pub fn verify_merkle_path(leaf: &Hash, path: &[MerkleStep], root: &Hash) -> bool {
    let mut running = *leaf;
    for step in path {
        let mut combined = Vec::with_capacity(64);
        if step.sibling_is_right {
            combined.extend_from_slice(&running);
            combined.extend_from_slice(&step.sibling);
        } else {
            combined.extend_from_slice(&step.sibling);
            combined.extend_from_slice(&running);
        }
        running = hash(&combined);
    }
    running == *root
}
