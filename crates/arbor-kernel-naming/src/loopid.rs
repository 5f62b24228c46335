//! Stable loop identifiers.
//!
//! A loop id hashes a cyclic sequence of sketch entity ids so that any
//! rotation of the same closed walk yields the same id: the sequence is
//! rotated to its lexicographically minimal rotation, then hashed with
//! FNV-1a (stable across platforms and runs, unlike the std hasher).

use arbor_kernel_sketch::SketchEntityId;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Compute the rotation-invariant id of a closed entity walk.
pub fn compute_loop_id(entities: &[SketchEntityId]) -> u64 {
    if entities.is_empty() {
        return FNV_OFFSET;
    }
    let ids: Vec<u32> = entities.iter().map(|e| e.0).collect();
    let start = minimal_rotation(&ids);
    let mut hash = FNV_OFFSET;
    for k in 0..ids.len() {
        let id = ids[(start + k) % ids.len()];
        for byte in id.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// Index of the lexicographically minimal rotation (Booth-style scan).
fn minimal_rotation(ids: &[u32]) -> usize {
    let n = ids.len();
    let mut best = 0;
    for candidate in 1..n {
        for k in 0..n {
            let a = ids[(candidate + k) % n];
            let b = ids[(best + k) % n];
            if a < b {
                best = candidate;
                break;
            }
            if a > b {
                break;
            }
        }
    }
    best
}
