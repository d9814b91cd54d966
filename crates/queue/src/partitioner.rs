//! Key → partition mapping (FNV-1a, stable across processes and restarts).

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Partition of `key` among `partitions` (must be > 0).
#[must_use]
pub fn partition_for(key: &str, partitions: i32) -> i32 {
    let count = partitions.max(1).unsigned_abs();
    // `count` fits in i32, so the remainder does too.
    (fnv1a(key.as_bytes()) % count) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn same_key_same_partition() {
        for key in ["1", "42", "987654321"] {
            let p = partition_for(key, 4);
            assert!((0..4).contains(&p));
            assert_eq!(p, partition_for(key, 4));
        }
        assert_eq!(partition_for("anything", 1), 0);
    }
}
