//! Packing of an ordered pair of vocabulary ids into a single `u64` key.
//!
//! The left id occupies the high 32 bits and the right id the low 32 bits,
//! so every pair maps to a distinct key and decoding is exact.

/// Encode the ordered pair `(left, right)`.
#[inline]
pub fn encode(left: u32, right: u32) -> u64 {
    (u64::from(left) << 32) | u64::from(right)
}

/// Inverse of [`encode`].
#[inline]
pub fn decode(key: u64) -> (u32, u32) {
    ((key >> 32) as u32, key as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_extremes() {
        let ids = [0, 1, 2, 0x7fff_ffff, 0x8000_0000, 0xdead_beef, u32::MAX - 1, u32::MAX];
        for &l in &ids {
            for &r in &ids {
                assert_eq!(decode(encode(l, r)), (l, r));
            }
        }
    }

    #[test]
    fn order_matters() {
        assert_ne!(encode(1, 2), encode(2, 1));
        assert_eq!(encode(0, 0), 0);
        assert_eq!(encode(u32::MAX, u32::MAX), u64::MAX);
    }

    #[test]
    fn round_trip_pseudo_random() {
        let mut x = 0x2545_f491_4f6c_dd1du64;
        for _ in 0..100_000 {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            let (l, r) = ((x >> 32) as u32, x as u32);
            assert_eq!(decode(encode(l, r)), (l, r));
        }
    }
}
