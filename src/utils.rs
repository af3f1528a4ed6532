/// Multiplier used by [`mix`], taken from the 64-bit FNV prime.
const MIX_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Magic multiplier for string hashing of array names.
pub const NAME_HASH_MAGIC: u64 = 39;

/// Combine an accumulated hash `h` with a new value `v`.
///
/// ```text
/// (h, v) -> rotl(h ^ v, 5) * p
/// ```
///
/// Unlike the pairing functions this never overflows: all arithmetic is wrapping.
pub fn mix(h: u64, v: u64) -> u64 {
    (h ^ v).rotate_left(5).wrapping_mul(MIX_PRIME)
}

/// Hash two `u64` values.
pub fn hash2(a: u64, b: u64) -> u64 {
    mix(mix(a, 0), b)
}

/// Hash three `u64` values.
pub fn hash3(a: u64, b: u64, c: u64) -> u64 {
    mix(hash2(a, b), c)
}

/// Hash four `u64` values.
pub fn hash4(a: u64, b: u64, c: u64, d: u64) -> u64 {
    mix(hash3(a, b, c), d)
}

/// Hash an arbitrary sequence of `u64` values, seeded with `seed`.
pub fn hash_all(seed: u64, values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(mix(seed, 0), mix)
}

/// Hash a name the way array names are hashed: `h = h * 39 + byte`.
pub fn hash_name(name: &str) -> u64 {
    name.bytes()
        .fold(0u64, |h, b| h.wrapping_mul(NAME_HASH_MAGIC).wrapping_add(b as u64))
}

pub trait MyHash {
    /// Structural hash, consistent with `Eq`.
    fn hash(&self) -> u64;
}

impl MyHash for u64 {
    fn hash(&self) -> u64 {
        *self
    }
}

impl MyHash for (u64, u64) {
    fn hash(&self) -> u64 {
        hash2(self.0, self.1)
    }
}

impl MyHash for (u64, u64, u64) {
    fn hash(&self) -> u64 {
        hash3(self.0, self.1, self.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_mix_order_sensitive() {
        assert_ne!(hash2(1, 2), hash2(2, 1));
        assert_ne!(hash3(1, 2, 3), hash3(3, 2, 1));
        assert_eq!(hash2(7, 9), hash2(7, 9));
    }

    #[test]
    fn test_mix_no_overflow() {
        // Large inputs must not panic in debug builds.
        let h = hash4(u64::MAX, u64::MAX - 1, u64::MAX, 1);
        assert_eq!(h, hash4(u64::MAX, u64::MAX - 1, u64::MAX, 1));
    }

    #[test]
    fn test_hash_all() {
        assert_eq!(hash_all(3, [1, 2]), mix(mix(mix(3, 0), 1), 2));
        assert_ne!(hash_all(3, []), hash_all(4, []));
    }

    #[test]
    fn test_hash_name() {
        assert_eq!(hash_name(""), 0);
        assert_eq!(hash_name("a"), 97);
        assert_eq!(hash_name("ab"), 97 * 39 + 98);
    }
}
