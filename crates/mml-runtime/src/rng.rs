use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

pub(crate) fn next_random_u32(state: &mut u32) -> u32 {
    let mut next = state.wrapping_add(0x6d2b79f5);
    *state = next;
    next = (next ^ (next >> 15)).wrapping_mul(next | 1);
    next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
    next ^ (next >> 14)
}

pub(crate) fn random_seed() -> u32 {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u8(0);
    hasher.finish() as u32
}

// Scripts cannot produce this value except by going through `use`.
pub(crate) fn make_sentinel(seed: u32) -> String {
    let mut state = seed;
    let high = next_random_u32(&mut state);
    let low = next_random_u32(&mut state);
    format!("{:08x}{:08x}", high, low)
}

#[cfg(test)]
mod rng_tests {
    use super::*;

    #[test]
    fn sentinel_is_stable_for_a_seed() {
        assert_eq!(make_sentinel(7), make_sentinel(7));
        assert_ne!(make_sentinel(7), make_sentinel(8));
        assert_eq!(make_sentinel(1).len(), 16);
    }

    #[test]
    fn next_random_u32_advances_state() {
        let mut state = 1u32;
        let first = next_random_u32(&mut state);
        let second = next_random_u32(&mut state);
        assert_ne!(first, second);
        assert_eq!(state, 1u32.wrapping_add(0x6d2b79f5).wrapping_add(0x6d2b79f5));
    }
}
