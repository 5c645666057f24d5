//! Hash maps keyed by short identifier strings sit on the compiler's name
//! lookup path, so they use the FxHash table instead of the SipHash default.

pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[inline]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    rustc_hash::FxHashMap::with_capacity_and_hasher(capacity, Default::default())
}
