//! Deterministic hashing. The standard library's `HashMap` seeds its hasher randomly, which would
//! make iteration order differ between runs with the same seed. Everything keyed in this crate
//! goes through `rustc_hash` instead, and RNG stream names are hashed with xxh3.
//!
//! The standard library `HashMap` has a `new` method, but `HashMap<K, V, S>` does not have a `new`
//! method by default. Use `HashMap::default()` instead.

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use xxhash_rust::xxh3::xxh3_64;

/// A convenience method to compute the hash of a `&str`.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}
