//! Shared collection aliases.
//!
//! All internal tables hash with `FxHasher`; insertion-ordered maps are used
//! wherever iteration order is observable (property tables, registry, native
//! table) so two identically-built interpreters behave identically.

pub use rustc_hash::{FxHashMap, FxHashSet};

pub type IndexMap<K, V> =
    indexmap::IndexMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

pub type IndexSet<T> =
    indexmap::IndexSet<T, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
