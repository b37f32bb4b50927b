//! Hash collections used throughout the crate.
//!
//! Window handles and pids are small integers, so the Fx hasher is used
//! everywhere instead of SipHash.

pub use std::collections::{BTreeMap, BTreeSet, VecDeque, hash_map};

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
