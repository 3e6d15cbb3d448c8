// Fast hash maps using AHash instead of the default SipHash.
// Import these with `use crate::types::{HashMap, HashMapExt}`.
pub(crate) type HashMap<K, V> = ahash::HashMap<K, V>;
pub(crate) use ahash::HashMapExt;

/// Mapping quality on the Phred scale, as written to the MAPQ field.
pub type MapQ = u8;
