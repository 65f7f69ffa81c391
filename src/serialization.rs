use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Serializes a `HashMap` in sorted key order so that written documents
/// (their `other_fields` maps in particular) come out byte-stable across
/// runs, which the round-trip invariant in spec §8 depends on.
pub fn ordered_map<S, V>(value: &HashMap<String, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    V: Serialize,
    S: Serializer,
{
    let ordered: BTreeMap<_, _> = value.iter().collect();
    ordered.serialize(serializer)
}

pub fn is_false(v: &bool) -> bool {
    !v
}

pub const fn default_true() -> bool {
    true
}
