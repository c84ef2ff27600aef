// Additive merge semantics shared by the identity cache and device fragments.
//
// Mappings merge recursively; any other incoming value replaces what was
// there. Keys absent from the patch are never touched.

use serde_json::{Map, Value};

/// Deep-merge `patch` into `target`.
pub fn deep_merge(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, incoming) in patch {
        if let Value::Object(incoming) = incoming {
            if let Some(Value::Object(existing)) = target.get_mut(&key) {
                deep_merge(existing, incoming);
                continue;
            }
            target.insert(key, Value::Object(incoming));
        } else {
            target.insert(key, incoming);
        }
    }
}

/// Field-by-field merge for typed fragments.
///
/// Fields set in `patch` overwrite; unset fields keep their current value.
/// Forward-compatible unknown fields are deep-merged.
pub trait Merge {
    fn merge(&mut self, patch: Self);
}

/// Overwrite `slot` only when the patch carries a value.
pub(crate) fn merge_field<T>(slot: &mut Option<T>, patch: Option<T>) {
    if patch.is_some() {
        *slot = patch;
    }
}

/// Recurse into nested typed mappings instead of replacing them wholesale.
pub(crate) fn merge_nested<T: Merge>(slot: &mut Option<T>, patch: Option<T>) {
    let Some(incoming) = patch else { return };
    if let Some(existing) = slot {
        existing.merge(incoming);
    } else {
        *slot = Some(incoming);
    }
}
