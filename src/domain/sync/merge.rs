//! JSON merge rules for PATCH
//!
//! Objects merge recursively, `null` removes a field, scalars and plain
//! arrays are replaced. Arrays listed as keyed collections merge
//! element-by-element on their key field, so patching one child never
//! detaches or reorders its siblings.

use serde_json::Value;

pub fn merge_patch(target: &mut Value, patch: &Value, keyed: &[(&str, &str)]) {
    let (Some(target_map), Some(patch_map)) = (target.as_object_mut(), patch.as_object()) else {
        *target = patch.clone();
        return;
    };

    for (field, value) in patch_map {
        if value.is_null() {
            target_map.remove(field);
            continue;
        }

        let key_field = keyed.iter().find(|(name, _)| name == field).map(|(_, k)| *k);
        match (target_map.get_mut(field), key_field) {
            (Some(Value::Array(existing)), Some(key_field)) if value.is_array() => {
                merge_keyed(existing, value.as_array().into_iter().flatten(), key_field, keyed);
            }
            (Some(existing), _) if existing.is_object() && value.is_object() => {
                merge_patch(existing, value, keyed);
            }
            _ => {
                target_map.insert(field.clone(), value.clone());
            }
        }
    }
}

fn merge_keyed<'a>(
    existing: &mut Vec<Value>,
    patches: impl Iterator<Item = &'a Value>,
    key_field: &str,
    keyed: &[(&str, &str)],
) {
    for patch in patches {
        let key = patch.get(key_field);
        let slot = key.and_then(|k| {
            existing
                .iter_mut()
                .find(|item| item.get(key_field) == Some(k))
        });
        match slot {
            Some(item) => merge_patch(item, patch, keyed),
            None => existing.push(patch.clone()),
        }
    }
}
