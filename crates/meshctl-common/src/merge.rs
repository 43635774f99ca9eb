//! Deep merge of JSON documents
//!
//! Used to lay user overrides on top of defaults (mesh config, proxy
//! config, profile overlays). Objects merge key by key; any other value in
//! the overlay replaces the base value wholesale.

use serde_json::Value;

/// Merge `overlay` into `base` in place
pub fn merge_into(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Merge `overlay` onto a copy of `base`
pub fn merged(base: &Value, overlay: &Value) -> Value {
    let mut out = base.clone();
    merge_into(&mut out, overlay);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_objects_merge_key_by_key() {
        let base = json!({"defaultConfig": {"concurrency": 2, "statusPort": 15020}});
        let overlay = json!({"defaultConfig": {"concurrency": 4}});
        assert_eq!(
            merged(&base, &overlay),
            json!({"defaultConfig": {"concurrency": 4, "statusPort": 15020}})
        );
    }

    #[test]
    fn lists_are_replaced_not_appended() {
        let base = json!({"trustDomainAliases": ["a", "b"]});
        let overlay = json!({"trustDomainAliases": ["c"]});
        assert_eq!(merged(&base, &overlay), json!({"trustDomainAliases": ["c"]}));
    }

    #[test]
    fn new_keys_are_added() {
        let base = json!({"a": 1});
        let overlay = json!({"b": {"c": true}});
        assert_eq!(merged(&base, &overlay), json!({"a": 1, "b": {"c": true}}));
    }

    #[test]
    fn scalar_overlay_replaces_object() {
        let base = json!({"a": {"b": 1}});
        let overlay = json!({"a": "flat"});
        assert_eq!(merged(&base, &overlay), json!({"a": "flat"}));
    }
}
