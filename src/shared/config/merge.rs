use serde_json::Value;

/// Recursively merges `source` into `target`.
///
/// Objects merge key by key, any other value (arrays included) replaces the
/// target. `null` in the source leaves the target untouched.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (_, Value::Null) => {}
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        if !value.is_null() {
                            target.insert(key, value);
                        }
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_merges_nested_objects() {
        let mut target = json!({"a": 1, "nested": {"x": 1, "y": 2}});
        deep_merge(&mut target, json!({"nested": {"y": 3, "z": 4}, "b": true}));
        assert_eq!(target, json!({"a": 1, "b": true, "nested": {"x": 1, "y": 3, "z": 4}}));
    }

    #[test]
    fn test_arrays_replace() {
        let mut target = json!({"list": [1, 2, 3]});
        deep_merge(&mut target, json!({"list": [4]}));
        assert_eq!(target, json!({"list": [4]}));
    }

    #[test]
    fn test_null_source_is_ignored() {
        let mut target = json!({"title": "Home"});
        deep_merge(&mut target, json!({"title": null}));
        assert_eq!(target, json!({"title": "Home"}));
    }
}
