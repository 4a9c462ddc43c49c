//! Property-based tests for configuration merging and env substitution

use pagewright::shared::config::{deep_merge, env::substitute_env_with};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn flat_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect()
    })
}

proptest! {
    #[test]
    fn test_merge_source_keys_win(target in flat_object(), source in flat_object()) {
        let mut merged = Value::Object(target.clone());
        deep_merge(&mut merged, Value::Object(source.clone()));

        for (key, value) in &source {
            prop_assert_eq!(&merged[key], value);
        }
        for (key, value) in &target {
            if !source.contains_key(key) {
                prop_assert_eq!(&merged[key], value);
            }
        }
    }

    #[test]
    fn test_merge_null_is_identity(target in flat_object()) {
        let mut merged = Value::Object(target.clone());
        deep_merge(&mut merged, Value::Null);
        prop_assert_eq!(merged, Value::Object(target));
    }

    #[test]
    fn test_merge_is_idempotent(target in flat_object(), source in flat_object()) {
        let mut once = Value::Object(target);
        deep_merge(&mut once, Value::Object(source.clone()));
        let mut twice = once.clone();
        deep_merge(&mut twice, Value::Object(source));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_plain_strings_are_not_substituted(text in "[a-zA-Z0-9 ./|:]{0,24}") {
        prop_assume!(!text.starts_with("$env:"));
        let mut warnings = Vec::new();
        let value = substitute_env_with(Value::String(text.clone()), &|_| None, &mut warnings);
        prop_assert_eq!(value, Value::String(text));
        prop_assert!(warnings.is_empty());
    }

    #[test]
    fn test_env_values_stay_strings(port in 1u16..) {
        let mut warnings = Vec::new();
        let value = substitute_env_with(
            Value::String("$env:PORT|8080".to_string()),
            &|_| Some(port.to_string()),
            &mut warnings,
        );
        prop_assert_eq!(value, Value::String(port.to_string()));
    }
}
