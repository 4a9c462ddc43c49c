//! Property-based tests for route path specs

use pagewright::backend::registry::PathSpec;
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,8}"
}

proptest! {
    #[test]
    fn test_literal_spec_matches_itself(segments in prop::collection::vec(segment(), 0..5)) {
        let path = format!("/{}", segments.join("/"));
        let spec = PathSpec::parse(&path).unwrap();
        let params = spec.matches(&path);
        prop_assert!(params.is_some());
        let captured = params.unwrap_or_default();
        prop_assert!(captured.is_empty());
    }

    #[test]
    fn test_param_captures_segment(prefix in segment(), value in segment()) {
        let spec = PathSpec::parse(&format!("/{prefix}/:id")).unwrap();
        let path = format!("/{prefix}/{value}");
        let params = spec.matches(&path).unwrap();
        prop_assert_eq!(params.get("id"), Some(&value));
        let longer = format!("{path}/extra");
        let extra = spec.matches(&longer);
        prop_assert!(extra.is_none());
    }

    #[test]
    fn test_wildcard_matches_everything(segments in prop::collection::vec(segment(), 0..5)) {
        let spec = PathSpec::parse("*").unwrap();
        let path = format!("/{}", segments.join("/"));
        let matched = spec.matches(&path);
        prop_assert!(matched.is_some());
    }
}
