//! Property-based tests for name sanitization.
//!
//! These tests use proptest to verify that whatever a caller passes in,
//! the names that reach git are safe.

use proptest::prelude::*;

use membranch::core::naming::{
    namespaced_path, sanitize_branch, sanitize_identifier, ContentPath, DEFAULT_BRANCH_PREFIX,
};
use membranch::core::types::{BranchName, Oid};

/// Path-ish input: safe characters, separators, dots and some hostile bytes.
fn raw_path() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            prop::char::range('a', 'z'),
            prop::char::range('A', 'Z'),
            prop::char::range('0', '9'),
            Just('/'),
            Just('\\'),
            Just('.'),
            Just('-'),
            Just('_'),
            Just(' '),
            Just(':'),
            Just('~'),
            Just('*'),
            Just('\n'),
            Just('é'),
        ],
        0..60,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn safe_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-' | '/')
}

proptest! {
    #[test]
    fn content_paths_are_canonical(raw in raw_path()) {
        if let Ok(path) = ContentPath::parse(&raw) {
            let s = path.as_str();
            prop_assert!(!s.is_empty());
            prop_assert!(s.chars().all(safe_char), "unsafe char in {:?}", s);
            prop_assert!(!s.starts_with('/'));
            prop_assert!(!s.ends_with('/'));
            for segment in s.split('/') {
                prop_assert!(!segment.is_empty());
                prop_assert!(segment != "." && segment != "..");
                prop_assert!(segment != ".git");
                prop_assert!(!segment.starts_with('-'));
            }
        }
    }

    #[test]
    fn content_path_parse_is_idempotent(raw in raw_path()) {
        if let Ok(path) = ContentPath::parse(&raw) {
            let again = ContentPath::parse(path.as_str()).unwrap();
            prop_assert_eq!(again, path);
        }
    }

    #[test]
    fn traversal_never_survives(prefix in "[a-z]{0,5}", suffix in "[a-z]{1,5}") {
        let raw = format!("{}/../{}", prefix, suffix);
        prop_assert!(ContentPath::parse(&raw).is_err());
    }

    #[test]
    fn sanitized_branches_are_valid_and_prefixed(raw in raw_path()) {
        if let Ok(branch) = sanitize_branch(&raw, DEFAULT_BRANCH_PREFIX) {
            prop_assert!(branch.as_str().starts_with(DEFAULT_BRANCH_PREFIX));
            prop_assert!(BranchName::new(branch.as_str()).is_ok());
            let again = sanitize_branch(branch.as_str(), DEFAULT_BRANCH_PREFIX).unwrap();
            prop_assert_eq!(again, branch);
        }
    }

    #[test]
    fn identifiers_are_single_safe_segments(raw in raw_path()) {
        if let Ok(id) = sanitize_identifier(&raw) {
            prop_assert!(!id.is_empty());
            prop_assert!(!id.contains('/'));
            prop_assert!(!id.contains('.'));
            prop_assert!(id.chars().all(safe_char));
        }
    }

    #[test]
    fn namespaced_paths_start_with_the_namespace(ns in "[A-Za-z0-9 ]{1,12}", name in "[a-z]{1,8}\\.md") {
        if let Ok(id) = sanitize_identifier(&ns) {
            let path = namespaced_path(&ns, &name).unwrap();
            prop_assert_eq!(path.namespace(), id.as_str());
        }
    }

    #[test]
    fn oids_roundtrip_through_lowercase(hex in "[0-9a-fA-F]{40}") {
        let oid = Oid::new(hex.as_str()).unwrap();
        prop_assert_eq!(oid.as_str(), hex.to_ascii_lowercase());
    }
}
