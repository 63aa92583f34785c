//! Property and cross-check tests for the version model
//!
//! Tests cover:
//! - Total order laws for `compare`
//! - Display/parse round trip for constructed versions
//! - Agreement with the `semver` crate on precedence

mod common;

use std::cmp::Ordering;

use apictl_update::{compare, is_update_available, Version};
use common::*;
use proptest::prelude::*;

/// Identifiers semver itself accepts (no leading zeros on numerics)
fn semver_identifier() -> impl Strategy<Value = String> {
    prop_oneof!["0|[1-9][0-9]{0,5}", "[A-Za-z][0-9A-Za-z-]{0,5}"]
}

/// Any identifier the model accepts
fn any_identifier() -> impl Strategy<Value = String> {
    "[0-9A-Za-z-]{1,6}"
}

fn build_metadata() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[0-9A-Za-z-]{1,5}(\\.[0-9A-Za-z-]{1,5}){0,2}",
    ]
}

fn versions_from(ident: BoxedStrategy<String>, build: BoxedStrategy<String>) -> impl Strategy<Value = Version> {
    (
        0u64..4,
        0u64..4,
        0u64..4,
        prop::collection::vec(ident, 0..4),
        build,
    )
        .prop_map(|(major, minor, patch, pre, build)| {
            Version::new(major, minor, patch)
                .with_prereleases(pre)
                .unwrap()
                .with_build(build)
                .unwrap()
        })
}

fn any_version() -> impl Strategy<Value = Version> {
    versions_from(any_identifier().boxed(), build_metadata().boxed())
}

fn semver_compatible_version() -> impl Strategy<Value = Version> {
    versions_from(semver_identifier().boxed(), Just(String::new()).boxed())
}

proptest! {
    #[test]
    fn compare_is_reflexive(v in any_version()) {
        prop_assert_eq!(compare(&v, &v), Ordering::Equal);
        prop_assert!(!is_update_available(&v, &v));
    }

    #[test]
    fn compare_is_antisymmetric(a in any_version(), b in any_version()) {
        prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
    }

    #[test]
    fn compare_is_transitive(a in any_version(), b in any_version(), c in any_version()) {
        if compare(&a, &b) != Ordering::Greater && compare(&b, &c) != Ordering::Greater {
            prop_assert_ne!(compare(&a, &c), Ordering::Greater);
        }
    }

    #[test]
    fn display_parse_round_trip(v in any_version()) {
        let text = v.to_string();
        prop_assert_eq!(Version::parse(&text).unwrap(), v);
    }

    #[test]
    fn json_round_trip(v in any_version()) {
        let json = serde_json::to_string(&v).unwrap();
        let back: Version = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn precedence_agrees_with_semver(a in semver_compatible_version(), b in semver_compatible_version()) {
        let sa = semver::Version::parse(&a.to_string()).unwrap();
        let sb = semver::Version::parse(&b.to_string()).unwrap();
        prop_assert_eq!(compare(&a, &b), sa.cmp(&sb));
    }
}

#[test]
fn test_update_available_examples() {
    assert!(!is_update_available(&version("1.2.3"), &version("1.2.3")));
    assert!(is_update_available(&version("1.2.3"), &version("1.3.0")));
    assert!(is_update_available(&version("1.0.0-alpha"), &version("1.0.0")));
    assert!(is_update_available(
        &version("1.0.0-alpha"),
        &version("1.0.0-alpha.1")
    ));
}

#[test]
fn test_build_only_difference_is_not_an_update() {
    let current = version("0.10.0+linux.1");
    let candidate = version("0.10.0+linux.2");
    assert!(!is_update_available(&current, &candidate));
    assert_ne!(current, candidate);
}

#[test]
fn test_sorting_uses_precedence() {
    let mut versions: Vec<Version> = ["1.0.0", "1.0.0-rc.1", "0.10.0", "0.9.0", "1.0.0-beta"]
        .iter()
        .map(|s| version(s))
        .collect();
    versions.sort();
    let sorted: Vec<String> = versions.iter().map(ToString::to_string).collect();
    assert_eq!(
        sorted,
        ["0.9.0", "0.10.0", "1.0.0-beta", "1.0.0-rc.1", "1.0.0"]
    );
}
