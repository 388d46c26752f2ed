// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use davcal_caldav::{CalDavError, Locator, encode_segment};

fn loc(raw: &str) -> Locator {
    Locator::parse(raw).expect("valid locator")
}

#[test]
fn url_equivalent_ignores_trailing_slash_and_default_port() {
    assert!(loc("https://example.com/dav/cal/").equivalent(&loc("https://example.com/dav/cal")));
    assert!(loc("https://example.com:443/dav/").equivalent(&loc("https://example.com/dav")));
    assert!(loc("http://EXAMPLE.com:80/dav/").equivalent(&loc("http://example.com/dav/")));
    assert!(!loc("https://example.com:8443/dav/").equivalent(&loc("https://example.com/dav/")));
    assert!(!loc("https://example.com/dav/a/").equivalent(&loc("https://example.com/dav/b/")));
}

#[test]
fn url_equivalent_compares_decoded_paths() {
    let encoded = loc("https://example.com/dav/caf%C3%A9/My%20Cal/");
    let raw = loc("https://example.com/dav/café/My Cal");
    assert!(encoded.equivalent(&raw));
    assert_eq!(encoded, raw);
}

#[test]
fn url_relative_and_absolute_never_equal() {
    assert!(!loc("/dav/cal/").equivalent(&loc("https://example.com/dav/cal/")));
    assert!(loc("/dav/cal/").equivalent(&loc("/dav/cal")));
}

#[test]
fn url_hash_follows_equivalence() {
    let mut set = HashSet::new();
    set.insert(loc("https://example.com/dav/cal/"));
    set.insert(loc("https://example.com:443/dav/cal"));
    set.insert(loc("https://example.com/dav/%63al/"));
    assert_eq!(set.len(), 1);
}

#[test]
fn url_parse_rejects_pathless_input() {
    assert!(matches!(Locator::parse(""), Err(CalDavError::MalformedLocator(_))));
    assert!(matches!(Locator::parse("   "), Err(CalDavError::MalformedLocator(_))));
    assert!(matches!(
        Locator::parse("mailto:alice@example.com"),
        Err(CalDavError::MalformedLocator(_))
    ));
}

#[test]
fn url_parse_strips_none_port() {
    let parsed = loc("https://example.com:None/dav/");
    assert_eq!(parsed.to_string(), "https://example.com/dav/");
}

#[test]
fn url_join_relative_reference_as_member() {
    let base = loc("https://example.com/dav/cal");
    assert_eq!(
        base.join("e1.ics").expect("join").to_string(),
        "https://example.com/dav/cal/e1.ics"
    );

    let base = loc("https://example.com/dav/cal/");
    assert_eq!(
        base.join("e1.ics").expect("join").to_string(),
        "https://example.com/dav/cal/e1.ics"
    );
}

#[test]
fn url_join_absolute_path_and_absolute_url() {
    let base = loc("https://example.com/dav/cal/");
    assert_eq!(
        base.join("/other/x.ics").expect("join").to_string(),
        "https://example.com/other/x.ics"
    );

    let joined = base.join("https://balanced.example.org/home/").expect("join");
    assert!(joined.is_absolute());
    assert_eq!(joined.to_string(), "https://balanced.example.org/home/");

    let joined = base.join("https://example.com:None/home/").expect("join");
    assert_eq!(joined.to_string(), "https://example.com/home/");
}

#[test]
fn url_join_empty_reference_is_identity() {
    let base = loc("https://example.com/dav/cal/");
    assert_eq!(base.join("").expect("join").to_string(), base.to_string());
}

#[test]
fn url_join_then_reparse_is_stable() {
    let base = loc("https://example.com/dav/calendars/");
    for reference in ["work/", "/dav/calendars/home/", "日本語/", "café.ics", "a%20b.ics"] {
        let joined = base.join(reference).expect("join");
        let reparsed = loc(&joined.to_string());
        assert_eq!(reparsed, joined, "reference {reference}");
        assert_eq!(reparsed.to_string(), joined.to_string(), "reference {reference}");
    }
}

#[test]
fn url_join_non_ascii_matches_encoded_form() {
    let base = loc("https://example.com/dav/cal/");
    let joined = base.join("café.ics").expect("join");
    assert_eq!(joined.path(), "/dav/cal/caf%C3%A9.ics");
    assert_eq!(joined, loc("https://example.com/dav/cal/caf%C3%A9.ics"));
    assert_eq!(joined.last_segment().as_deref(), Some("café.ics"));
}

#[test]
fn url_relative_locator_resolves_against_base() {
    let base = loc("https://example.com/dav/");
    let relative = loc("/dav/calendars/alice/");
    assert!(!relative.is_absolute());

    let resolved = relative.to_absolute(&base).expect("resolve");
    assert_eq!(resolved.as_str(), "https://example.com/dav/calendars/alice/");

    assert!(matches!(
        relative.to_absolute(&loc("/dav/")),
        Err(CalDavError::MalformedLocator(_))
    ));
}

#[test]
fn url_trailing_slash_normalizations() {
    let collection = loc("https://example.com/dav/cal//");
    assert_eq!(collection.strip_trailing_slash().path(), "/dav/cal");
    assert_eq!(collection.canonical_collection_form().path(), "/dav/cal/");
    assert!(!collection.strip_trailing_slash().has_trailing_slash());

    let root = loc("https://example.com/");
    assert_eq!(root.strip_trailing_slash().path(), "/");
    assert_eq!(root.canonical_collection_form().path(), "/");

    let relative = loc("/dav/cal?x=1");
    assert_eq!(relative.canonical_collection_form().to_string(), "/dav/cal/?x=1");
}

#[test]
fn url_segment_encoding_round_trips_through_locator() {
    let uid = "meeting 42/a#b@example.com";
    let base = loc("https://example.com/dav/cal/");
    let joined = base.join(&format!("{}.ics", encode_segment(uid))).expect("join");
    assert_eq!(joined.last_segment(), Some(format!("{uid}.ics")));
    assert_eq!(joined.decoded_path(), format!("/dav/cal/{uid}.ics"));
}
