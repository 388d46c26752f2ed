// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Server compatibility rules.
//!
//! Rules are keyed by an observed server trait, not by server name. Each rule
//! is consulted at one boundary only: URL handling, status interpretation or
//! element spelling. With no rule enabled every boundary behaves as the RFCs
//! describe.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;

use crate::error::CalDavError;
use crate::http::Verb;
use crate::url::Locator;

/// Boundary a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuirkKind {
    /// Locator normalization and href handling.
    UrlEncoding,
    /// Interpretation of HTTP status codes.
    StatusCode,
    /// Spelling of request vocabulary.
    ElementSpelling,
}

/// A server trait that needs special handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quirk {
    /// Collections must be addressed without a trailing slash.
    CollectionWithoutTrailingSlash,
    /// Hrefs arrive percent-encoded and must not be decoded again.
    PreserveEncodedHrefs,
    /// A new calendar is reachable at its display name rather than its id.
    CalendarUrlFromDisplayName,
    /// A 302 to PUT means the object was stored at the `Location` header.
    PutRedirectIsSuccess,
    /// A 404 to DELETE means the resource is already gone.
    DeleteNotFoundIsSuccess,
    /// Collation tokens must be written without whitespace.
    CompactCollation,
    /// Time-range filters without an end bound are rejected.
    RejectsOpenEndedTimeRange,
}

impl Quirk {
    /// Every known rule.
    pub const ALL: [Self; 7] = [
        Self::CollectionWithoutTrailingSlash,
        Self::PreserveEncodedHrefs,
        Self::CalendarUrlFromDisplayName,
        Self::PutRedirectIsSuccess,
        Self::DeleteNotFoundIsSuccess,
        Self::CompactCollation,
        Self::RejectsOpenEndedTimeRange,
    ];

    /// Kebab-case name, as accepted in configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CollectionWithoutTrailingSlash => "collection-without-trailing-slash",
            Self::PreserveEncodedHrefs => "preserve-encoded-hrefs",
            Self::CalendarUrlFromDisplayName => "calendar-url-from-display-name",
            Self::PutRedirectIsSuccess => "put-redirect-is-success",
            Self::DeleteNotFoundIsSuccess => "delete-not-found-is-success",
            Self::CompactCollation => "compact-collation",
            Self::RejectsOpenEndedTimeRange => "rejects-open-ended-time-range",
        }
    }

    /// The boundary this rule applies to.
    #[must_use]
    pub const fn kind(self) -> QuirkKind {
        match self {
            Self::CollectionWithoutTrailingSlash
            | Self::PreserveEncodedHrefs
            | Self::CalendarUrlFromDisplayName => QuirkKind::UrlEncoding,
            Self::PutRedirectIsSuccess | Self::DeleteNotFoundIsSuccess => QuirkKind::StatusCode,
            Self::CompactCollation | Self::RejectsOpenEndedTimeRange => QuirkKind::ElementSpelling,
        }
    }
}

impl fmt::Display for Quirk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quirk {
    type Err = CalDavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.name() == s)
            .ok_or_else(|| CalDavError::Config(format!("unknown compatibility rule `{s}`")))
    }
}

/// Server families with a known set of rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerFamily {
    /// Zimbra Collaboration.
    Zimbra,
    /// Apple iCloud.
    #[serde(rename = "icloud")]
    ICloud,
    /// `DAViCal`.
    Davical,
    /// Baïkal.
    Baikal,
    /// `SOGo`.
    Sogo,
    /// Radicale.
    Radicale,
    /// Cyrus IMAP.
    Cyrus,
}

impl ServerFamily {
    /// Rules observed for this family.
    #[must_use]
    pub const fn quirks(self) -> &'static [Quirk] {
        match self {
            Self::Zimbra => &[Quirk::CalendarUrlFromDisplayName, Quirk::PutRedirectIsSuccess],
            Self::ICloud => &[Quirk::PreserveEncodedHrefs, Quirk::RejectsOpenEndedTimeRange],
            Self::Davical | Self::Radicale => &[Quirk::DeleteNotFoundIsSuccess],
            Self::Sogo => &[Quirk::RejectsOpenEndedTimeRange],
            Self::Cyrus => &[Quirk::CompactCollation],
            Self::Baikal => &[],
        }
    }
}

/// The set of rules enabled for one server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuirkSet {
    rules: BTreeSet<Quirk>,
}

impl QuirkSet {
    /// An empty set: RFC behavior everywhere.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rules: BTreeSet::new(),
        }
    }

    /// The preset rules of a server family.
    #[must_use]
    pub fn for_family(family: ServerFamily) -> Self {
        family.quirks().iter().copied().collect()
    }

    /// Adds a rule.
    #[must_use]
    pub fn with(mut self, quirk: Quirk) -> Self {
        self.rules.insert(quirk);
        self
    }

    /// Whether a rule is enabled.
    #[must_use]
    pub fn contains(&self, quirk: Quirk) -> bool {
        self.rules.contains(&quirk)
    }

    /// Enabled rules.
    pub fn iter(&self) -> impl Iterator<Item = Quirk> + '_ {
        self.rules.iter().copied()
    }

    /// Enabled rules of one kind.
    pub fn of_kind(&self, kind: QuirkKind) -> impl Iterator<Item = Quirk> + '_ {
        self.iter().filter(move |q| q.kind() == kind)
    }

    /// The form a collection locator is requested with.
    #[must_use]
    pub fn collection_url(&self, locator: &Locator) -> Locator {
        match self.contains(Quirk::CollectionWithoutTrailingSlash) {
            true => locator.strip_trailing_slash(),
            false => locator.canonical_collection_form(),
        }
    }

    /// Prepares an href reported by the server for joining.
    ///
    /// Percent-encoded segments are decoded unless the server's hrefs must
    /// be kept as received. Segments whose decoded form would contain a
    /// delimiter stay encoded.
    #[must_use]
    pub fn response_href<'a>(&self, href: &'a str) -> Cow<'a, str> {
        if self.contains(Quirk::PreserveEncodedHrefs) || !href.contains('%') {
            return Cow::Borrowed(href);
        }

        let decoded: Vec<Cow<'_, str>> = href
            .split('/')
            .map(|segment| match percent_decode_str(segment).decode_utf8() {
                Ok(d) if !d.contains(['/', '?', '#', '%']) => d,
                _ => Cow::Borrowed(segment),
            })
            .collect();
        Cow::Owned(decoded.join("/"))
    }

    /// The rule under which a non-2xx status still counts as success, if any.
    #[must_use]
    pub fn accepts_status(&self, verb: Verb, status: u16) -> Option<Quirk> {
        let quirk = match (verb, status) {
            (Verb::Put, 302) => Quirk::PutRedirectIsSuccess,
            (Verb::Delete, 404) => Quirk::DeleteNotFoundIsSuccess,
            _ => return None,
        };
        self.contains(quirk).then_some(quirk)
    }

    /// Spelling of a collation token.
    #[must_use]
    pub fn collation<'a>(&self, token: &'a str) -> Cow<'a, str> {
        match self.contains(Quirk::CompactCollation) && token.contains(char::is_whitespace) {
            true => Cow::Owned(token.chars().filter(|c| !c.is_whitespace()).collect()),
            false => Cow::Borrowed(token),
        }
    }

    /// Checks whether a time-range filter can be sent.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::ServerCompatibility`] if the range is open
    /// ended and the server rejects such ranges.
    pub fn check_time_range(&self, locator: &Locator, has_end: bool) -> Result<(), CalDavError> {
        match !has_end && self.contains(Quirk::RejectsOpenEndedTimeRange) {
            true => Err(CalDavError::ServerCompatibility {
                quirk: Quirk::RejectsOpenEndedTimeRange,
                href: locator.to_string(),
                message: "this server rejects time ranges without an end bound".to_string(),
            }),
            false => Ok(()),
        }
    }
}

impl FromIterator<Quirk> for QuirkSet {
    fn from_iter<T: IntoIterator<Item = Quirk>>(iter: T) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl Extend<Quirk> for QuirkSet {
    fn extend<T: IntoIterator<Item = Quirk>>(&mut self, iter: T) {
        self.rules.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compat_names_round_trip_through_from_str() {
        for quirk in Quirk::ALL {
            assert_eq!(quirk.name().parse::<Quirk>().unwrap(), quirk);
        }
        assert!(matches!(
            "no-such-rule".parse::<Quirk>(),
            Err(CalDavError::Config(_))
        ));
    }

    #[test]
    fn compat_status_exceptions_are_verb_specific() {
        let quirks = QuirkSet::new()
            .with(Quirk::PutRedirectIsSuccess)
            .with(Quirk::DeleteNotFoundIsSuccess);

        assert_eq!(
            quirks.accepts_status(Verb::Put, 302),
            Some(Quirk::PutRedirectIsSuccess)
        );
        assert_eq!(quirks.accepts_status(Verb::Get, 302), None);
        assert_eq!(quirks.accepts_status(Verb::Propfind, 404), None);
        assert_eq!(QuirkSet::new().accepts_status(Verb::Put, 302), None);
    }

    #[test]
    fn compat_collation_is_compacted_only_when_enabled() {
        let token = "i;ascii casemap";
        assert_eq!(QuirkSet::new().collation(token), token);
        assert_eq!(
            QuirkSet::new()
                .with(Quirk::CompactCollation)
                .collation(token),
            "i;asciicasemap"
        );
    }

    #[test]
    fn compat_response_href_decoding() {
        let rfc = QuirkSet::new();
        assert_eq!(rfc.response_href("/cal/%C3%A9t%C3%A9/"), "/cal/été/");
        assert_eq!(rfc.response_href("/cal/a%2Fb.ics"), "/cal/a%2Fb.ics");

        let preserve = QuirkSet::new().with(Quirk::PreserveEncodedHrefs);
        assert_eq!(
            preserve.response_href("/cal/%C3%A9t%C3%A9/"),
            "/cal/%C3%A9t%C3%A9/"
        );
    }

    #[test]
    fn compat_collection_url_form() {
        let locator = Locator::parse("https://example.com/cal/work/").unwrap();
        assert_eq!(
            QuirkSet::new().collection_url(&locator).path(),
            "/cal/work/"
        );
        assert_eq!(
            QuirkSet::new()
                .with(Quirk::CollectionWithoutTrailingSlash)
                .collection_url(&locator)
                .path(),
            "/cal/work"
        );
    }

    #[test]
    fn compat_open_ended_range_check() {
        let locator = Locator::parse("/cal/").unwrap();
        assert!(QuirkSet::new().check_time_range(&locator, false).is_ok());

        let strict = QuirkSet::for_family(ServerFamily::Sogo);
        assert!(strict.check_time_range(&locator, true).is_ok());
        assert!(matches!(
            strict.check_time_range(&locator, false),
            Err(CalDavError::ServerCompatibility {
                quirk: Quirk::RejectsOpenEndedTimeRange,
                ..
            })
        ));
    }
}
