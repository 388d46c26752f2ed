// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;

use crate::url::Locator;

/// Entity tag for change detection.
///
/// An `ETag` represents an entity tag returned by the `CalDAV` server,
/// used for optimistic concurrency control and change detection. It is
/// kept verbatim, quotes and weak marker included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(String);

impl ETag {
    /// Creates a new `ETag` from a string.
    #[must_use]
    pub const fn new(etag: String) -> Self {
        Self(etag)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ETag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ETag {
    fn from(etag: String) -> Self {
        Self(etag)
    }
}

impl From<&str> for ETag {
    fn from(etag: &str) -> Self {
        Self(etag.to_string())
    }
}

/// `Depth` header of PROPFIND and REPORT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The resource itself.
    Zero,
    /// The resource and its direct members.
    One,
}

impl Depth {
    /// Header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
        }
    }
}

/// Calendar component type of an object resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// `VEVENT`.
    Event,
    /// `VTODO`.
    Todo,
    /// `VJOURNAL`.
    Journal,
    /// `VFREEBUSY`.
    FreeBusy,
}

impl ComponentKind {
    /// iCalendar component name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Journal => "VJOURNAL",
            Self::FreeBusy => "VFREEBUSY",
        }
    }

    /// Parses an iCalendar component name, case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Event, Self::Todo, Self::Journal, Self::FreeBusy]
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that can be rendered to iCalendar text.
///
/// Payloads are stored and sent as opaque text; this trait only asks for
/// the rendered form.
pub trait CalendarData {
    /// Renders the payload as iCalendar text.
    fn to_ical(&self) -> String;
}

impl CalendarData for str {
    fn to_ical(&self) -> String {
        self.to_string()
    }
}

impl CalendarData for String {
    fn to_ical(&self) -> String {
        self.clone()
    }
}

impl<T: CalendarData + ?Sized> CalendarData for &T {
    fn to_ical(&self) -> String {
        (**self).to_ical()
    }
}

#[cfg(feature = "icalendar")]
impl CalendarData for icalendar::Calendar {
    fn to_ical(&self) -> String {
        self.to_string()
    }
}

/// A resource a batch exchange reported as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFailure {
    /// Locator of the resource.
    pub href: Locator,
    /// HTTP status reported for it, if any.
    pub status: Option<u16>,
}

/// Result of a batch search: the objects found and the resources that failed.
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    /// Objects found, in server order unless documented otherwise.
    pub objects: Vec<T>,
    /// Resources reported with a non-success status.
    pub failures: Vec<ResourceFailure>,
}

impl<T> SearchResult<T> {
    /// Whether nothing was found and nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.failures.is_empty()
    }
}

impl<T> Default for SearchResult<T> {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Free/busy report as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBusy {
    /// Raw `VFREEBUSY` calendar text.
    pub data: String,
}
