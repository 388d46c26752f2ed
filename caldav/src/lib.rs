// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` client library (RFC 4791).
//!
//! Two layers are offered. [`DavClient`] sends one DAV request per method
//! and decodes the multistatus answers. On top of it, the resource tree
//! ([`Principal`], [`CalendarHomeSet`], [`Calendar`], [`CalendarObject`])
//! discovers calendars, searches them and stores objects, with entity-tag
//! preconditions on every write.
//!
//! Servers that bend the protocol are handled by named compatibility rules,
//! see [`Quirk`] and [`ServerFamily`].

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(
    clippy::option_option,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::match_bool
)]

mod client;
mod compat;
mod config;
mod error;
mod http;
pub mod ical;
mod request;
mod response;
mod tree;
mod types;
mod url;
mod xml;

pub use crate::client::{CALENDAR_CONTENT_TYPE, DavClient, GetOutcome, Precondition, PutOutcome};
pub use crate::compat::{Quirk, QuirkKind, QuirkSet, ServerFamily};
pub use crate::config::{AuthMethod, CalDavConfig};
pub use crate::error::CalDavError;
pub use crate::http::{DavRequest, DavResponse, HttpTransport, Transport, Verb};
pub use crate::request::{
    CalendarMultiGetRequest, CalendarQueryRequest, DEFAULT_COLLATION, FreeBusyQueryRequest,
    MkCalendarRequest, Prop, PropFindRequest, PropPatchRequest, TextMatch, TimeRange, format_utc,
};
pub use crate::response::{
    MultiStatusResponse, PropStat, PropertyMap, ResponseItem, parse_status_line,
};
pub use crate::tree::{
    Calendar, CalendarHomeSet, CalendarObject, Child, DavObject, ObjectState, Principal,
};
pub use crate::types::{
    CalendarData, ComponentKind, Depth, ETag, FreeBusy, ResourceFailure, SearchResult,
};
pub use crate::url::{Locator, encode_segment};
pub use crate::xml::{Element, ElementName, ns};
