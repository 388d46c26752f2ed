// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for WebDAV/CalDAV operations.

use std::collections::BTreeMap;

use crate::error::CalDavError;
use crate::types::{ComponentKind, ETag};
use crate::xml::{Element, ElementName, ns};

/// `WebDAV` multistatus response.
#[derive(Debug, Clone, Default)]
pub struct MultiStatusResponse {
    /// The response items.
    pub responses: Vec<ResponseItem>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// Href as reported by the server.
    pub href: String,
    /// Status of the whole resource, when reported without properties.
    pub status: Option<u16>,
    /// Property groups with their status.
    pub prop_stats: Vec<PropStat>,
}

/// Property stat with status and value.
#[derive(Debug, Clone)]
pub struct PropStat {
    /// Status shared by the properties; `None` if missing or unparseable.
    pub status: Option<u16>,
    /// Property elements, values included.
    pub props: Vec<Element>,
}

impl PropStat {
    /// A propstat without a status line is taken as successful.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_none_or(is_success)
    }
}

impl MultiStatusResponse {
    /// Parses multistatus response from XML.
    ///
    /// A well-formed document whose root is not `DAV:multistatus` yields an
    /// empty response.
    ///
    /// # Errors
    ///
    /// Returns an error if XML parsing fails or a response has no href.
    pub fn from_xml(xml: &str) -> Result<Self, CalDavError> {
        if xml.trim().is_empty() {
            return Ok(Self::default());
        }
        let root = Element::parse(xml)?;
        Self::from_element(&root)
    }

    /// Decodes an already parsed multistatus element.
    ///
    /// # Errors
    ///
    /// Returns an error if a response has no href.
    pub fn from_element(root: &Element) -> Result<Self, CalDavError> {
        if !root.is(ns::DAV, "multistatus") {
            tracing::debug!(root = %root.name, "response body is not a multistatus");
            return Ok(Self::default());
        }

        let responses = root
            .children_named(ns::DAV, "response")
            .map(ResponseItem::from_element)
            .collect::<Result<_, _>>()?;
        Ok(Self { responses })
    }

    /// Number of reported resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Whether no resource was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl ResponseItem {
    fn from_element(response: &Element) -> Result<Self, CalDavError> {
        let href = response
            .child(ns::DAV, "href")
            .map(|h| h.text().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CalDavError::decode("multistatus response without href"))?;

        let status = response
            .child(ns::DAV, "status")
            .and_then(|s| parse_status_line(s.text()));

        let prop_stats = response
            .children_named(ns::DAV, "propstat")
            .map(|propstat| PropStat {
                status: propstat
                    .child(ns::DAV, "status")
                    .and_then(|s| parse_status_line(s.text())),
                props: propstat
                    .children_named(ns::DAV, "prop")
                    .flat_map(|p| p.children.iter().cloned())
                    .collect(),
            })
            .collect();

        Ok(Self {
            href,
            status,
            prop_stats,
        })
    }

    /// Properties reported with a success status.
    #[must_use]
    pub fn properties(&self) -> PropertyMap {
        self.prop_stats
            .iter()
            .filter(|ps| ps.is_success())
            .flat_map(|ps| ps.props.iter().cloned())
            .collect()
    }

    /// Status reported for one property.
    #[must_use]
    pub fn status_of(&self, name: &ElementName) -> Option<u16> {
        self.prop_stats
            .iter()
            .find(|ps| ps.props.iter().any(|p| p.name == *name))
            .and_then(|ps| ps.status)
    }

    /// Whether the resource failed as a whole.
    ///
    /// That is the case when the resource status is not 2xx, or when no
    /// property group succeeded and at least one failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        if let Some(status) = self.status {
            return !is_success(status);
        }
        !self.prop_stats.is_empty() && self.prop_stats.iter().all(|ps| !ps.is_success())
    }

    /// The status that best describes a failed resource.
    #[must_use]
    pub fn failure_status(&self) -> Option<u16> {
        self.status.filter(|s| !is_success(*s)).or_else(|| {
            self.prop_stats
                .iter()
                .filter_map(|ps| ps.status)
                .find(|s| !is_success(*s))
        })
    }
}

/// Properties of one resource, keyed by qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    props: BTreeMap<ElementName, Element>,
}

impl PropertyMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            props: BTreeMap::new(),
        }
    }

    /// Stores a property, replacing any previous value.
    pub fn insert(&mut self, element: Element) {
        self.props.insert(element.name.clone(), element);
    }

    /// Property element by name.
    #[must_use]
    pub fn get(&self, name: &ElementName) -> Option<&Element> {
        self.props.get(name)
    }

    /// Text of a property, trimmed; `None` when absent or empty.
    #[must_use]
    pub fn text(&self, name: &ElementName) -> Option<&str> {
        self.get(name).map(Element::text).filter(|t| !t.is_empty())
    }

    /// Href carried by a property such as `calendar-home-set`.
    #[must_use]
    pub fn href(&self, name: &ElementName) -> Option<&str> {
        self.get(name)?
            .find(ns::DAV, "href")
            .map(Element::text)
            .filter(|t| !t.is_empty())
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.text(&ElementName::dav("displayname"))
    }

    /// Calendar description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.text(&ElementName::caldav("calendar-description"))
    }

    /// Names of the resource type markers.
    #[must_use]
    pub fn resource_types(&self) -> Vec<ElementName> {
        self.get(&ElementName::dav("resourcetype"))
            .map(|rt| rt.children.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether the resource type contains the calendar marker.
    #[must_use]
    pub fn is_calendar(&self) -> bool {
        self.get(&ElementName::dav("resourcetype"))
            .is_some_and(|rt| rt.child(ns::CALDAV, "calendar").is_some())
    }

    /// Whether the resource type contains the collection marker.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.get(&ElementName::dav("resourcetype"))
            .is_some_and(|rt| rt.child(ns::DAV, "collection").is_some())
    }

    /// Entity tag.
    #[must_use]
    pub fn etag(&self) -> Option<ETag> {
        self.text(&ElementName::dav("getetag"))
            .map(|t| ETag::new(t.to_string()))
    }

    /// Collection tag.
    #[must_use]
    pub fn ctag(&self) -> Option<&str> {
        self.text(&ElementName::new(ns::CALENDARSERVER, "getctag"))
    }

    /// Calendar data of an object resource, as the server sent it.
    ///
    /// Only the XML indentation around the payload is dropped; the line
    /// break ending its last line is kept.
    #[must_use]
    pub fn calendar_data(&self) -> Option<&str> {
        self.get(&ElementName::caldav("calendar-data"))
            .map(|el| payload(&el.text))
            .filter(|t| !t.is_empty())
    }

    /// Component types a calendar accepts.
    #[must_use]
    pub fn supported_components(&self) -> Vec<ComponentKind> {
        self.get(&ElementName::caldav("supported-calendar-component-set"))
            .map(|set| {
                set.children_named(ns::CALDAV, "comp")
                    .filter_map(|c| c.attr("name").and_then(ComponentKind::from_name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterates over the properties.
    pub fn iter(&self) -> impl Iterator<Item = (&ElementName, &Element)> {
        self.props.iter()
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Whether there is no property.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

impl FromIterator<Element> for PropertyMap {
    fn from_iter<T: IntoIterator<Item = Element>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl Extend<Element> for PropertyMap {
    fn extend<T: IntoIterator<Item = Element>>(&mut self, iter: T) {
        for element in iter {
            self.insert(element);
        }
    }
}

/// Parses an HTTP status line such as `HTTP/1.1 200 OK`.
#[must_use]
pub fn parse_status_line(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}

fn payload(text: &str) -> &str {
    let text = text.trim_start();
    let content = text.trim_end();
    let rest = text.get(content.len()..).unwrap_or_default();
    let eol = match rest {
        r if r.starts_with("\r\n") => 2,
        r if r.starts_with('\n') => 1,
        _ => 0,
    };
    text.get(..content.len() + eol).unwrap_or(content)
}

const fn is_success(status: u16) -> bool {
    status >= 200 && status < 300
}
