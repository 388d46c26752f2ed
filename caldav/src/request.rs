// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for `CalDAV` operations.
//!
//! Every builder produces an [`Element`] tree; serialization happens in the
//! protocol client so compatibility rules can be applied on the way out.

use jiff::Timestamp;

use crate::types::ComponentKind;
use crate::xml::{Element, ElementName, ns};

/// Format of `CalDAV` UTC date-time attributes.
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Default collation of text matches.
pub const DEFAULT_COLLATION: &str = "i;octet";

/// Formats a timestamp as a `CalDAV` UTC date-time (`20240301T120000Z`).
#[must_use]
pub fn format_utc(ts: Timestamp) -> String {
    ts.strftime(UTC_FORMAT).to_string()
}

/// Properties to request in PROPFIND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Calendar data.
    CalendarData,
    /// Calendar home set.
    CalendarHomeSet,
    /// Supported calendar components.
    SupportedCalendarComponents,
    /// Calendar description.
    CalendarDescription,
    /// Calendar timezone.
    CalendarTimezone,
    /// Principal of the authenticated user.
    CurrentUserPrincipal,
    /// Collection tag of the calendar server extensions.
    GetCTag,
    /// Any other property.
    Custom(ElementName),
}

impl Prop {
    /// Qualified name of the property.
    #[must_use]
    pub fn name(&self) -> ElementName {
        match self {
            Self::DisplayName => ElementName::dav("displayname"),
            Self::ResourceType => ElementName::dav("resourcetype"),
            Self::GetETag => ElementName::dav("getetag"),
            Self::CurrentUserPrincipal => ElementName::dav("current-user-principal"),
            Self::CalendarData => ElementName::caldav("calendar-data"),
            Self::CalendarHomeSet => ElementName::caldav("calendar-home-set"),
            Self::SupportedCalendarComponents => {
                ElementName::caldav("supported-calendar-component-set")
            }
            Self::CalendarDescription => ElementName::caldav("calendar-description"),
            Self::CalendarTimezone => ElementName::caldav("calendar-timezone"),
            Self::GetCTag => ElementName::new(ns::CALENDARSERVER, "getctag"),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Empty element naming the property.
    #[must_use]
    pub fn element(&self) -> Element {
        Element::new(self.name())
    }
}

/// PROPFIND request builder.
#[derive(Debug, Default)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub const fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        self.props.push(prop);
        self
    }

    /// Builds the PROPFIND body; without properties it asks for `allprop`.
    #[must_use]
    pub fn build(&self) -> Element {
        let root = Element::dav("propfind");
        if self.props.is_empty() {
            return root.with_child(Element::dav("allprop"));
        }
        root.with_child(Element::dav("prop").with_children(self.props.iter().map(Prop::element)))
    }
}

impl FromIterator<Prop> for PropFindRequest {
    fn from_iter<I: IntoIterator<Item = Prop>>(props: I) -> Self {
        Self {
            props: props.into_iter().collect(),
        }
    }
}

/// PROPPATCH request builder.
#[derive(Debug, Default)]
pub struct PropPatchRequest {
    set: Vec<Element>,
    remove: Vec<ElementName>,
}

impl PropPatchRequest {
    /// Creates an empty PROPPATCH request.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            set: Vec::new(),
            remove: Vec::new(),
        }
    }

    /// Sets a property to the given element, value included.
    #[must_use]
    pub fn set(mut self, property: Element) -> Self {
        self.set.push(property);
        self
    }

    /// Removes a property.
    #[must_use]
    pub fn remove(mut self, name: ElementName) -> Self {
        self.remove.push(name);
        self
    }

    /// Builds the `propertyupdate` body.
    #[must_use]
    pub fn build(&self) -> Element {
        let mut root = Element::dav("propertyupdate");
        if !self.set.is_empty() {
            root = root.with_child(
                Element::dav("set")
                    .with_child(Element::dav("prop").with_children(self.set.iter().cloned())),
            );
        }
        if !self.remove.is_empty() {
            root = root.with_child(
                Element::dav("remove").with_child(
                    Element::dav("prop")
                        .with_children(self.remove.iter().cloned().map(Element::new)),
                ),
            );
        }
        root
    }
}

/// Time range filter for calendar queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start date/time.
    pub start: Timestamp,
    /// End date/time; open ended when absent.
    pub end: Option<Timestamp>,
}

impl TimeRange {
    fn element(self, local: &str) -> Element {
        let el = Element::caldav(local).with_attr("start", format_utc(self.start));
        match self.end {
            Some(end) => el.with_attr("end", format_utc(end)),
            None => el,
        }
    }
}

/// Text match filter for calendar queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    /// Text to search for.
    pub text: String,
    /// Collation to use.
    pub collation: Option<String>,
    /// Whether to negate the match.
    pub negate: bool,
}

impl TextMatch {
    /// Matches `text` with the default collation.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            collation: Some(DEFAULT_COLLATION.to_string()),
            negate: false,
        }
    }

    /// Negates the match.
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    fn element(&self) -> Element {
        let mut el = Element::caldav("text-match").with_text(self.text.clone());
        if let Some(collation) = &self.collation {
            el = el.with_attr("collation", collation.clone());
        }
        if self.negate {
            el = el.with_attr("negate-condition", "yes");
        }
        el
    }
}

/// Property filter test.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PropTest {
    IsNotDefined,
    TextMatch(TextMatch),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PropFilter {
    name: String,
    test: PropTest,
}

impl PropFilter {
    fn element(&self) -> Element {
        let child = match &self.test {
            PropTest::IsNotDefined => Element::caldav("is-not-defined"),
            PropTest::TextMatch(m) => m.element(),
        };
        Element::caldav("prop-filter")
            .with_attr("name", self.name.clone())
            .with_child(child)
    }
}

/// Calendar query request builder.
#[derive(Debug, Default)]
pub struct CalendarQueryRequest {
    time_range: Option<TimeRange>,
    prop_filters: Vec<PropFilter>,
    component: Option<ComponentKind>,
    expand: Option<(Timestamp, Timestamp)>,
}

impl CalendarQueryRequest {
    /// Creates a new calendar query request.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            time_range: None,
            prop_filters: Vec::new(),
            component: None,
            expand: None,
        }
    }

    /// Sets the time range filter.
    #[must_use]
    pub const fn time_range(mut self, start: Timestamp, end: Option<Timestamp>) -> Self {
        self.time_range = Some(TimeRange { start, end });
        self
    }

    /// Sets the component filter (VEVENT, VTODO, etc.).
    #[must_use]
    pub const fn component(mut self, component: ComponentKind) -> Self {
        self.component = Some(component);
        self
    }

    /// Adds a text match on a property.
    #[must_use]
    pub fn text_match(mut self, property: &str, text_match: TextMatch) -> Self {
        self.prop_filters.push(PropFilter {
            name: property.to_string(),
            test: PropTest::TextMatch(text_match),
        });
        self
    }

    /// Requires a property to be absent.
    #[must_use]
    pub fn is_not_defined(mut self, property: &str) -> Self {
        self.prop_filters.push(PropFilter {
            name: property.to_string(),
            test: PropTest::IsNotDefined,
        });
        self
    }

    /// Asks the server to expand recurrences within the range.
    #[must_use]
    pub const fn expand(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.expand = Some((start, end));
        self
    }

    /// Whether the time range filter has no end bound.
    #[must_use]
    pub fn is_open_ended(&self) -> bool {
        self.time_range.is_some_and(|tr| tr.end.is_none())
    }

    /// Builds the `calendar-query` body.
    #[must_use]
    pub fn build(&self) -> Element {
        let mut calendar_data = Element::caldav("calendar-data");
        if let Some((start, end)) = self.expand {
            calendar_data = calendar_data.with_child(
                TimeRange {
                    start,
                    end: Some(end),
                }
                .element("expand"),
            );
        }
        let prop = Element::dav("prop")
            .with_child(Element::dav("getetag"))
            .with_child(calendar_data);

        let tests = self
            .time_range
            .map(|tr| tr.element("time-range"))
            .into_iter()
            .chain(self.prop_filters.iter().map(PropFilter::element));

        let vcalendar = Element::caldav("comp-filter").with_attr("name", "VCALENDAR");
        let vcalendar = match self.component {
            Some(component) => vcalendar.with_child(
                Element::caldav("comp-filter")
                    .with_attr("name", component.name())
                    .with_children(tests),
            ),
            None => vcalendar.with_children(tests),
        };

        Element::caldav("calendar-query")
            .with_child(prop)
            .with_child(Element::caldav("filter").with_child(vcalendar))
    }
}

/// Calendar multiget request builder.
#[derive(Debug, Default)]
pub struct CalendarMultiGetRequest {
    hrefs: Vec<String>,
}

impl CalendarMultiGetRequest {
    /// Creates a new calendar multiget request.
    #[must_use]
    pub const fn new() -> Self {
        Self { hrefs: Vec::new() }
    }

    /// Adds an href to the request.
    pub fn add_href(&mut self, href: String) -> &mut Self {
        self.hrefs.push(href);
        self
    }

    /// Builds the `calendar-multiget` body.
    #[must_use]
    pub fn build(&self) -> Element {
        Element::caldav("calendar-multiget")
            .with_child(
                Element::dav("prop")
                    .with_child(Element::dav("getetag"))
                    .with_child(Element::caldav("calendar-data")),
            )
            .with_children(
                self.hrefs
                    .iter()
                    .map(|href| Element::dav("href").with_text(href.clone())),
            )
    }
}

/// Free/busy query request builder.
#[derive(Debug, Clone, Copy)]
pub struct FreeBusyQueryRequest {
    range: TimeRange,
}

impl FreeBusyQueryRequest {
    /// Creates a new free/busy query request.
    #[must_use]
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            range: TimeRange {
                start,
                end: Some(end),
            },
        }
    }

    /// Builds the `free-busy-query` body.
    #[must_use]
    pub fn build(&self) -> Element {
        Element::caldav("free-busy-query").with_child(self.range.element("time-range"))
    }
}

/// MKCALENDAR request builder.
#[derive(Debug, Default)]
pub struct MkCalendarRequest {
    display_name: Option<String>,
    components: Vec<ComponentKind>,
}

impl MkCalendarRequest {
    /// Creates a MKCALENDAR request without properties.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            display_name: None,
            components: Vec::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Restricts the component types the calendar accepts.
    #[must_use]
    pub fn components(mut self, components: &[ComponentKind]) -> Self {
        self.components = components.to_vec();
        self
    }

    /// Builds the `mkcalendar` body.
    #[must_use]
    pub fn build(&self) -> Element {
        let mut prop = Element::dav("prop");
        if let Some(name) = &self.display_name {
            prop = prop.with_child(Element::dav("displayname").with_text(name.clone()));
        }
        if !self.components.is_empty() {
            prop = prop.with_child(
                Element::caldav("supported-calendar-component-set").with_children(
                    self.components
                        .iter()
                        .map(|c| Element::caldav("comp").with_attr("name", c.name())),
                ),
            );
        }
        Element::caldav("mkcalendar").with_child(Element::dav("set").with_child(prop))
    }
}
