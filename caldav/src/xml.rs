// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML element model for WebDAV/CalDAV processing.
//!
//! A small namespaced tree used both to build request bodies and to hold
//! parsed response fragments. Elements outside the known vocabularies are
//! kept as they are rather than rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesRef, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::{Writer, escape};

use crate::compat::QuirkSet;
use crate::error::CalDavError;

/// XML namespaces used in `CalDAV`.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CalDAV` namespace.
    pub const CALDAV: &str = "urn:ietf:params:xml:ns:caldav";

    /// Calendar server extensions (ctag, scheduling).
    pub const CALENDARSERVER: &str = "http://calendarserver.org/ns/";

    /// Apple iCal extensions (calendar color and order).
    pub const ICAL: &str = "http://apple.com/ns/ical/";
}

const fn known_prefix(namespace: &str) -> Option<&'static str> {
    match namespace.as_bytes() {
        b"DAV:" => Some("D"),
        b"urn:ietf:params:xml:ns:caldav" => Some("C"),
        b"http://calendarserver.org/ns/" => Some("CS"),
        b"http://apple.com/ns/ical/" => Some("I"),
        _ => None,
    }
}

/// Namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementName {
    /// Namespace URI; empty when unbound.
    pub namespace: String,
    /// Local name.
    pub local: String,
}

impl ElementName {
    /// Creates a name in the given namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// Creates a name in the `DAV:` namespace.
    #[must_use]
    pub fn dav(local: impl Into<String>) -> Self {
        Self::new(ns::DAV, local)
    }

    /// Creates a name in the `CalDAV` namespace.
    #[must_use]
    pub fn caldav(local: impl Into<String>) -> Self {
        Self::new(ns::CALDAV, local)
    }

    /// Whether this is `{namespace}local`.
    #[must_use]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }
}

impl fmt::Display for ElementName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local)
    }
}

/// A node of the XML tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name.
    pub name: ElementName,
    /// Attributes, keyed by local name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// Character data directly inside this element.
    pub text: String,
}

impl Element {
    /// Creates an empty element.
    #[must_use]
    pub const fn new(name: ElementName) -> Self {
        Self {
            name,
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Creates an empty element in the `DAV:` namespace.
    #[must_use]
    pub fn dav(local: &str) -> Self {
        Self::new(ElementName::dav(local))
    }

    /// Creates an empty element in the `CalDAV` namespace.
    #[must_use]
    pub fn caldav(local: &str) -> Self {
        Self::new(ElementName::caldav(local))
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Appends several child elements.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// Sets the character data.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Whether this element is `{namespace}local`.
    #[must_use]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.name.is(namespace, local)
    }

    /// First direct child with the given name.
    #[must_use]
    pub fn child(&self, namespace: &str, local: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.is(namespace, local))
    }

    /// Direct children with the given name.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.is(namespace, local))
    }

    /// First descendant (depth first, self excluded) with the given name.
    #[must_use]
    pub fn find(&self, namespace: &str, local: &str) -> Option<&Self> {
        self.children.iter().find_map(|c| {
            if c.is(namespace, local) {
                Some(c)
            } else {
                c.find(namespace, local)
            }
        })
    }

    /// Attribute value by local name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Character data with surrounding whitespace removed.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Serializes the element as a standalone document using RFC spellings.
    ///
    /// # Errors
    ///
    /// Returns an error if XML writing fails.
    pub fn to_xml(&self) -> Result<String, CalDavError> {
        self.serialize(&QuirkSet::default())
    }

    /// Serializes the element as a standalone document.
    ///
    /// Only namespaces used somewhere in the tree are declared, all on the
    /// root element. Attribute values with a known cross-server spelling
    /// ambiguity are rewritten according to `quirks`.
    ///
    /// # Errors
    ///
    /// Returns an error if XML writing fails.
    pub fn serialize(&self, quirks: &QuirkSet) -> Result<String, CalDavError> {
        let mut prefixes = Prefixes::default();
        prefixes.collect(self);

        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        write_element(&mut writer, self, &prefixes, true, quirks)?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| CalDavError::decode(format!("UTF-8 error: {e}")))
    }

    /// Parses a document into its root element.
    ///
    /// Default and prefixed namespace declarations are both accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::ProtocolDecode`] if the document is not
    /// well-formed, uses an undeclared prefix or has no root element.
    pub fn parse(xml: &str) -> Result<Self, CalDavError> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().check_end_names = true;

        let mut stack: Vec<Self> = Vec::new();
        let mut root: Option<Self> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = namespace_of(&resolved)?;
            match event {
                Event::Start(e) => {
                    let element = start_element(&reader, namespace, &e)?;
                    stack.push(element);
                }
                Event::Empty(e) => {
                    let element = start_element(&reader, namespace, &e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| CalDavError::decode("unbalanced end tag"))?;
                    if element.text.trim().is_empty() {
                        element.text.clear();
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&e.decode().map_err(quick_xml::Error::from)?);
                    }
                }
                Event::CData(e) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::GeneralRef(e) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&resolve_reference(&e)?);
                    }
                }
                Event::Eof => break,
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
            }
        }

        if !stack.is_empty() {
            return Err(CalDavError::decode("unexpected end of document"));
        }
        root.ok_or_else(|| CalDavError::decode("document has no root element"))
    }
}

/// Namespace to prefix assignment for one document.
#[derive(Debug, Default)]
struct Prefixes {
    bindings: Vec<(String, String)>,
}

impl Prefixes {
    fn collect(&mut self, element: &Element) {
        let namespace = &element.name.namespace;
        if !namespace.is_empty() && !self.bindings.iter().any(|(ns, _)| ns == namespace) {
            let prefix = known_prefix(namespace)
                .map_or_else(|| format!("x{}", self.bindings.len()), str::to_string);
            self.bindings.push((namespace.clone(), prefix));
        }
        for child in &element.children {
            self.collect(child);
        }
    }

    fn qualify(&self, name: &ElementName) -> String {
        self.bindings
            .iter()
            .find(|(ns, _)| *ns == name.namespace)
            .map_or_else(
                || name.local.clone(),
                |(_, prefix)| format!("{prefix}:{}", name.local),
            )
    }
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    element: &Element,
    prefixes: &Prefixes,
    declare: bool,
    quirks: &QuirkSet,
) -> Result<(), CalDavError> {
    let qname = prefixes.qualify(&element.name);
    let mut start = BytesStart::new(qname.clone());

    if declare {
        for (namespace, prefix) in &prefixes.bindings {
            start.push_attribute((format!("xmlns:{prefix}").as_str(), namespace.as_str()));
        }
    }
    for (key, value) in &element.attributes {
        let value = match key.as_str() {
            "collation" => quirks.collation(value),
            _ => value.as_str().into(),
        };
        start.push_attribute((key.as_str(), value.as_ref()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child, prefixes, false, quirks)?;
    }
    writer.write_event(Event::End(BytesEnd::new(qname)))?;
    Ok(())
}

fn namespace_of(resolved: &ResolveResult<'_>) -> Result<String, CalDavError> {
    match resolved {
        ResolveResult::Bound(namespace) => Ok(String::from_utf8_lossy(namespace.0).into_owned()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(CalDavError::decode(format!(
            "undeclared namespace prefix `{}`",
            String::from_utf8_lossy(prefix)
        ))),
    }
}

fn start_element(
    reader: &NsReader<&[u8]>,
    namespace: String,
    start: &BytesStart<'_>,
) -> Result<Element, CalDavError> {
    let local = String::from_utf8_lossy(start.local_name().into_inner()).into_owned();
    let mut element = Element::new(ElementName::new(namespace, local));

    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = attr.key;
        if key.as_namespace_binding().is_some() {
            continue;
        }
        let (_, local) = reader.resolver().resolve_attribute(key);
        let name = String::from_utf8_lossy(local.into_inner()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.insert(name, value);
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), CalDavError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(CalDavError::decode("multiple root elements")),
    }
    Ok(())
}

fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, CalDavError> {
    if reference.is_char_ref() {
        return reference
            .resolve_char_ref()?
            .map(String::from)
            .ok_or_else(|| CalDavError::decode("invalid character reference"));
    }

    let name = reference.decode().map_err(quick_xml::Error::from)?;
    escape::resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| CalDavError::decode(format!("unknown entity `&{name};`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_declares_only_used_namespaces() {
        let xml = Element::dav("propfind")
            .with_child(Element::dav("prop").with_child(Element::dav("displayname")))
            .to_xml()
            .unwrap();

        assert!(xml.contains(r#"<D:propfind xmlns:D="DAV:">"#));
        assert!(xml.contains("<D:displayname/>"));
        assert!(!xml.contains("xmlns:C"));
    }

    #[test]
    fn xml_assigns_prefix_to_unknown_namespace() {
        let xml = Element::dav("prop")
            .with_child(Element::new(ElementName::new("urn:example", "color")))
            .to_xml()
            .unwrap();

        assert!(xml.contains(r#"xmlns:x1="urn:example""#));
        assert!(xml.contains("<x1:color/>"));
    }

    #[test]
    fn xml_parses_default_namespace() {
        let root = Element::parse(
            r#"<multistatus xmlns="DAV:"><response><href>/a/</href></response></multistatus>"#,
        )
        .unwrap();

        assert!(root.is(ns::DAV, "multistatus"));
        let href = root.find(ns::DAV, "href").unwrap();
        assert_eq!(href.text(), "/a/");
    }

    #[test]
    fn xml_keeps_unknown_elements() {
        let root = Element::parse(
            r#"<D:prop xmlns:D="DAV:" xmlns:X="urn:vendor"><X:thing kind="a">v</X:thing></D:prop>"#,
        )
        .unwrap();

        let thing = root.child("urn:vendor", "thing").unwrap();
        assert_eq!(thing.attr("kind"), Some("a"));
        assert_eq!(thing.text(), "v");
    }

    #[test]
    fn xml_attributes_keyed_by_local_name() {
        let root = Element::parse(
            r#"<C:comp xmlns:C="urn:ietf:params:xml:ns:caldav" xmlns:X="urn:vendor" name="VTODO" X:color="red"/>"#,
        )
        .unwrap();

        assert!(root.is(ns::CALDAV, "comp"));
        assert_eq!(root.attr("name"), Some("VTODO"));
        assert_eq!(root.attr("color"), Some("red"));
        assert_eq!(root.attributes.len(), 2);
    }

    #[test]
    fn xml_resolves_entities_and_cdata() {
        let root = Element::parse(
            "<D:href xmlns:D=\"DAV:\">a &amp; b &#x41;<![CDATA[<c>]]></D:href>",
        )
        .unwrap();

        assert_eq!(root.text(), "a & b A<c>");
    }

    #[test]
    fn xml_round_trip_preserves_tree() {
        let original = Element::caldav("calendar-query").with_child(
            Element::caldav("filter").with_child(
                Element::caldav("comp-filter")
                    .with_attr("name", "VCALENDAR")
                    .with_child(Element::caldav("text-match").with_text("x < y & z")),
            ),
        );

        let parsed = Element::parse(&original.to_xml().unwrap()).unwrap();

        assert_eq!(parsed, original);
    }

    #[test]
    fn xml_rejects_malformed_documents() {
        assert!(matches!(
            Element::parse("<D:prop xmlns:D=\"DAV:\"><D:x></D:prop>"),
            Err(CalDavError::ProtocolDecode { .. })
        ));
        assert!(matches!(
            Element::parse("<Z:prop/>"),
            Err(CalDavError::ProtocolDecode { .. })
        ));
        assert!(matches!(
            Element::parse(""),
            Err(CalDavError::ProtocolDecode { .. })
        ));
    }
}
