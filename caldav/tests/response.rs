// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsing tests.

use davcal_caldav::{ComponentKind, ElementName, MultiStatusResponse, ns, parse_status_line};

#[test]
fn response_parse_multistatus_basic() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\">
  <D:response>
    <D:href>/calendars/user/event1.ics</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>\"12345\"</D:getetag>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");

    assert_eq!(response.len(), 1);
    let item = &response.responses[0];
    assert_eq!(item.href, "/calendars/user/event1.ics");
    assert_eq!(item.prop_stats.len(), 1);
    assert_eq!(item.prop_stats[0].status, Some(200));
    assert!(!item.is_failure());
    assert_eq!(
        item.properties().etag().as_deref(),
        Some("\"12345\"")
    );
}

#[test]
fn response_parse_calendar_collection() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\" xmlns:CS=\"http://calendarserver.org/ns/\">
  <D:response>
    <D:href>/calendars/user/personal/</D:href>
    <D:propstat>
      <D:prop>
        <D:displayname>Personal Calendar</D:displayname>
        <D:resourcetype>
          <D:collection/>
          <C:calendar/>
        </D:resourcetype>
        <C:supported-calendar-component-set>
          <C:comp name=\"VEVENT\"/>
          <C:comp name=\"VTODO\"/>
        </C:supported-calendar-component-set>
        <CS:getctag>ctag-42</CS:getctag>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");
    let props = response.responses[0].properties();

    assert_eq!(props.display_name(), Some("Personal Calendar"));
    assert!(props.is_calendar());
    assert!(props.is_collection());
    assert_eq!(
        props.supported_components(),
        vec![ComponentKind::Event, ComponentKind::Todo]
    );
    assert_eq!(props.ctag(), Some("ctag-42"));
}

#[test]
fn response_parse_default_namespace() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<multistatus xmlns=\"DAV:\">
  <response>
    <href>/calendars/user/</href>
    <propstat>
      <prop>
        <displayname>Home</displayname>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");
    assert_eq!(response.responses[0].properties().display_name(), Some("Home"));
}

#[test]
fn response_parse_mixed_propstat() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">
  <D:response>
    <D:href>/calendars/user/work/</D:href>
    <D:propstat>
      <D:prop>
        <D:displayname>Work</D:displayname>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
    <D:propstat>
      <D:prop>
        <C:calendar-description/>
      </D:prop>
      <D:status>HTTP/1.1 404 Not Found</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");
    let item = &response.responses[0];

    assert!(!item.is_failure());
    let props = item.properties();
    assert_eq!(props.len(), 1);
    assert_eq!(props.description(), None);
    assert_eq!(
        item.status_of(&ElementName::caldav("calendar-description")),
        Some(404)
    );
    assert_eq!(item.status_of(&ElementName::dav("displayname")), Some(200));
}

#[test]
fn response_parse_resource_failure() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\">
  <D:response>
    <D:href>/calendars/user/gone.ics</D:href>
    <D:status>HTTP/1.1 404 Not Found</D:status>
  </D:response>
  <D:response>
    <D:href>/calendars/user/locked.ics</D:href>
    <D:propstat>
      <D:prop><D:getetag/></D:prop>
      <D:status>HTTP/1.1 403 Forbidden</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");

    assert!(response.responses[0].is_failure());
    assert_eq!(response.responses[0].failure_status(), Some(404));
    assert!(response.responses[1].is_failure());
    assert_eq!(response.responses[1].failure_status(), Some(403));
    assert!(response.responses[1].properties().is_empty());
}

#[test]
fn response_parse_calendar_data_with_entities() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">
  <D:response>
    <D:href>/calendars/user/work/a.ics</D:href>
    <D:propstat>
      <D:prop>
        <C:calendar-data>BEGIN:VCALENDAR
BEGIN:VEVENT
UID:a
SUMMARY:Fish &amp; chips
END:VEVENT
END:VCALENDAR</C:calendar-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");
    let props = response.responses[0].properties();
    let data = props.calendar_data().expect("calendar data");

    assert!(data.starts_with("BEGIN:VCALENDAR"));
    assert!(data.contains("SUMMARY:Fish & chips"));
}

#[test]
fn response_parse_cdata_calendar_data() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">
  <D:response>
    <D:href>/calendars/user/work/b.ics</D:href>
    <D:propstat>
      <D:prop>
        <C:calendar-data><![CDATA[BEGIN:VCALENDAR
BEGIN:VTODO
UID:b
END:VTODO
END:VCALENDAR]]></C:calendar-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");
    let props = response.responses[0].properties();
    assert!(props.calendar_data().is_some_and(|d| d.contains("UID:b")));
}

#[test]
fn response_calendar_data_keeps_line_endings() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">
  <D:response>
    <D:href>/calendars/user/work/c.ics</D:href>
    <D:propstat>
      <D:prop>
        <C:calendar-data>BEGIN:VCALENDAR&#13;
UID:c&#13;
END:VCALENDAR&#13;
</C:calendar-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/calendars/user/work/d.ics</D:href>
    <D:propstat>
      <D:prop>
        <C:calendar-data>
          BEGIN:VCALENDAR
UID:d
END:VCALENDAR
        </C:calendar-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");

    let crlf = response.responses[0].properties();
    assert_eq!(
        crlf.calendar_data(),
        Some("BEGIN:VCALENDAR\r\nUID:c\r\nEND:VCALENDAR\r\n")
    );

    let indented = response.responses[1].properties();
    assert_eq!(
        indented.calendar_data(),
        Some("BEGIN:VCALENDAR\nUID:d\nEND:VCALENDAR\n")
    );
}

#[test]
fn response_non_multistatus_root_is_empty() {
    let xml = "<?xml version=\"1.0\"?><D:error xmlns:D=\"DAV:\"><D:need-privileges/></D:error>";
    let response = MultiStatusResponse::from_xml(xml).expect("well-formed document");
    assert!(response.is_empty());

    assert!(MultiStatusResponse::from_xml("").expect("empty body").is_empty());
}

#[test]
fn response_malformed_xml_is_decode_error() {
    let err = MultiStatusResponse::from_xml("<D:multistatus xmlns:D=\"DAV:\"><D:response>")
        .expect_err("truncated document");
    assert!(matches!(err, davcal_caldav::CalDavError::ProtocolDecode { .. }));

    let err = MultiStatusResponse::from_xml("<X:multistatus/>").expect_err("undeclared prefix");
    assert!(matches!(err, davcal_caldav::CalDavError::ProtocolDecode { .. }));
}

#[test]
fn response_without_href_is_decode_error() {
    let xml = "<D:multistatus xmlns:D=\"DAV:\"><D:response><D:status>HTTP/1.1 200 OK</D:status></D:response></D:multistatus>";
    assert!(MultiStatusResponse::from_xml(xml).is_err());
}

#[test]
fn response_status_line() {
    assert_eq!(parse_status_line("HTTP/1.1 200 OK"), Some(200));
    assert_eq!(parse_status_line("HTTP/1.1 404 Not Found"), Some(404));
    assert_eq!(parse_status_line("garbage"), None);
    assert_eq!(ns::DAV, "DAV:");
}
