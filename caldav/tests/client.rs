// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Protocol client tests with wiremock.

use davcal_caldav::{
    AuthMethod, CALENDAR_CONTENT_TYPE, CalDavConfig, CalDavError, CalendarQueryRequest,
    ComponentKind, DavClient, Depth, ETag, Element, Locator, Precondition, Prop, PropPatchRequest,
    Quirk, ServerFamily, Verb,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENT: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:e1\r\nSUMMARY:Lunch\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

fn client(server: &MockServer, config: CalDavConfig) -> DavClient {
    DavClient::new(&CalDavConfig {
        base_url: format!("{}/dav/", server.uri()),
        ..config
    })
    .expect("Failed to create client")
}

fn loc(s: &str) -> Locator {
    s.parse().expect("valid locator")
}

#[tokio::test]
async fn client_propfind_sends_depth_and_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/dav/calendars/user/"))
        .and(header("Content-Type", "application/xml; charset=utf-8"))
        .and(header("Depth", "1"))
        .and(body_string_contains("<D:displayname/>"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/dav/calendars/user/</D:href>
    <D:propstat>
      <D:prop><D:displayname>Home</D:displayname></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#,
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, CalDavConfig::default());
    let ms = client
        .propfind(&loc("/dav/calendars/user/"), &[Prop::DisplayName], Depth::One)
        .await
        .expect("Failed to propfind");

    assert_eq!(ms.len(), 1);
    assert_eq!(ms.responses[0].properties().display_name(), Some("Home"));
}

#[tokio::test]
async fn client_basic_auth_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dav/cal/e1.ics"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .and(header("Accept", "text/calendar"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"v1\"")
                .set_body_string(EVENT),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = CalDavConfig {
        auth: AuthMethod::Basic {
            username: "user".to_string(),
            password: "pass".to_string(),
        },
        ..Default::default()
    };
    let outcome = client(&server, config)
        .get(&loc("/dav/cal/e1.ics"))
        .await
        .expect("Failed to get");

    assert_eq!(outcome.body, EVENT);
    assert_eq!(outcome.etag, Some(ETag::from("\"v1\"")));
}

#[tokio::test]
async fn client_bearer_auth_header() {
    let server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .and(path("/dav/"))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("DAV", "1, 2, access-control, calendar-access"),
        )
        .mount(&server)
        .await;

    let config = CalDavConfig {
        auth: AuthMethod::Bearer {
            token: "secret-token".to_string(),
        },
        ..Default::default()
    };
    let client = client(&server, config);

    let classes = client.options(client.base()).await.expect("Failed to query options");
    assert_eq!(classes, vec!["1", "2", "access-control", "calendar-access"]);
    assert!(client.supports_calendar_access().await.expect("Failed to query options"));
}

#[tokio::test]
async fn client_unauthorized_is_authorization_error() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server, CalDavConfig::default())
        .propfind(&loc("/dav/calendars/"), &[Prop::DisplayName], Depth::Zero)
        .await
        .expect_err("401 must fail");

    assert!(matches!(
        err,
        CalDavError::Authorization {
            verb: Verb::Propfind,
            status: 401,
            ..
        }
    ));
    assert_eq!(err.status(), Some(401));
    assert!(err.href().is_some_and(|h| h.ends_with("/dav/calendars/")));
}

#[tokio::test]
async fn client_put_preconditions() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/dav/cal/new.ics"))
        .and(header("If-None-Match", "*"))
        .and(header("Content-Type", "text/calendar; charset=utf-8"))
        .respond_with(ResponseTemplate::new(201).insert_header("ETag", "\"v1\""))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/dav/cal/old.ics"))
        .and(header("If-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(412).insert_header("ETag", "\"v2\""))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, CalDavConfig::default());

    let created = client
        .put(
            &loc("/dav/cal/new.ics"),
            EVENT,
            CALENDAR_CONTENT_TYPE,
            &Precondition::IfNoneMatchAny,
        )
        .await
        .expect("Failed to put");
    assert_eq!(created.status, 201);
    assert_eq!(created.etag, Some(ETag::from("\"v1\"")));
    assert!(created.location.is_none());

    let err = client
        .put(
            &loc("/dav/cal/old.ics"),
            EVENT,
            CALENDAR_CONTENT_TYPE,
            &Precondition::IfMatch(ETag::from("\"v1\"")),
        )
        .await
        .expect_err("412 must fail");
    match err {
        CalDavError::PreconditionFailed { href, etag } => {
            assert!(href.ends_with("/dav/cal/old.ics"));
            assert_eq!(etag.as_deref(), Some("\"v2\""));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn client_put_redirect_needs_quirk() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/dav/cal/e1.ics"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/dav/cal/moved-e1.ics"),
        )
        .mount(&server)
        .await;

    let strict = client(&server, CalDavConfig::default());
    let err = strict
        .put(&loc("/dav/cal/e1.ics"), EVENT, "text/calendar", &Precondition::None)
        .await
        .expect_err("302 is not a success by default");
    assert_eq!(err.status(), Some(302));

    let zimbra = client(
        &server,
        CalDavConfig {
            server: Some(ServerFamily::Zimbra),
            ..Default::default()
        },
    );
    let outcome = zimbra
        .put(&loc("/dav/cal/e1.ics"), EVENT, "text/calendar", &Precondition::None)
        .await
        .expect("302 accepted under the redirect rule");
    assert_eq!(outcome.status, 302);
    let location = outcome.location.expect("location");
    assert_eq!(location.path(), "/dav/cal/moved-e1.ics");
}

#[tokio::test]
async fn client_delete_not_found_needs_quirk() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/dav/cal/gone.ics"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let strict = client(&server, CalDavConfig::default());
    let err = strict
        .delete(&loc("/dav/cal/gone.ics"), None)
        .await
        .expect_err("404 is not a success by default");
    assert!(matches!(err, CalDavError::NotFound { status: Some(404), .. }));

    let lenient = client(
        &server,
        CalDavConfig {
            quirks: vec![Quirk::DeleteNotFoundIsSuccess],
            ..Default::default()
        },
    );
    lenient
        .delete(&loc("/dav/cal/gone.ics"), None)
        .await
        .expect("404 accepted under the delete rule");
}

#[tokio::test]
async fn client_delete_sends_if_match() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/dav/cal/e1.ics"))
        .and(header("If-Match", "\"v3\""))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, CalDavConfig::default())
        .delete(&loc("/dav/cal/e1.ics"), Some(&ETag::from("\"v3\"")))
        .await
        .expect("Failed to delete");
}

#[tokio::test]
async fn client_delete_multistatus_failure() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/dav/cal/"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/dav/cal/locked.ics</D:href>
    <D:status>HTTP/1.1 423 Locked</D:status>
  </D:response>
</D:multistatus>"#,
            "application/xml",
        ))
        .mount(&server)
        .await;

    let err = client(&server, CalDavConfig::default())
        .delete(&loc("/dav/cal/"), None)
        .await
        .expect_err("member failure must surface");
    assert_eq!(err.status(), Some(423));
    assert_eq!(err.href(), Some("/dav/cal/locked.ics"));
}

#[tokio::test]
async fn client_report_sends_query() {
    let server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/dav/cal/"))
        .and(header("Depth", "1"))
        .and(body_string_contains("<C:calendar-query"))
        .and(body_string_contains("name=\"VTODO\""))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:response>
    <D:href>/dav/cal/t1.ics</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>"t1"</D:getetag>
        <C:calendar-data>BEGIN:VCALENDAR
BEGIN:VTODO
UID:t1
END:VTODO
END:VCALENDAR</C:calendar-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#,
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let query = CalendarQueryRequest::new().component(ComponentKind::Todo);
    let ms = client(&server, CalDavConfig::default())
        .report(&loc("/dav/cal/"), &query.build(), Depth::One)
        .await
        .expect("Failed to report");

    let props = ms.responses[0].properties();
    assert_eq!(props.etag(), Some(ETag::from("\"t1\"")));
    assert!(props.calendar_data().is_some_and(|d| d.contains("UID:t1")));
}

#[tokio::test]
async fn client_proppatch_refused_property() {
    let server = MockServer::start().await;

    Mock::given(method("PROPPATCH"))
        .and(path("/dav/cal/"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/dav/cal/</D:href>
    <D:propstat>
      <D:prop><D:displayname/></D:prop>
      <D:status>HTTP/1.1 403 Forbidden</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#,
            "application/xml",
        ))
        .mount(&server)
        .await;

    let request = PropPatchRequest::new().set(Element::dav("displayname").with_text("New"));
    let err = client(&server, CalDavConfig::default())
        .proppatch(&loc("/dav/cal/"), &request)
        .await
        .expect_err("refused update must fail");

    assert!(matches!(
        err,
        CalDavError::Request {
            verb: Verb::Proppatch,
            status: 403,
            ..
        }
    ));
}

#[tokio::test]
async fn client_server_error_keeps_body() {
    let server = MockServer::start().await;

    Mock::given(method("MKCALENDAR"))
        .and(path("/dav/cal/"))
        .respond_with(ResponseTemplate::new(507).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = client(&server, CalDavConfig::default())
        .mkcalendar(&loc("/dav/cal/"), Some("Cal"), &[ComponentKind::Event])
        .await
        .expect_err("507 must fail");

    match err {
        CalDavError::Request {
            verb, status, body, ..
        } => {
            assert_eq!(verb, Verb::Mkcalendar);
            assert_eq!(status, 507);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn client_malformed_multistatus_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .respond_with(
            ResponseTemplate::new(207)
                .set_body_raw("<D:multistatus xmlns:D=\"DAV:\"><D:response>", "application/xml"),
        )
        .mount(&server)
        .await;

    let err = client(&server, CalDavConfig::default())
        .propfind(&loc("/dav/cal/"), &[], Depth::Zero)
        .await
        .expect_err("truncated body must fail");

    match err {
        CalDavError::ProtocolDecode { href, .. } => {
            assert!(href.is_some_and(|h| h.contains("cal/")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn client_rejects_relative_base() {
    let err = DavClient::new(&CalDavConfig {
        base_url: "dav/".to_string(),
        ..Default::default()
    })
    .expect_err("relative base must be rejected");
    assert!(matches!(err, CalDavError::Config(_)));
}

#[tokio::test]
async fn client_transport_error_keeps_source() {
    // Reserve a port, then free it so nothing listens there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("Failed to read address").port();
    drop(listener);
    let base_url = format!("http://127.0.0.1:{port}/dav/");

    let client = DavClient::new(&CalDavConfig {
        base_url,
        ..Default::default()
    })
    .expect("Failed to create client");

    let err = client
        .propfind(&loc("/dav/"), &[Prop::DisplayName], Depth::Zero)
        .await
        .expect_err("nothing listens on the port");
    assert!(matches!(err, CalDavError::Transport(_)));
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(err.status(), None);
}
