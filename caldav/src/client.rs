// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Protocol client: one method per DAV verb.

use std::sync::Arc;

use url::Url;

use crate::compat::QuirkSet;
use crate::config::CalDavConfig;
use crate::error::CalDavError;
use crate::http::{DavRequest, DavResponse, HttpTransport, Transport, Verb};
use crate::request::{MkCalendarRequest, Prop, PropFindRequest, PropPatchRequest};
use crate::response::MultiStatusResponse;
use crate::tree::Principal;
use crate::types::{ComponentKind, Depth, ETag};
use crate::url::Locator;
use crate::xml::Element;

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const XML_ACCEPT: &str = "application/xml, text/xml";

/// Content type of calendar object bodies.
pub const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Entity-tag precondition of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional.
    None,
    /// `If-Match: <etag>`: the resource must still have this entity tag.
    IfMatch(ETag),
    /// `If-Match: *`: the resource must exist.
    IfMatchAny,
    /// `If-None-Match: *`: the resource must not exist yet.
    IfNoneMatchAny,
}

/// Outcome of a successful PUT.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    /// HTTP status.
    pub status: u16,
    /// New entity tag, when the server reported one.
    pub etag: Option<ETag>,
    /// Where the server says the object now lives, when it said so.
    pub location: Option<Locator>,
}

/// Outcome of a successful GET.
#[derive(Debug, Clone)]
pub struct GetOutcome {
    /// Response body.
    pub body: String,
    /// Entity tag, when the server reported one.
    pub etag: Option<ETag>,
}

/// `CalDAV` protocol client.
///
/// Cheap to clone; every clone shares the same transport. The client keeps
/// no session state, so every method is one round trip and nothing is
/// retried.
///
/// # Example
///
/// ```ignore
/// use davcal_caldav::{AuthMethod, CalDavConfig, DavClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CalDavConfig {
///     base_url: "https://caldav.example.com/dav/".to_string(),
///     auth: AuthMethod::Basic {
///         username: "user".to_string(),
///         password: "pass".to_string(),
///     },
///     ..Default::default()
/// };
///
/// let client = DavClient::new(&config)?;
/// let mut principal = client.principal().await?;
/// let calendars = principal.calendars().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DavClient {
    transport: Arc<dyn Transport>,
    base: Locator,
    quirks: QuirkSet,
    calendar_home: Option<Locator>,
}

impl DavClient {
    /// Creates a client with the bundled HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not absolute or HTTP client
    /// initialization fails.
    pub fn new(config: &CalDavConfig) -> Result<Self, CalDavError> {
        let base = Locator::parse(&config.base_url)?;
        let transport = HttpTransport::new(config)?;
        let mut client = Self::with_transport(base, Arc::new(transport), config.quirk_set())?;
        if let Some(home) = &config.calendar_home {
            client.calendar_home = Some(client.base.join(home)?);
        }
        Ok(client)
    }

    /// Creates a client over any transport.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Config`] if `base` is not an absolute URL.
    pub fn with_transport(
        base: Locator,
        transport: Arc<dyn Transport>,
        quirks: QuirkSet,
    ) -> Result<Self, CalDavError> {
        if !base.is_absolute() {
            return Err(CalDavError::Config(format!(
                "base URL must be absolute, got `{base}`"
            )));
        }
        Ok(Self {
            transport,
            base,
            quirks,
            calendar_home: None,
        })
    }

    /// Uses a known calendar home instead of discovering it.
    #[must_use]
    pub fn with_calendar_home(mut self, home: Locator) -> Self {
        self.calendar_home = Some(home);
        self
    }

    /// Base locator all relative locators resolve against.
    #[must_use]
    pub const fn base(&self) -> &Locator {
        &self.base
    }

    /// Compatibility rules in effect.
    #[must_use]
    pub const fn quirks(&self) -> &QuirkSet {
        &self.quirks
    }

    /// Configured calendar home, if any.
    #[must_use]
    pub const fn calendar_home(&self) -> Option<&Locator> {
        self.calendar_home.as_ref()
    }

    /// Discovers the principal of the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns an error if the PROPFIND on the base URL fails.
    pub async fn principal(&self) -> Result<Principal, CalDavError> {
        Principal::discover(self.clone()).await
    }

    /// Resolves a locator to the absolute URL requests are sent to.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::MalformedLocator`] if the locator cannot be resolved.
    pub fn resolve(&self, locator: &Locator) -> Result<Url, CalDavError> {
        locator.to_absolute(&self.base)
    }

    /// Whether two locators name the same resource once resolved against the base.
    #[must_use]
    pub fn same_resource(&self, a: &Locator, b: &Locator) -> bool {
        match (self.resolve(a), self.resolve(b)) {
            (Ok(a), Ok(b)) => Locator::absolute(a) == Locator::absolute(b),
            _ => a == b,
        }
    }

    /// Turns an href reported by the server into a locator.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::MalformedLocator`] if the href cannot be joined.
    pub fn locate(&self, base: &Locator, href: &str) -> Result<Locator, CalDavError> {
        base.join(&self.quirks.response_href(href))
    }

    /// Sends a PROPFIND.
    ///
    /// An empty property list asks for all properties.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status or an undecodable body.
    #[tracing::instrument(skip_all, fields(url = %locator, depth = ?depth))]
    pub async fn propfind(
        &self,
        locator: &Locator,
        props: &[Prop],
        depth: Depth,
    ) -> Result<MultiStatusResponse, CalDavError> {
        let body = props.iter().cloned().collect::<PropFindRequest>().build();
        self.multistatus(Verb::Propfind, locator, &body, Some(depth))
            .await
    }

    /// Sends a REPORT.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status or an undecodable body.
    #[tracing::instrument(skip_all, fields(url = %locator, depth = ?depth))]
    pub async fn report(
        &self,
        locator: &Locator,
        query: &Element,
        depth: Depth,
    ) -> Result<MultiStatusResponse, CalDavError> {
        self.multistatus(Verb::Report, locator, query, Some(depth))
            .await
    }

    /// Sends a REPORT and returns the body as is.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status.
    #[tracing::instrument(skip_all, fields(url = %locator, depth = ?depth))]
    pub async fn report_raw(
        &self,
        locator: &Locator,
        query: &Element,
        depth: Depth,
    ) -> Result<String, CalDavError> {
        let resp = self
            .xml_exchange(Verb::Report, locator, query, Some(depth))
            .await?;
        Ok(resp.body)
    }

    /// Creates a calendar collection.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status.
    #[tracing::instrument(skip_all, fields(url = %locator))]
    pub async fn mkcalendar(
        &self,
        locator: &Locator,
        display_name: Option<&str>,
        components: &[ComponentKind],
    ) -> Result<(), CalDavError> {
        let mut request = MkCalendarRequest::new().components(components);
        if let Some(name) = display_name {
            request = request.display_name(name);
        }
        self.xml_exchange(Verb::Mkcalendar, locator, &request.build(), None)
            .await?;
        Ok(())
    }

    /// Sends a PROPPATCH.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Request`] if any property update was refused.
    #[tracing::instrument(skip_all, fields(url = %locator))]
    pub async fn proppatch(
        &self,
        locator: &Locator,
        request: &PropPatchRequest,
    ) -> Result<(), CalDavError> {
        let ms = self
            .multistatus(Verb::Proppatch, locator, &request.build(), None)
            .await?;

        let refused = ms.responses.iter().find_map(|item| {
            item.prop_stats
                .iter()
                .find(|ps| !ps.is_success())
                .map(|ps| (item, ps.status.unwrap_or_default()))
        });
        match refused {
            Some((item, status)) => Err(CalDavError::Request {
                verb: Verb::Proppatch,
                href: item.href.clone(),
                status,
                body: String::new(),
            }),
            None => Ok(()),
        }
    }

    /// Stores a body at `locator`.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::PreconditionFailed`] if the precondition does
    /// not hold, or another error on a non-success status.
    #[tracing::instrument(skip_all, fields(url = %locator))]
    pub async fn put(
        &self,
        locator: &Locator,
        body: &str,
        content_type: &str,
        precondition: &Precondition,
    ) -> Result<PutOutcome, CalDavError> {
        let url = self.resolve(locator)?;
        let mut request = DavRequest::new(Verb::Put, url.clone())
            .header("Content-Type", content_type)
            .body(body);
        request = match precondition {
            Precondition::None => request,
            Precondition::IfMatch(etag) => request.header("If-Match", etag.as_str()),
            Precondition::IfMatchAny => request.header("If-Match", "*"),
            Precondition::IfNoneMatchAny => request.header("If-None-Match", "*"),
        };

        let resp = self.exchange(request).await?;
        self.check_status(Verb::Put, &url, &resp)?;

        let location = resp
            .header("Location")
            .map(|l| Locator::absolute(url.clone()).join(l))
            .transpose()?;
        Ok(PutOutcome {
            status: resp.status,
            etag: resp.header("ETag").map(ETag::from),
            location,
        })
    }

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status, including a multistatus
    /// reporting a member that could not be deleted.
    #[tracing::instrument(skip_all, fields(url = %locator))]
    pub async fn delete(
        &self,
        locator: &Locator,
        if_match: Option<&ETag>,
    ) -> Result<(), CalDavError> {
        let url = self.resolve(locator)?;
        let mut request = DavRequest::new(Verb::Delete, url.clone());
        if let Some(etag) = if_match {
            request = request.header("If-Match", etag.as_str());
        }

        let resp = self.exchange(request).await?;
        self.check_status(Verb::Delete, &url, &resp)?;

        if resp.status == 207 {
            let ms = MultiStatusResponse::from_xml(&resp.body).map_err(|e| e.with_href(locator))?;
            if let Some(item) = ms.responses.iter().find(|i| i.is_failure()) {
                let failed = DavResponse {
                    status: item.failure_status().unwrap_or_default(),
                    ..DavResponse::default()
                };
                return Err(status_error(Verb::Delete, item.href.clone(), &failed));
            }
        }
        Ok(())
    }

    /// Fetches a resource.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status.
    #[tracing::instrument(skip_all, fields(url = %locator))]
    pub async fn get(&self, locator: &Locator) -> Result<GetOutcome, CalDavError> {
        let url = self.resolve(locator)?;
        let request = DavRequest::new(Verb::Get, url.clone()).header("Accept", "text/calendar");

        let resp = self.exchange(request).await?;
        self.check_status(Verb::Get, &url, &resp)?;

        Ok(GetOutcome {
            etag: resp.header("ETag").map(ETag::from),
            body: resp.body,
        })
    }

    /// DAV compliance classes advertised for a resource.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status.
    #[tracing::instrument(skip_all, fields(url = %locator))]
    pub async fn options(&self, locator: &Locator) -> Result<Vec<String>, CalDavError> {
        let url = self.resolve(locator)?;
        let resp = self.exchange(DavRequest::new(Verb::Options, url.clone())).await?;
        self.check_status(Verb::Options, &url, &resp)?;

        Ok(resp
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("DAV"))
            .flat_map(|(_, value)| value.split(','))
            .map(|class| class.trim().to_string())
            .filter(|class| !class.is_empty())
            .collect())
    }

    /// Whether the server advertises `calendar-access` on the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status.
    pub async fn supports_calendar_access(&self) -> Result<bool, CalDavError> {
        let classes = self.options(&self.base).await?;
        Ok(classes.iter().any(|c| c == "calendar-access"))
    }

    async fn multistatus(
        &self,
        verb: Verb,
        locator: &Locator,
        body: &Element,
        depth: Option<Depth>,
    ) -> Result<MultiStatusResponse, CalDavError> {
        let resp = self.xml_exchange(verb, locator, body, depth).await?;
        MultiStatusResponse::from_xml(&resp.body).map_err(|e| e.with_href(locator))
    }

    async fn xml_exchange(
        &self,
        verb: Verb,
        locator: &Locator,
        body: &Element,
        depth: Option<Depth>,
    ) -> Result<DavResponse, CalDavError> {
        let url = self.resolve(locator)?;
        let mut request = DavRequest::new(verb, url.clone());
        if let Some(depth) = depth {
            request = request.header("Depth", depth.as_str());
        }
        request = request
            .header("Content-Type", XML_CONTENT_TYPE)
            .header("Accept", XML_ACCEPT)
            .body(body.serialize(&self.quirks)?);

        let resp = self.exchange(request).await?;
        self.check_status(verb, &url, &resp)?;
        Ok(resp)
    }

    async fn exchange(&self, request: DavRequest) -> Result<DavResponse, CalDavError> {
        let verb = request.verb;
        let url = request.url.clone();
        tracing::debug!(%verb, %url, "sending request");
        let resp = self.transport.execute(request).await?;
        tracing::debug!(%verb, %url, status = resp.status, "received response");
        Ok(resp)
    }

    fn check_status(&self, verb: Verb, url: &Url, resp: &DavResponse) -> Result<(), CalDavError> {
        if resp.is_success() {
            return Ok(());
        }
        if let Some(quirk) = self.quirks.accepts_status(verb, resp.status) {
            tracing::warn!(
                %verb,
                %url,
                status = resp.status,
                %quirk,
                "accepting status under compatibility rule"
            );
            return Ok(());
        }
        Err(status_error(verb, url.to_string(), resp))
    }
}

fn status_error(verb: Verb, href: String, resp: &DavResponse) -> CalDavError {
    match resp.status {
        401 | 403 => CalDavError::Authorization {
            verb,
            href,
            status: resp.status,
        },
        404 => CalDavError::NotFound {
            href,
            status: Some(404),
        },
        412 => CalDavError::PreconditionFailed {
            href,
            etag: resp.header("ETag").map(str::to_string),
        },
        status => CalDavError::Request {
            verb,
            href,
            status,
            body: resp.body.clone(),
        },
    }
}
