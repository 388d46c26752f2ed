// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Transport boundary and the reqwest-based HTTP transport.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use url::Url;

use crate::config::{AuthMethod, CalDavConfig};
use crate::error::CalDavError;

/// HTTP verbs used by the `CalDAV` client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// GET.
    Get,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
    /// PROPFIND.
    Propfind,
    /// PROPPATCH.
    Proppatch,
    /// REPORT.
    Report,
    /// MKCALENDAR.
    Mkcalendar,
    /// OPTIONS.
    Options,
}

impl Verb {
    /// Method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Propfind => "PROPFIND",
            Self::Proppatch => "PROPPATCH",
            Self::Report => "REPORT",
            Self::Mkcalendar => "MKCALENDAR",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HTTP exchange to perform.
#[derive(Debug, Clone)]
pub struct DavRequest {
    /// Method.
    pub verb: Verb,
    /// Absolute target URL.
    pub url: Url,
    /// Header name/value pairs, names spelled as they must be sent.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<String>,
}

impl DavRequest {
    /// Creates a request without headers or body.
    #[must_use]
    pub const fn new(verb: Verb, url: Url) -> Self {
        Self {
            verb,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Outcome of an HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct DavResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body, empty when absent.
    pub body: String,
}

impl DavResponse {
    /// First value of a header, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// An HTTP exchange primitive.
///
/// Implementations must be safe to share between concurrent callers.
/// Timeouts, TLS and connection reuse are the transport's business.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Performs one exchange and returns whatever the server answered.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Transport`] if no response was received.
    async fn execute(&self, request: DavRequest) -> Result<DavResponse, CalDavError>;
}

/// Transport backed by a [`reqwest::Client`].
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    auth: AuthMethod,
}

impl HttpTransport {
    /// Creates a transport from the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: &CalDavConfig) -> Result<Self, CalDavError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(Policy::none())
            .http1_title_case_headers()
            .build()?;
        Ok(Self {
            client,
            auth: config.auth.clone(),
        })
    }

    fn method(verb: Verb) -> Result<Method, CalDavError> {
        Method::from_bytes(verb.as_str().as_bytes())
            .map_err(|e| CalDavError::Transport(Box::new(e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: DavRequest) -> Result<DavResponse, CalDavError> {
        let mut req = self.client.request(Self::method(request.verb)?, request.url);

        match &self.auth {
            AuthMethod::Basic { username, password } => {
                req = req.basic_auth(username, Some(password));
            }
            AuthMethod::Bearer { token } => {
                req = req.bearer_auth(token);
            }
            AuthMethod::None => {}
        }

        for (name, value) in request.headers {
            req = req.header(name, value);
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = resp.text().await?;

        Ok(DavResponse {
            status,
            headers,
            body,
        })
    }
}
