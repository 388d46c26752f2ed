// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::compat::Quirk;
use crate::http::Verb;
use crate::url::Locator;

/// `CalDAV` client errors.
///
/// Errors raised by a remote exchange carry the offending locator and, when
/// the server answered, the HTTP status.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CalDavError {
    /// The input has no discernible path and cannot address a resource.
    #[error("Malformed locator: {0:?}")]
    MalformedLocator(String),

    /// The server answered with XML that could not be decoded.
    #[error(
        "Failed to decode server response{}: {message}",
        .href.as_deref().map(|h| format!(" from {h}")).unwrap_or_default()
    )]
    ProtocolDecode {
        /// Resource the response belongs to, when known.
        href: Option<String>,
        /// What went wrong.
        message: String,
    },

    /// The server refused the credentials (401) or the access (403).
    #[error("{verb} {href} is not authorized ({status})")]
    Authorization {
        /// Verb of the refused exchange.
        verb: Verb,
        /// Requested resource.
        href: String,
        /// 401 or 403.
        status: u16,
    },

    /// Resource not found, either a 404 or a lookup without any match.
    #[error("Resource not found: {href}")]
    NotFound {
        /// Requested resource.
        href: String,
        /// HTTP status, absent for an empty search result.
        status: Option<u16>,
    },

    /// Entity-tag precondition failed (412).
    #[error("Precondition failed for {href}")]
    PreconditionFailed {
        /// Resource whose entity-tag did not match.
        href: String,
        /// Entity-tag reported by the server, if any.
        etag: Option<String>,
    },

    /// Remote operation on an object that was already deleted.
    #[error("{href} was deleted and cannot be used for remote operations")]
    StaleObject {
        /// Locator of the deleted object.
        href: String,
    },

    /// A compatibility rule fired and the situation cannot be resolved automatically.
    #[error("{href}: {message} (compatibility rule `{quirk}`)")]
    ServerCompatibility {
        /// The rule that fired.
        quirk: Quirk,
        /// Resource of the attempted operation.
        href: String,
        /// Explanation.
        message: String,
    },

    /// Any other non-success status, tagged with the verb that produced it.
    #[error("{verb} {href} failed with status {status}")]
    Request {
        /// Verb of the failed exchange.
        verb: Verb,
        /// Requested resource.
        href: String,
        /// HTTP status.
        status: u16,
        /// Response body, kept for debugging.
        body: String,
    },

    /// Calendar data lacks what an edit needs.
    #[error("Invalid calendar data: {0}")]
    CalendarData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure of the underlying transport, passed through unchanged.
    #[error("HTTP transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CalDavError {
    /// HTTP status attached to the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Authorization { status, .. } | Self::Request { status, .. } => Some(*status),
            Self::NotFound { status, .. } => *status,
            Self::PreconditionFailed { .. } => Some(412),
            _ => None,
        }
    }

    /// Locator of the resource the error is about, if any.
    #[must_use]
    pub fn href(&self) -> Option<&str> {
        match self {
            Self::Authorization { href, .. }
            | Self::NotFound { href, .. }
            | Self::PreconditionFailed { href, .. }
            | Self::StaleObject { href }
            | Self::ServerCompatibility { href, .. }
            | Self::Request { href, .. } => Some(href),
            Self::ProtocolDecode { href, .. } => href.as_deref(),
            _ => None,
        }
    }

    /// Verb of the failed exchange, for errors raised by the status policy.
    #[must_use]
    pub const fn verb(&self) -> Option<Verb> {
        match self {
            Self::Authorization { verb, .. } | Self::Request { verb, .. } => Some(*verb),
            _ => None,
        }
    }

    /// Attaches a locator to a decode error that was raised without one.
    #[must_use]
    pub fn with_href(self, locator: &Locator) -> Self {
        match self {
            Self::ProtocolDecode {
                href: None,
                message,
            } => Self::ProtocolDecode {
                href: Some(locator.to_string()),
                message,
            },
            other => other,
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::ProtocolDecode {
            href: None,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(locator: &Locator) -> Self {
        Self::NotFound {
            href: locator.to_string(),
            status: None,
        }
    }
}

impl From<reqwest::Error> for CalDavError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Box::new(e))
    }
}

impl From<quick_xml::Error> for CalDavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::decode(e.to_string())
    }
}

impl From<std::io::Error> for CalDavError {
    fn from(e: std::io::Error) -> Self {
        Self::decode(format!("IO error: {e}"))
    }
}
