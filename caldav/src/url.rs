// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Resource locators: parsing, joining and comparison of DAV URLs.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::Url;

use crate::error::CalDavError;

/// Characters escaped when a free-form value (such as a UID) becomes a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Base used to resolve references against a relative locator.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Port artifact injected by some transports when no port was specified.
const NONE_PORT: &str = ":None";

/// Address of a DAV resource, either an absolute URL or a server-relative path.
///
/// Locators compare equal when they denote the same resource: trailing
/// slashes, default ports and percent-encoding of the path are ignored.
/// An absolute and a relative locator never compare equal; resolve the
/// relative one first.
#[derive(Clone)]
pub struct Locator {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Absolute(Url),
    /// Normalized path, plus query if any.
    Relative(String),
}

impl Locator {
    /// Parses a raw locator.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::MalformedLocator`] if the input has no
    /// discernible path, e.g. it is empty or an opaque URI such as `mailto:`.
    pub fn parse(raw: &str) -> Result<Self, CalDavError> {
        let cleaned = strip_none_port(raw.trim());
        if cleaned.is_empty() {
            return Err(CalDavError::MalformedLocator(raw.to_string()));
        }

        match Url::parse(&cleaned) {
            Ok(url) if url.cannot_be_a_base() => {
                Err(CalDavError::MalformedLocator(raw.to_string()))
            }
            Ok(url) => Ok(Self::absolute(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let resolved = relative_base()
                    .and_then(|base| base.join(&cleaned).ok())
                    .ok_or_else(|| CalDavError::MalformedLocator(raw.to_string()))?;
                Ok(Self::relative_from(&resolved))
            }
            Err(_) => Err(CalDavError::MalformedLocator(raw.to_string())),
        }
    }

    /// Wraps an already parsed URL.
    #[must_use]
    pub const fn absolute(url: Url) -> Self {
        Self {
            inner: Inner::Absolute(url),
        }
    }

    /// Resolves `reference` against this locator.
    ///
    /// Absolute references replace the locator, references starting with `/`
    /// replace the path, and any other reference is resolved as a member of
    /// this locator taken as a collection, whether or not it ends with a
    /// slash. An empty reference yields this locator unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::MalformedLocator`] if the reference cannot be
    /// resolved.
    pub fn join(&self, reference: &str) -> Result<Self, CalDavError> {
        let reference = strip_none_port(reference.trim());
        if reference.is_empty() {
            return Ok(self.clone());
        }

        if let Ok(url) = Url::parse(&reference) {
            return match url.cannot_be_a_base() {
                true => Err(CalDavError::MalformedLocator(reference)),
                false => Ok(Self::absolute(url)),
            };
        }

        let malformed = || CalDavError::MalformedLocator(reference.clone());
        match &self.inner {
            Inner::Absolute(base) => {
                let joined = collection_base(base).join(&reference).map_err(|_| malformed())?;
                Ok(Self::absolute(joined))
            }
            Inner::Relative(path) => {
                let base = relative_base()
                    .and_then(|b| b.join(path).ok())
                    .ok_or_else(malformed)?;
                let joined = collection_base(&base).join(&reference).map_err(|_| malformed())?;
                Ok(match joined.host_str() == base.host_str() {
                    true => Self::relative_from(&joined),
                    // Protocol-relative reference such as `//host/path`.
                    false => Self::absolute(joined),
                })
            }
        }
    }

    /// Whether both locators denote the same resource.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }

    /// The same locator with every trailing slash removed from its path.
    ///
    /// The root path `/` is left as is.
    #[must_use]
    pub fn strip_trailing_slash(&self) -> Self {
        self.map_path(|path| {
            let trimmed = path.trim_end_matches('/');
            match trimmed.is_empty() {
                true => "/".to_string(),
                false => trimmed.to_string(),
            }
        })
    }

    /// The collection form of this locator: its path ends with exactly one slash.
    #[must_use]
    pub fn canonical_collection_form(&self) -> Self {
        self.map_path(|path| format!("{}/", path.trim_end_matches('/')))
    }

    /// Whether the locator is an absolute URL.
    #[must_use]
    pub const fn is_absolute(&self) -> bool {
        matches!(self.inner, Inner::Absolute(_))
    }

    /// The underlying URL, for absolute locators.
    #[must_use]
    pub const fn as_url(&self) -> Option<&Url> {
        match &self.inner {
            Inner::Absolute(url) => Some(url),
            Inner::Relative(_) => None,
        }
    }

    /// Path component, percent-encoded as stored.
    #[must_use]
    pub fn path(&self) -> &str {
        match &self.inner {
            Inner::Absolute(url) => url.path(),
            Inner::Relative(path) => path.split_once('?').map_or(path.as_str(), |(p, _)| p),
        }
    }

    /// Path component with percent-encoding decoded.
    #[must_use]
    pub fn decoded_path(&self) -> String {
        percent_decode_str(self.path())
            .decode_utf8_lossy()
            .into_owned()
    }

    /// Last non-empty path segment, decoded.
    #[must_use]
    pub fn last_segment(&self) -> Option<String> {
        self.path()
            .split('/')
            .rfind(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
    }

    /// Whether the path ends with a slash.
    #[must_use]
    pub fn has_trailing_slash(&self) -> bool {
        self.path().ends_with('/')
    }

    /// Resolves this locator to an absolute URL using `base` for relative forms.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::MalformedLocator`] if neither this locator nor
    /// `base` is absolute.
    pub fn to_absolute(&self, base: &Self) -> Result<Url, CalDavError> {
        match &self.inner {
            Inner::Absolute(url) => Ok(url.clone()),
            Inner::Relative(path) => match &base.inner {
                Inner::Absolute(base_url) => base_url
                    .join(path)
                    .map_err(|_| CalDavError::MalformedLocator(path.clone())),
                Inner::Relative(_) => Err(CalDavError::MalformedLocator(path.clone())),
            },
        }
    }

    fn relative_from(url: &Url) -> Self {
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Self {
            inner: Inner::Relative(path),
        }
    }

    fn map_path(&self, f: impl FnOnce(&str) -> String) -> Self {
        match &self.inner {
            Inner::Absolute(url) => {
                let mut url = url.clone();
                let path = f(url.path());
                url.set_path(&path);
                Self::absolute(url)
            }
            Inner::Relative(raw) => {
                let (path, query) = raw
                    .split_once('?')
                    .map_or((raw.as_str(), None), |(p, q)| (p, Some(q)));
                let mut mapped = f(path);
                if let Some(query) = query {
                    mapped.push('?');
                    mapped.push_str(query);
                }
                Self {
                    inner: Inner::Relative(mapped),
                }
            }
        }
    }

    fn identity(&self) -> Identity {
        let (path, query) = match &self.inner {
            Inner::Absolute(url) => (url.path(), url.query()),
            Inner::Relative(raw) => raw
                .split_once('?')
                .map_or((raw.as_str(), None), |(p, q)| (p, Some(q))),
        };
        let path = percent_decode_str(path.trim_end_matches('/'))
            .decode_utf8_lossy()
            .into_owned();

        let origin = match &self.inner {
            Inner::Absolute(url) => Some((
                url.scheme().to_ascii_lowercase(),
                url.host_str().unwrap_or_default().to_ascii_lowercase(),
                url.port_or_known_default(),
            )),
            Inner::Relative(_) => None,
        };

        Identity {
            origin,
            path,
            query: query.map(str::to_string),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
struct Identity {
    origin: Option<(String, String, Option<u16>)>,
    path: String,
    query: Option<String>,
}

impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.equivalent(other)
    }
}

impl Eq for Locator {}

impl Hash for Locator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Absolute(url) => f.write_str(url.as_str()),
            Inner::Relative(path) => f.write_str(path),
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Locator").field(&self.to_string()).finish()
    }
}

impl FromStr for Locator {
    type Err = CalDavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Url> for Locator {
    fn from(url: Url) -> Self {
        Self::absolute(url)
    }
}

/// Percent-encodes a free-form value for use as a single path segment.
#[must_use]
pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

fn relative_base() -> Option<Url> {
    Url::parse(RELATIVE_BASE).ok()
}

/// A copy of `url` whose path ends with a slash, so joins append to it.
fn collection_base(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);
    base
}

/// Removes a literal `:None` port from the authority of `raw`.
fn strip_none_port(raw: &str) -> String {
    let Some(scheme_end) = raw.find("://") else {
        return raw.to_string();
    };
    let authority_start = scheme_end + 3;
    let authority_end = raw
        .get(authority_start..)
        .and_then(|rest| rest.find(['/', '?', '#']))
        .map_or(raw.len(), |i| authority_start + i);

    match raw.get(authority_start..authority_end) {
        Some(authority) if authority.ends_with(NONE_PORT) => {
            let mut cleaned = String::with_capacity(raw.len());
            cleaned.push_str(raw.get(..authority_end - NONE_PORT.len()).unwrap_or_default());
            cleaned.push_str(raw.get(authority_end..).unwrap_or_default());
            cleaned
        }
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_strips_none_port_artifact() {
        assert_eq!(
            strip_none_port("https://example.com:None/dav/"),
            "https://example.com/dav/"
        );
        assert_eq!(strip_none_port("https://example.com:None"), "https://example.com");
        assert_eq!(strip_none_port("/dav/None:None/"), "/dav/None:None/");
    }

    #[test]
    fn url_encodes_segment_separators() {
        assert_eq!(encode_segment("a/b c#1"), "a%2Fb%20c%231");
        assert_eq!(encode_segment("plain-uid@host"), "plain-uid@host");
    }

    #[test]
    fn url_relative_join_stays_relative() {
        let base = Locator::parse("/calendars/user").unwrap();
        let joined = base.join("work/").unwrap();
        assert!(!joined.is_absolute());
        assert_eq!(joined.to_string(), "/calendars/user/work/");
    }
}
