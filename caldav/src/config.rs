// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::compat::{Quirk, QuirkSet, ServerFamily};

/// `CalDAV` authentication method.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "type")]
pub enum AuthMethod {
    /// No authentication.
    #[serde(rename = "none")]
    #[default]
    None,
    /// Basic authentication (username/password).
    #[serde(rename = "basic")]
    Basic {
        /// Username for authentication.
        username: String,
        /// Password for authentication.
        password: String,
    },
    /// Bearer token authentication (OAuth).
    #[serde(rename = "bearer")]
    Bearer {
        /// Bearer token.
        token: String,
    },
}

/// `CalDAV` server configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CalDavConfig {
    /// Base URL of the `CalDAV` server, used for principal discovery.
    pub base_url: String,
    /// Calendar home path (e.g., /dav/calendars/user/); skips home-set discovery when set.
    #[serde(default)]
    pub calendar_home: Option<String>,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Accept self-signed or otherwise invalid TLS certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Known server family whose compatibility rules are enabled.
    #[serde(default)]
    pub server: Option<ServerFamily>,
    /// Additional compatibility rules.
    #[serde(default)]
    pub quirks: Vec<Quirk>,
}

impl CalDavConfig {
    /// Compatibility rules enabled by this configuration.
    #[must_use]
    pub fn quirk_set(&self) -> QuirkSet {
        let mut quirks = self.server.map(QuirkSet::for_family).unwrap_or_default();
        quirks.extend(self.quirks.iter().copied());
        quirks
    }
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("davcal-caldav/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            calendar_home: None,
            auth: AuthMethod::default(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            accept_invalid_certs: false,
            server: None,
            quirks: Vec::new(),
        }
    }
}
