// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::client::DavClient;
use crate::error::CalDavError;
use crate::request::Prop;
use crate::tree::calendar::Calendar;
use crate::tree::home_set::CalendarHomeSet;
use crate::tree::node::DavNode;
use crate::types::{ComponentKind, Depth};
use crate::url::Locator;

/// The root of a user's resources.
#[derive(Debug, Clone)]
pub struct Principal {
    pub(super) node: DavNode,
    home_set: Option<CalendarHomeSet>,
}

impl Principal {
    /// Builds a principal at a known locator, without a round trip.
    #[must_use]
    pub fn new(client: DavClient, url: Locator) -> Self {
        Self {
            node: DavNode::collection(client, url, None),
            home_set: None,
        }
    }

    /// Finds the principal through `current-user-principal` on the base URL.
    ///
    /// Servers that do not report the property get the base URL as principal.
    pub(crate) async fn discover(client: DavClient) -> Result<Self, CalDavError> {
        let base = client.base().clone();
        let ms = client
            .propfind(&base, &[Prop::CurrentUserPrincipal], Depth::Zero)
            .await?;

        let href = ms.responses.iter().find_map(|item| {
            item.properties()
                .href(&Prop::CurrentUserPrincipal.name())
                .map(str::to_string)
        });
        let url = match href {
            Some(href) => client.locate(&base, &href)?,
            None => {
                tracing::warn!(
                    url = %base,
                    "server did not report current-user-principal, using base URL"
                );
                base
            }
        };

        tracing::debug!(%url, "discovered principal");
        Ok(Self::new(client, url))
    }

    /// Fetches display name, resource type and calendar home set.
    ///
    /// # Errors
    ///
    /// Returns the error of the PROPFIND.
    pub async fn load(&mut self) -> Result<(), CalDavError> {
        self.node
            .load(&[Prop::DisplayName, Prop::ResourceType, Prop::CalendarHomeSet])
            .await
    }

    /// The calendar home set, resolved once and cached.
    ///
    /// A home set on another host than the principal, as load-balanced
    /// deployments report, is followed as is.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::ProtocolDecode`] if the principal does not
    /// report a home set, or the error of the PROPFIND.
    pub async fn calendar_home_set(&mut self) -> Result<&CalendarHomeSet, CalDavError> {
        let home_set = match self.home_set.take() {
            Some(home_set) => home_set,
            None => self.resolve_home_set().await?,
        };
        Ok(self.home_set.insert(home_set))
    }

    async fn resolve_home_set(&mut self) -> Result<CalendarHomeSet, CalDavError> {
        let url = match self.node.client.calendar_home() {
            Some(home) => home.clone(),
            None => {
                let props = self.node.get_properties(&[Prop::CalendarHomeSet]).await?;
                let href = props.href(&Prop::CalendarHomeSet.name()).ok_or_else(|| {
                    CalDavError::ProtocolDecode {
                        href: Some(self.node.url.to_string()),
                        message: "principal has no calendar-home-set".to_string(),
                    }
                })?;
                self.node.client.locate(&self.node.url, href)?
            }
        };

        tracing::debug!(principal = %self.node.url, home = %url, "resolved calendar home set");
        Ok(CalendarHomeSet::new(
            self.node.client.clone(),
            url,
            Some(self.node.url.clone()),
        ))
    }

    /// Calendars in the home set.
    ///
    /// # Errors
    ///
    /// Returns the error of home-set resolution or of the listing.
    pub async fn calendars(&mut self) -> Result<Vec<Calendar>, CalDavError> {
        self.calendar_home_set().await?.calendars().await
    }

    /// A calendar of the home set by id, without a round trip for the calendar.
    ///
    /// # Errors
    ///
    /// Returns the error of home-set resolution.
    pub async fn calendar(&mut self, id: &str) -> Result<Calendar, CalDavError> {
        self.calendar_home_set().await?.calendar(id)
    }

    /// Creates a calendar in the home set.
    ///
    /// # Errors
    ///
    /// Returns the error of home-set resolution or of the creation.
    pub async fn make_calendar(
        &mut self,
        name: Option<&str>,
        id: Option<&str>,
        components: &[ComponentKind],
    ) -> Result<Calendar, CalDavError> {
        self.calendar_home_set()
            .await?
            .make_calendar(name, id, components)
            .await
    }

    /// Deletes every calendar of the home set.
    ///
    /// # Errors
    ///
    /// Stops at the first calendar that cannot be deleted.
    pub async fn prune(&mut self) -> Result<(), CalDavError> {
        for mut calendar in self.calendars().await? {
            calendar.delete().await?;
        }
        Ok(())
    }
}
