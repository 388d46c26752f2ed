// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::client::DavClient;
use crate::error::CalDavError;
use crate::request::Prop;
use crate::tree::calendar::Calendar;
use crate::tree::node::DavNode;
use crate::types::{ComponentKind, Depth};
use crate::url::{Locator, encode_segment};

/// Collection holding a user's calendars.
#[derive(Debug, Clone)]
pub struct CalendarHomeSet {
    pub(super) node: DavNode,
}

impl CalendarHomeSet {
    /// Builds a home set at a known locator, without a round trip.
    #[must_use]
    pub fn new(client: DavClient, url: Locator, parent: Option<Locator>) -> Self {
        Self {
            node: DavNode::collection(client, url, parent),
        }
    }

    /// Calendars in this home set.
    ///
    /// Members whose resource type lacks the calendar marker are skipped. A
    /// home set that does not exist yet has no calendars.
    ///
    /// # Errors
    ///
    /// Returns the error of the depth-1 PROPFIND.
    pub async fn calendars(&self) -> Result<Vec<Calendar>, CalDavError> {
        let client = &self.node.client;
        let url = self.node.request_url()?;
        let props = [
            Prop::ResourceType,
            Prop::DisplayName,
            Prop::SupportedCalendarComponents,
        ];

        let ms = match client.propfind(&url, &props, Depth::One).await {
            Ok(ms) => ms,
            Err(CalDavError::NotFound { .. }) => {
                tracing::debug!(%url, "calendar home set not found, no calendars");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let mut calendars = Vec::new();
        for item in &ms.responses {
            let Ok(member) = client.locate(&url, &item.href) else {
                tracing::warn!(href = %item.href, "skipping member with malformed href");
                continue;
            };
            if client.same_resource(&member, &self.node.url) || item.is_failure() {
                continue;
            }
            let props = item.properties();
            if !props.is_calendar() {
                continue;
            }
            calendars.push(Calendar::listed(
                client.clone(),
                member,
                self.node.url.clone(),
                props,
            ));
        }
        Ok(calendars)
    }

    /// A calendar of this home set by id, built locally.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::MalformedLocator`] if the id cannot form a locator.
    pub fn calendar(&self, id: &str) -> Result<Calendar, CalDavError> {
        let url = self
            .node
            .url
            .join(&encode_segment(id))?
            .canonical_collection_form();
        Ok(Calendar::new(
            self.node.client.clone(),
            url,
            Some(self.node.url.clone()),
        ))
    }

    /// Creates a calendar with MKCALENDAR.
    ///
    /// The id defaults to a random UUID. See [`Calendar::save`] for the
    /// creation rules.
    ///
    /// # Errors
    ///
    /// Returns the error of the creation.
    pub async fn make_calendar(
        &self,
        name: Option<&str>,
        id: Option<&str>,
        components: &[ComponentKind],
    ) -> Result<Calendar, CalDavError> {
        let id = id.map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);
        let mut calendar = self.calendar(&id)?;
        calendar.set_name(name.map(str::to_string));
        calendar.set_components(components.to_vec());
        calendar.save().await?;
        Ok(calendar)
    }
}
