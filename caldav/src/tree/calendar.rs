// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use jiff::Timestamp;

use crate::client::DavClient;
use crate::compat::Quirk;
use crate::error::CalDavError;
use crate::ical;
use crate::request::{
    CalendarMultiGetRequest, CalendarQueryRequest, FreeBusyQueryRequest, Prop, PropPatchRequest,
    TextMatch,
};
use crate::response::{MultiStatusResponse, PropertyMap};
use crate::tree::node::{DavNode, ObjectState};
use crate::tree::object::CalendarObject;
use crate::types::{CalendarData, ComponentKind, Depth, FreeBusy, ResourceFailure, SearchResult};
use crate::url::{Locator, encode_segment};
use crate::xml::Element;

/// A calendar collection.
#[derive(Debug, Clone)]
pub struct Calendar {
    pub(super) node: DavNode,
    pending_name: Option<String>,
    components: Vec<ComponentKind>,
}

impl Calendar {
    /// Builds a calendar at a known locator, without a round trip.
    #[must_use]
    pub fn new(client: DavClient, url: Locator, parent: Option<Locator>) -> Self {
        Self {
            node: DavNode::collection(client, url, parent),
            pending_name: None,
            components: Vec::new(),
        }
    }

    /// A calendar reported by a listing, with the properties it came with.
    pub(crate) fn listed(
        client: DavClient,
        url: Locator,
        parent: Locator,
        properties: PropertyMap,
    ) -> Self {
        let mut calendar = Self::new(client, url, Some(parent));
        calendar.components = properties.supported_components();
        calendar.node.properties = properties;
        calendar.node.state = ObjectState::Loaded;
        calendar
    }

    /// Last path segment of the locator.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.node.url.last_segment()
    }

    /// Display name: the pending one if set, else the cached one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.pending_name
            .as_deref()
            .or_else(|| self.node.properties.display_name())
    }

    /// Component types the calendar accepts; empty when unrestricted or unknown.
    #[must_use]
    pub fn components(&self) -> &[ComponentKind] {
        &self.components
    }

    /// Sets the display name to apply on the next [`save`](Self::save).
    pub fn set_name(&mut self, name: Option<String>) {
        self.pending_name = name;
    }

    /// Restricts the component types of a calendar not created yet.
    pub fn set_components(&mut self, components: Vec<ComponentKind>) {
        self.components = components;
    }

    /// Fetches the calendar properties, replacing the cached ones.
    ///
    /// # Errors
    ///
    /// Returns the error of the PROPFIND.
    pub async fn load(&mut self) -> Result<(), CalDavError> {
        self.node
            .load(&[
                Prop::DisplayName,
                Prop::ResourceType,
                Prop::SupportedCalendarComponents,
                Prop::GetCTag,
                Prop::CalendarDescription,
            ])
            .await?;
        self.components = self.node.properties.supported_components();
        Ok(())
    }

    /// Creates the calendar when detached, or applies a pending rename.
    ///
    /// Creation sends MKCALENDAR with the display name and the accepted
    /// component types, then sets the display name again with PROPPATCH
    /// since not every server honors it on creation. If that second step
    /// fails, the new collection is deleted before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::StaleObject`] if the calendar was deleted, or
    /// the error of the failed exchange.
    pub async fn save(&mut self) -> Result<(), CalDavError> {
        self.node.live_url()?;
        match self.node.state {
            ObjectState::Detached => self.create().await,
            ObjectState::Loaded | ObjectState::Deleted => {
                if let Some(name) = self.pending_name.take() {
                    let url = self.node.request_url()?;
                    let request = PropPatchRequest::new().set(display_name(&name));
                    self.node.client.proppatch(&url, &request).await?;
                    self.node.properties.insert(display_name(&name));
                }
                Ok(())
            }
        }
    }

    async fn create(&mut self) -> Result<(), CalDavError> {
        let client = self.node.client.clone();
        let url = self.node.request_url()?;
        let name = self.pending_name.take();

        client
            .mkcalendar(&url, name.as_deref(), &self.components)
            .await?;
        tracing::debug!(%url, "created calendar");

        if let Some(name) = &name {
            let request = PropPatchRequest::new().set(display_name(name));
            if let Err(err) = client.proppatch(&url, &request).await {
                tracing::warn!(%url, %err, "setting display name failed, deleting new calendar");
                if let Err(cleanup) = client.delete(&url, None).await {
                    tracing::error!(%url, err = %cleanup, "failed to delete half-created calendar");
                }
                return Err(err);
            }
            self.node.properties.insert(display_name(name));

            if client.quirks().contains(Quirk::CalendarUrlFromDisplayName)
                && let Some(parent) = &self.node.parent
            {
                let renamed = parent
                    .join(&encode_segment(name))?
                    .canonical_collection_form();
                tracing::warn!(
                    from = %self.node.url,
                    to = %renamed,
                    "addressing calendar by display name"
                );
                self.node.url = renamed;
            }
        }

        if !self.components.is_empty() {
            self.node.properties.insert(
                Prop::SupportedCalendarComponents.element().with_children(
                    self.components
                        .iter()
                        .map(|c| Element::caldav("comp").with_attr("name", c.name())),
                ),
            );
        }
        self.node.state = ObjectState::Loaded;
        Ok(())
    }

    /// Deletes the calendar and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::StaleObject`] if already deleted, or the
    /// error of the DELETE.
    pub async fn delete(&mut self) -> Result<(), CalDavError> {
        self.node.delete(None).await
    }

    /// Stores a new event.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::CalendarData`] if the payload holds no event,
    /// or the error of the PUT.
    pub async fn add_event(&self, data: impl CalendarData) -> Result<CalendarObject, CalDavError> {
        self.add_typed(data, ComponentKind::Event).await
    }

    /// Stores a new to-do.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::CalendarData`] if the payload holds no to-do,
    /// or the error of the PUT.
    pub async fn add_todo(&self, data: impl CalendarData) -> Result<CalendarObject, CalDavError> {
        self.add_typed(data, ComponentKind::Todo).await
    }

    /// Stores a new journal entry.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::CalendarData`] if the payload holds no
    /// journal, or the error of the PUT.
    pub async fn add_journal(
        &self,
        data: impl CalendarData,
    ) -> Result<CalendarObject, CalDavError> {
        self.add_typed(data, ComponentKind::Journal).await
    }

    /// Stores a new object of whatever component type the payload holds.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::CalendarData`] if the payload holds no
    /// calendar component, or the error of the PUT.
    pub async fn add_object(&self, data: impl CalendarData) -> Result<CalendarObject, CalDavError> {
        let url = self.node.live_url()?;
        let mut object =
            CalendarObject::create(self.node.client.clone(), url, data.to_ical(), None)?;
        object.save().await?;
        Ok(object)
    }

    async fn add_typed(
        &self,
        data: impl CalendarData,
        kind: ComponentKind,
    ) -> Result<CalendarObject, CalDavError> {
        let data = data.to_ical();
        match ical::component_kind(&data) {
            Some(found) if found == kind => self.add_object(data).await,
            found => Err(CalDavError::CalendarData(format!(
                "expected a {kind} component, found {}",
                found.map_or("none", ComponentKind::name)
            ))),
        }
    }

    /// Every event.
    ///
    /// # Errors
    ///
    /// Returns the error of the REPORT.
    pub async fn events(&self) -> Result<SearchResult<CalendarObject>, CalDavError> {
        let query = CalendarQueryRequest::new().component(ComponentKind::Event);
        self.query(&query, Some(ComponentKind::Event)).await
    }

    /// Every journal entry.
    ///
    /// # Errors
    ///
    /// Returns the error of the REPORT.
    pub async fn journals(&self) -> Result<SearchResult<CalendarObject>, CalDavError> {
        let query = CalendarQueryRequest::new().component(ComponentKind::Journal);
        self.query(&query, Some(ComponentKind::Journal)).await
    }

    /// Every object, whatever its component type.
    ///
    /// # Errors
    ///
    /// Returns the error of the REPORT.
    pub async fn objects(&self) -> Result<SearchResult<CalendarObject>, CalDavError> {
        self.query(&CalendarQueryRequest::new(), None).await
    }

    /// To-dos, pending only unless `include_completed`.
    ///
    /// Ordered by due date, then start date for those without one, then
    /// the rest.
    ///
    /// # Errors
    ///
    /// Returns the error of a REPORT.
    pub async fn todos(
        &self,
        include_completed: bool,
    ) -> Result<SearchResult<CalendarObject>, CalDavError> {
        let todo = || CalendarQueryRequest::new().component(ComponentKind::Todo);

        let mut result = match include_completed {
            true => self.query(&todo(), Some(ComponentKind::Todo)).await?,
            false => {
                let not_cancelled = todo()
                    .is_not_defined("COMPLETED")
                    .text_match("STATUS", TextMatch::new("CANCELLED").negated());
                let without_status = todo().is_not_defined("COMPLETED").is_not_defined("STATUS");

                let mut result = self
                    .query(&not_cancelled, Some(ComponentKind::Todo))
                    .await?;
                let more = self
                    .query(&without_status, Some(ComponentKind::Todo))
                    .await?;

                let mut seen: HashSet<Locator> =
                    result.objects.iter().map(|o| o.node.url.clone()).collect();
                result
                    .objects
                    .extend(more.objects.into_iter().filter(|o| seen.insert(o.node.url.clone())));
                result.failures.extend(more.failures);
                result.objects.retain(|o| ical::is_pending_todo(o.data()));
                result
            }
        };

        result
            .objects
            .sort_by(|a, b| ical::compare_todos(a.data(), b.data()));
        Ok(result)
    }

    /// Objects overlapping a time range.
    ///
    /// With an end bound the server is asked to expand recurrences. Without
    /// one the filter is open ended, which some servers reject or ignore;
    /// pass an end bound for the widest compatibility.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::ServerCompatibility`] if the range is open
    /// ended and the server is known to reject that, or the error of the
    /// REPORT.
    pub async fn date_search(
        &self,
        start: Timestamp,
        end: Option<Timestamp>,
        kind: Option<ComponentKind>,
    ) -> Result<SearchResult<CalendarObject>, CalDavError> {
        let url = self.node.request_url()?;
        self.node.client.quirks().check_time_range(&url, end.is_some())?;

        let mut query = CalendarQueryRequest::new().time_range(start, end);
        if let Some(kind) = kind {
            query = query.component(kind);
        }
        if let Some(end) = end {
            query = query.expand(start, end);
        }
        self.query(&query, kind).await
    }

    /// Free/busy information for a time range.
    ///
    /// # Errors
    ///
    /// Returns the error of the REPORT.
    pub async fn freebusy_request(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<FreeBusy, CalDavError> {
        let url = self.node.request_url()?;
        let data = self
            .node
            .client
            .report_raw(&url, &FreeBusyQueryRequest::new(start, end).build(), Depth::One)
            .await?;
        Ok(FreeBusy { data })
    }

    /// The object with the given UID.
    ///
    /// The server is asked for a UID text match, and only objects whose UID
    /// equals `uid` exactly are kept. Servers need not enforce unique UIDs;
    /// when several objects match, the first one reported is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotFound`] if no object matches, or the error
    /// of the REPORT.
    pub async fn object_by_uid(
        &self,
        uid: &str,
        kind: Option<ComponentKind>,
    ) -> Result<CalendarObject, CalDavError> {
        let mut query = CalendarQueryRequest::new().text_match("UID", TextMatch::new(uid));
        if let Some(kind) = kind {
            query = query.component(kind);
        }

        let result = self.query(&query, kind).await?;
        let mut matches = result
            .objects
            .into_iter()
            .filter(|o| o.uid().as_deref() == Some(uid) && kind.is_none_or(|k| o.kind() == k));

        let found = matches
            .next()
            .ok_or_else(|| CalDavError::not_found(&self.node.url))?;
        if matches.next().is_some() {
            tracing::warn!(
                uid,
                calendar = %self.node.url,
                "several objects share this UID, using the first"
            );
        }
        Ok(found)
    }

    /// The event with the given UID.
    ///
    /// # Errors
    ///
    /// See [`object_by_uid`](Self::object_by_uid).
    pub async fn event_by_uid(&self, uid: &str) -> Result<CalendarObject, CalDavError> {
        self.object_by_uid(uid, Some(ComponentKind::Event)).await
    }

    /// The to-do with the given UID.
    ///
    /// # Errors
    ///
    /// See [`object_by_uid`](Self::object_by_uid).
    pub async fn todo_by_uid(&self, uid: &str) -> Result<CalendarObject, CalDavError> {
        self.object_by_uid(uid, Some(ComponentKind::Todo)).await
    }

    /// The journal entry with the given UID.
    ///
    /// # Errors
    ///
    /// See [`object_by_uid`](Self::object_by_uid).
    pub async fn journal_by_uid(&self, uid: &str) -> Result<CalendarObject, CalDavError> {
        self.object_by_uid(uid, Some(ComponentKind::Journal)).await
    }

    /// Loads the object at `href`, relative to this calendar.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::CalendarData`] if the object is not of the
    /// requested kind, or the error of the GET.
    pub async fn object_by_url(
        &self,
        href: &str,
        kind: Option<ComponentKind>,
    ) -> Result<CalendarObject, CalDavError> {
        let url = self.node.live_url()?.join(href)?;
        let mut object =
            CalendarObject::at(self.node.client.clone(), url, Some(self.node.url.clone()));
        object.load().await?;

        match kind {
            Some(kind) if object.kind() != kind => Err(CalDavError::CalendarData(format!(
                "{} holds a {}, not a {kind}",
                object.node.url,
                object.kind()
            ))),
            _ => Ok(object),
        }
    }

    /// The event at `href`.
    ///
    /// # Errors
    ///
    /// See [`object_by_url`](Self::object_by_url).
    pub async fn event_by_url(&self, href: &str) -> Result<CalendarObject, CalDavError> {
        self.object_by_url(href, Some(ComponentKind::Event)).await
    }

    /// The to-do at `href`.
    ///
    /// # Errors
    ///
    /// See [`object_by_url`](Self::object_by_url).
    pub async fn todo_by_url(&self, href: &str) -> Result<CalendarObject, CalDavError> {
        self.object_by_url(href, Some(ComponentKind::Todo)).await
    }

    /// The journal entry at `href`.
    ///
    /// # Errors
    ///
    /// See [`object_by_url`](Self::object_by_url).
    pub async fn journal_by_url(&self, href: &str) -> Result<CalendarObject, CalDavError> {
        self.object_by_url(href, Some(ComponentKind::Journal)).await
    }

    /// Fetches several objects in one calendar-multiget REPORT.
    ///
    /// # Errors
    ///
    /// Returns the error of the REPORT.
    pub async fn multiget(
        &self,
        hrefs: &[Locator],
    ) -> Result<SearchResult<CalendarObject>, CalDavError> {
        let url = self.node.request_url()?;
        let mut request = CalendarMultiGetRequest::new();
        for href in hrefs {
            let absolute = self.node.client.resolve(&self.node.url.join(&href.to_string())?)?;
            request.add_href(absolute.path().to_string());
        }

        let ms = self
            .node
            .client
            .report(&url, &request.build(), Depth::One)
            .await?;
        Ok(self.collect(&url, &ms, None))
    }

    async fn query(
        &self,
        query: &CalendarQueryRequest,
        hint: Option<ComponentKind>,
    ) -> Result<SearchResult<CalendarObject>, CalDavError> {
        let url = self.node.request_url()?;
        let ms = self
            .node
            .client
            .report(&url, &query.build(), Depth::One)
            .await?;
        Ok(self.collect(&url, &ms, hint))
    }

    /// Splits a REPORT result into objects and per-resource failures.
    ///
    /// Successful entries without calendar data are not objects and are
    /// skipped, as is the collection itself.
    fn collect(
        &self,
        url: &Locator,
        ms: &MultiStatusResponse,
        hint: Option<ComponentKind>,
    ) -> SearchResult<CalendarObject> {
        let client = &self.node.client;
        let mut result = SearchResult::default();

        for item in &ms.responses {
            let member = match client.locate(url, &item.href) {
                Ok(member) => member,
                Err(err) => {
                    tracing::warn!(href = %item.href, %err, "skipping result with malformed href");
                    continue;
                }
            };
            if client.same_resource(&member, &self.node.url) {
                continue;
            }
            if item.is_failure() {
                tracing::debug!(
                    href = %member,
                    status = ?item.failure_status(),
                    "resource failed in report"
                );
                result.failures.push(ResourceFailure {
                    href: member,
                    status: item.failure_status(),
                });
                continue;
            }

            let props = item.properties();
            let Some(data) = props.calendar_data() else {
                continue;
            };
            result.objects.push(CalendarObject::listed(
                client.clone(),
                member,
                self.node.url.clone(),
                data.to_string(),
                props.etag(),
                hint,
            ));
        }
        result
    }
}

fn display_name(name: &str) -> Element {
    Element::new(Prop::DisplayName.name()).with_text(name)
}
