// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use jiff::Timestamp;
use jiff::civil::DateTime;

use crate::client::{CALENDAR_CONTENT_TYPE, DavClient, Precondition};
use crate::error::CalDavError;
use crate::ical;
use crate::request::Prop;
use crate::tree::calendar::Calendar;
use crate::tree::node::{DavNode, ObjectState};
use crate::types::{CalendarData, ComponentKind, ETag};
use crate::url::{Locator, encode_segment};

/// An event, to-do or journal entry stored in a calendar.
///
/// The payload is kept as text and sent back as is; edits through this type
/// only touch the lines they change.
#[derive(Debug, Clone)]
pub struct CalendarObject {
    pub(super) node: DavNode,
    kind: ComponentKind,
    data: String,
    etag: Option<ETag>,
}

impl CalendarObject {
    /// Builds a new object for `parent`, not stored yet.
    ///
    /// A payload without a UID gets a random one. The locator defaults to
    /// `<uid>.ics` inside the parent.
    pub(crate) fn create(
        client: DavClient,
        parent: &Locator,
        data: String,
        url: Option<Locator>,
    ) -> Result<Self, CalDavError> {
        let kind = ical::component_kind(&data).ok_or_else(|| {
            CalDavError::CalendarData("no event, to-do or journal found".to_string())
        })?;

        let (data, uid) = match ical::uid(&data) {
            Some(uid) => (data, uid),
            None => {
                let uid = uuid::Uuid::new_v4().to_string();
                (ical::set_uid(&data, &uid)?, uid)
            }
        };
        let url = match url {
            Some(url) => url,
            None => parent.join(&format!("{}.ics", encode_segment(&uid)))?,
        };

        Ok(Self {
            node: DavNode::new(client, url, Some(parent.clone())),
            kind,
            data,
            etag: None,
        })
    }

    /// Builds an object at a known locator, without a round trip.
    pub(crate) fn at(client: DavClient, url: Locator, parent: Option<Locator>) -> Self {
        Self {
            node: DavNode::new(client, url, parent),
            kind: ComponentKind::Event,
            data: String::new(),
            etag: None,
        }
    }

    /// An object returned by a REPORT, with its data and entity tag.
    pub(crate) fn listed(
        client: DavClient,
        url: Locator,
        parent: Locator,
        data: String,
        etag: Option<ETag>,
        hint: Option<ComponentKind>,
    ) -> Self {
        let mut object = Self::at(client, url, Some(parent));
        object.kind = ical::component_kind(&data)
            .or(hint)
            .unwrap_or(ComponentKind::Event);
        object.data = data;
        object.etag = etag;
        object.node.state = ObjectState::Loaded;
        object
    }

    /// The iCalendar payload.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Replaces the payload; call [`save`](Self::save) to store it.
    pub fn set_data(&mut self, data: impl CalendarData) {
        self.data = data.to_ical();
        if let Some(kind) = ical::component_kind(&self.data) {
            self.kind = kind;
        }
    }

    /// Component type of the payload.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// UID of the payload.
    #[must_use]
    pub fn uid(&self) -> Option<String> {
        ical::uid(&self.data)
    }

    /// Entity tag last seen from the server.
    #[must_use]
    pub const fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    /// Last path segment of the locator.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.node.url.last_segment()
    }

    /// Due date, for to-dos.
    #[must_use]
    pub fn due(&self) -> Option<DateTime> {
        ical::due(&self.data)
    }

    /// Start date.
    #[must_use]
    pub fn start(&self) -> Option<DateTime> {
        ical::start(&self.data)
    }

    /// Fetches payload and entity tag with GET.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotFound`] if the object does not exist, or
    /// another error of the GET.
    pub async fn load(&mut self) -> Result<(), CalDavError> {
        let url = self.node.live_url()?;
        let outcome = self.node.client.get(url).await?;

        if let Some(kind) = ical::component_kind(&outcome.body) {
            self.kind = kind;
        }
        self.data = outcome.body;
        self.etag = outcome.etag;
        self.node.state = ObjectState::Loaded;
        Ok(())
    }

    async fn fetch_etag(&mut self) -> Option<ETag> {
        match self.node.get_properties(&[Prop::GetETag]).await {
            Ok(props) => props.etag(),
            Err(err) => {
                tracing::warn!(
                    url = %self.node.url,
                    %err,
                    "no entity tag after save, next save is unguarded"
                );
                None
            }
        }
    }

    /// Stores the object with PUT.
    ///
    /// A new object must not overwrite an existing one. A loaded object must
    /// still carry the entity tag seen last, or simply exist when none was
    /// reported. A redirect moves the object to the location the server
    /// gives. When the PUT response has no entity tag, it is fetched with a
    /// PROPFIND so the next save stays guarded.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::PreconditionFailed`] when the object changed
    /// or appeared on the server in the meantime, or another error of the PUT.
    pub async fn save(&mut self) -> Result<(), CalDavError> {
        let url = self.node.live_url()?.clone();
        let precondition = match (self.node.state, &self.etag) {
            (ObjectState::Detached, _) => Precondition::IfNoneMatchAny,
            (_, Some(etag)) => Precondition::IfMatch(etag.clone()),
            (_, None) => Precondition::IfMatchAny,
        };

        let outcome = self
            .node
            .client
            .put(&url, &self.data, CALENDAR_CONTENT_TYPE, &precondition)
            .await?;
        tracing::debug!(%url, status = outcome.status, "stored calendar object");

        if (300..400).contains(&outcome.status)
            && let Some(location) = outcome.location
        {
            tracing::warn!(from = %url, to = %location, "server moved calendar object");
            self.node.url = location;
        }
        self.node.state = ObjectState::Loaded;
        self.etag = match outcome.etag {
            Some(etag) => Some(etag),
            None => self.fetch_etag().await,
        };
        Ok(())
    }

    /// Deletes the object, provided it still carries the known entity tag.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::StaleObject`] if already deleted,
    /// [`CalDavError::PreconditionFailed`] if the object changed, or another
    /// error of the DELETE.
    pub async fn delete(&mut self) -> Result<(), CalDavError> {
        let etag = self.etag.clone();
        self.node.delete(etag.as_ref()).await
    }

    /// A new, unsaved copy of this object.
    ///
    /// Unless `keep_uid`, the copy gets a fresh UID. It goes into `target`,
    /// or this object's calendar when `None`. The source is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::CalendarData`] if the payload holds no
    /// calendar component, or [`CalDavError::Config`] if this object has no
    /// known calendar and no target is given.
    pub fn copy(&self, keep_uid: bool, target: Option<&Calendar>) -> Result<Self, CalDavError> {
        let parent = match target {
            Some(calendar) => calendar.node.url.clone(),
            None => self.node.parent.clone().ok_or_else(|| {
                CalDavError::Config(format!("{} has no known calendar", self.node.url))
            })?,
        };
        let data = match keep_uid {
            true => self.data.clone(),
            false => ical::set_uid(&self.data, &uuid::Uuid::new_v4().to_string())?,
        };
        Self::create(self.node.client.clone(), &parent, data, None)
    }

    /// Marks a to-do completed and stores it.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::CalendarData`] if the object is not a to-do,
    /// or the error of the save.
    pub async fn complete(&mut self, at: Option<Timestamp>) -> Result<(), CalDavError> {
        if self.kind != ComponentKind::Todo {
            return Err(CalDavError::CalendarData(format!(
                "cannot complete a {}",
                self.kind
            )));
        }
        let completed = ical::mark_completed(&self.data, at.unwrap_or_else(Timestamp::now))?;
        let previous = std::mem::replace(&mut self.data, completed);
        if let Err(err) = self.save().await {
            self.data = previous;
            return Err(err);
        }
        Ok(())
    }
}
