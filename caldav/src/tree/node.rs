// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::client::DavClient;
use crate::error::CalDavError;
use crate::http::Verb;
use crate::request::{Prop, PropPatchRequest};
use crate::response::{MultiStatusResponse, PropertyMap, ResponseItem};
use crate::types::{Depth, ETag};
use crate::url::Locator;
use crate::xml::{Element, ElementName};

/// Lifecycle of a resource tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Built locally, never checked against the server.
    Detached,
    /// Properties or content fetched from, or stored to, the server.
    Loaded,
    /// Deleted; remote operations fail with a stale object error.
    Deleted,
}

/// Read access shared by every resource tree node.
pub trait DavObject {
    /// Locator of the resource.
    fn url(&self) -> &Locator;

    /// Locator of the parent resource, if known.
    fn parent_url(&self) -> Option<&Locator>;

    /// Lifecycle state.
    fn state(&self) -> ObjectState;

    /// Cached properties.
    fn properties(&self) -> &PropertyMap;

    /// The client the node talks through.
    fn client(&self) -> &DavClient;
}

/// A direct member of a collection.
#[derive(Debug, Clone)]
pub struct Child {
    /// Locator of the member.
    pub url: Locator,
    /// Resource type markers.
    pub resource_types: Vec<ElementName>,
    /// Display name, if reported.
    pub display_name: Option<String>,
}

/// State shared by every node type.
#[derive(Debug, Clone)]
pub(crate) struct DavNode {
    pub(crate) client: DavClient,
    pub(crate) url: Locator,
    pub(crate) parent: Option<Locator>,
    pub(crate) state: ObjectState,
    pub(crate) properties: PropertyMap,
    collection: bool,
}

impl DavNode {
    /// A plain resource such as a calendar object.
    pub(crate) fn new(client: DavClient, url: Locator, parent: Option<Locator>) -> Self {
        Self {
            client,
            url,
            parent,
            state: ObjectState::Detached,
            properties: PropertyMap::new(),
            collection: false,
        }
    }

    /// A collection; requests to it use the form the server expects.
    pub(crate) fn collection(client: DavClient, url: Locator, parent: Option<Locator>) -> Self {
        Self {
            collection: true,
            ..Self::new(client, url, parent)
        }
    }

    /// Locator for a remote operation.
    pub(crate) fn live_url(&self) -> Result<&Locator, CalDavError> {
        match self.state {
            ObjectState::Deleted => Err(CalDavError::StaleObject {
                href: self.url.to_string(),
            }),
            ObjectState::Detached | ObjectState::Loaded => Ok(&self.url),
        }
    }

    /// Locator requests are sent to.
    pub(crate) fn request_url(&self) -> Result<Locator, CalDavError> {
        let url = self.live_url()?;
        Ok(match self.collection {
            true => self.client.quirks().collection_url(url),
            false => url.clone(),
        })
    }

    /// Whether `href`, as reported in a response to `url`, names this node.
    pub(crate) fn is_self(&self, url: &Locator, href: &str) -> bool {
        self.client
            .locate(url, href)
            .is_ok_and(|member| self.client.same_resource(&member, &self.url))
    }

    pub(crate) async fn get_properties(
        &mut self,
        props: &[Prop],
    ) -> Result<PropertyMap, CalDavError> {
        let fetched = self.fetch_properties(props).await?;
        self.properties.extend(fetched.iter().map(|(_, p)| p.clone()));
        self.state = ObjectState::Loaded;
        Ok(fetched)
    }

    /// Fetches properties and replaces the cache with them.
    pub(crate) async fn load(&mut self, props: &[Prop]) -> Result<(), CalDavError> {
        self.properties = self.fetch_properties(props).await?;
        self.state = ObjectState::Loaded;
        Ok(())
    }

    async fn fetch_properties(&self, props: &[Prop]) -> Result<PropertyMap, CalDavError> {
        let url = self.request_url()?;
        let ms = self.client.propfind(&url, props, Depth::Zero).await?;
        let item = self.own_response(&url, &ms)?;

        if item.is_failure() {
            return Err(match item.failure_status() {
                Some(404) => CalDavError::NotFound {
                    href: url.to_string(),
                    status: Some(404),
                },
                status => CalDavError::Request {
                    verb: Verb::Propfind,
                    href: url.to_string(),
                    status: status.unwrap_or_default(),
                    body: String::new(),
                },
            });
        }
        Ok(item.properties())
    }

    /// The response about this node, tolerating a trailing-slash mismatch.
    ///
    /// A single response is taken as ours whatever its href, since some
    /// servers report a different spelling of the requested URL.
    fn own_response<'a>(
        &self,
        url: &Locator,
        ms: &'a MultiStatusResponse,
    ) -> Result<&'a ResponseItem, CalDavError> {
        let matching = ms.responses.iter().find(|item| self.is_self(url, &item.href));

        match (matching, ms.responses.as_slice()) {
            (Some(item), _) => Ok(item),
            (None, [only]) => {
                tracing::debug!(
                    url = %self.url,
                    href = %only.href,
                    "taking the only response as ours"
                );
                Ok(only)
            }
            (None, _) => Err(CalDavError::ProtocolDecode {
                href: Some(self.url.to_string()),
                message: "no response for the requested resource".to_string(),
            }),
        }
    }

    pub(crate) async fn set_properties(
        &mut self,
        props: Vec<Element>,
    ) -> Result<(), CalDavError> {
        let url = self.request_url()?;
        let request = props
            .iter()
            .cloned()
            .fold(PropPatchRequest::new(), PropPatchRequest::set);
        self.client.proppatch(&url, &request).await?;
        self.properties.extend(props);
        Ok(())
    }

    pub(crate) async fn children(
        &self,
        resource_type: Option<&ElementName>,
    ) -> Result<Vec<Child>, CalDavError> {
        let url = self.request_url()?;
        let ms = self
            .client
            .propfind(&url, &[Prop::ResourceType, Prop::DisplayName], Depth::One)
            .await?;

        let mut children = Vec::new();
        for item in &ms.responses {
            let child_url = match self.client.locate(&url, &item.href) {
                Ok(loc) => loc,
                Err(err) => {
                    tracing::warn!(href = %item.href, %err, "skipping member with malformed href");
                    continue;
                }
            };
            if self.client.same_resource(&child_url, &self.url) || item.is_failure() {
                continue;
            }

            let props = item.properties();
            let resource_types = props.resource_types();
            if resource_type.is_some_and(|rt| !resource_types.contains(rt)) {
                continue;
            }
            children.push(Child {
                url: child_url,
                resource_types,
                display_name: props.display_name().map(str::to_string),
            });
        }
        Ok(children)
    }

    pub(crate) async fn delete(&mut self, if_match: Option<&ETag>) -> Result<(), CalDavError> {
        let url = self.request_url()?;
        self.client.delete(&url, if_match).await?;
        self.state = ObjectState::Deleted;
        Ok(())
    }
}
