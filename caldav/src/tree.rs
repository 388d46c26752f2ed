// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Resource tree: principal, calendar home, calendars and calendar objects.
//!
//! Nodes are built locally and checked against the server only when a
//! remote method runs. Each node refers to its parent by locator, never by
//! ownership, so a caller may keep any node around on its own.

mod calendar;
mod home_set;
mod node;
mod object;
mod principal;

pub use crate::tree::calendar::Calendar;
pub use crate::tree::home_set::CalendarHomeSet;
pub use crate::tree::node::{Child, DavObject, ObjectState};
pub use crate::tree::object::CalendarObject;
pub use crate::tree::principal::Principal;

/// Implements [`DavObject`] and the generic property operations for a node type.
macro_rules! dav_object {
    ($ty:ty) => {
        impl $crate::tree::DavObject for $ty {
            fn url(&self) -> &$crate::url::Locator {
                &self.node.url
            }

            fn parent_url(&self) -> Option<&$crate::url::Locator> {
                self.node.parent.as_ref()
            }

            fn state(&self) -> $crate::tree::ObjectState {
                self.node.state
            }

            fn properties(&self) -> &$crate::response::PropertyMap {
                &self.node.properties
            }

            fn client(&self) -> &$crate::client::DavClient {
                &self.node.client
            }
        }

        impl $ty {
            /// Fetches properties with a depth-0 PROPFIND and merges them into the cache.
            ///
            /// # Errors
            ///
            /// Returns [`CalDavError::StaleObject`](crate::CalDavError::StaleObject)
            /// if the node was deleted, or the error of the exchange.
            pub async fn get_properties(
                &mut self,
                props: &[$crate::request::Prop],
            ) -> Result<$crate::response::PropertyMap, $crate::error::CalDavError> {
                self.node.get_properties(props).await
            }

            /// Updates properties with a PROPPATCH.
            ///
            /// # Errors
            ///
            /// Returns [`CalDavError::Request`](crate::CalDavError::Request)
            /// if the server refused any of the updates.
            pub async fn set_properties(
                &mut self,
                props: Vec<$crate::xml::Element>,
            ) -> Result<(), $crate::error::CalDavError> {
                self.node.set_properties(props).await
            }

            /// Lists direct members, optionally only those of one resource type.
            ///
            /// # Errors
            ///
            /// Returns the error of the depth-1 PROPFIND.
            pub async fn children(
                &self,
                resource_type: Option<&$crate::xml::ElementName>,
            ) -> Result<Vec<$crate::tree::Child>, $crate::error::CalDavError> {
                self.node.children(resource_type).await
            }
        }
    };
}

dav_object!(Principal);
dav_object!(CalendarHomeSet);
dav_object!(Calendar);
dav_object!(CalendarObject);
