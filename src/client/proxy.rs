//! Controller-pinned views of a client (`client.controller("fileshare")`).

use super::blocking::{BlockingShapedResponse, BlockingSpaceTrackClient};
use super::execution::{ShapedResponse, SpaceTrackClient};
use crate::dispatch::Query;
use crate::registry::ControllerRegistry;
use crate::schema::Predicate;
use crate::{Error, Result};
use std::sync::Arc;

/// Resolves request classes inside one controller only.
pub struct ControllerProxy<'a, C> {
    client: &'a C,
    controller: String,
}

impl<'a, C> ControllerProxy<'a, C> {
    pub(crate) fn new(client: &'a C, registry: &ControllerRegistry, controller: &str) -> Result<Self> {
        if registry.controller(controller).is_none() {
            return Err(Error::UnknownController {
                controller: controller.to_string(),
            });
        }
        Ok(Self {
            client,
            controller: controller.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.controller
    }

    /// A query for `class` within this controller.
    pub fn query(&self, class: &str) -> Query {
        Query::new(class).controller(self.controller.clone())
    }
}

impl ControllerProxy<'_, SpaceTrackClient> {
    pub async fn request(&self, query: Query) -> Result<ShapedResponse> {
        self.client
            .generic_request(query.controller(self.controller.clone()))
            .await
    }

    pub async fn get_predicates(&self, class: &str) -> Result<Arc<[Predicate]>> {
        self.client.get_predicates(class, Some(&self.controller)).await
    }
}

impl ControllerProxy<'_, BlockingSpaceTrackClient> {
    pub fn request(&self, query: Query) -> Result<BlockingShapedResponse> {
        self.client
            .generic_request(query.controller(self.controller.clone()))
    }

    pub fn get_predicates(&self, class: &str) -> Result<Arc<[Predicate]>> {
        self.client.get_predicates(class, Some(&self.controller))
    }
}
