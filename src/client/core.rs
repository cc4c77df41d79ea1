//! State shared by the async and blocking clients.

use crate::cache::{DiskCache, SchemaCache};
use crate::registry::{ControllerRegistry, RequestClassDescriptor, SchemaSource};
use crate::resilience::RateLimiter;
use crate::schema::{parse_modeldef, parse_modeldef_response, Predicate, UnknownTypePolicy};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

#[derive(Clone)]
pub(crate) enum Credentials {
    Password { identity: String, password: String },
    /// Pre-established `chocolatechip` cookie; no login request is made.
    SessionToken,
}

impl Credentials {
    pub(crate) fn identity(&self) -> &str {
        match self {
            Credentials::Password { identity, .. } => identity,
            Credentials::SessionToken => "<session token>",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { identity, .. } => f
                .debug_struct("Password")
                .field("identity", identity)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::SessionToken => f.write_str("SessionToken"),
        }
    }
}

pub(crate) struct ClientCore {
    pub(crate) registry: ControllerRegistry,
    pub(crate) schemas: SchemaCache,
    pub(crate) disk: Option<DiskCache>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) base_url: Url,
    pub(crate) credentials: Credentials,
    pub(crate) policy: UnknownTypePolicy,
}

impl ClientCore {
    pub(crate) fn resolve(
        &self,
        class: &str,
        controller: Option<&str>,
    ) -> Result<Arc<RequestClassDescriptor>> {
        self.registry.resolve(class, controller)
    }

    /// Predicates available without a network round trip: offline sets, the
    /// session cache, then the disk cache.
    pub(crate) fn known_predicates(
        &self,
        descriptor: &RequestClassDescriptor,
    ) -> Option<Arc<[Predicate]>> {
        if let SchemaSource::Offline(predicates) = &descriptor.schema {
            return Some(predicates.clone().into());
        }
        let key = descriptor.key();
        if let Some(found) = self.schemas.get(&key) {
            return Some(found);
        }
        let data = self.disk.as_ref()?.load(&key)?;
        match parse_modeldef(&data) {
            Ok(predicates) => {
                debug!(class = %key, "Loaded predicates from disk cache");
                Some(self.schemas.seed(&key, predicates))
            }
            Err(e) => {
                debug!(class = %key, error = %e, "Ignoring cached predicates");
                None
            }
        }
    }

    /// Parse a modeldef response body and publish it to both caches.
    pub(crate) fn publish_modeldef(
        &self,
        descriptor: &RequestClassDescriptor,
        body: &[u8],
    ) -> Result<Arc<[Predicate]>> {
        let json: Value = serde_json::from_slice(body)?;
        let predicates = parse_modeldef_response(&json)?;
        let key = descriptor.key();
        if let (Some(disk), Some(data)) = (&self.disk, json.get("data")) {
            if let Err(e) = disk.store(&key, data) {
                warn!(class = %key, error = %e, "Could not write predicate cache");
            }
        }
        Ok(self.schemas.publish(&key, predicates))
    }

    /// Schema used for `parse_types`. Offline classes have none.
    pub(crate) fn type_schema<'a>(
        descriptor: &RequestClassDescriptor,
        predicates: &'a [Predicate],
    ) -> Option<&'a [Predicate]> {
        descriptor.needs_remote_schema().then_some(predicates)
    }

    pub(crate) fn schema_error(descriptor: &RequestClassDescriptor, err: Error) -> Error {
        match err {
            Error::SchemaUnavailable { .. } | Error::Authentication { .. } => err,
            other => Error::schema_unavailable(&descriptor.controller, &descriptor.name, other),
        }
    }
}
