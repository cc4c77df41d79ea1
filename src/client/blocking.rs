//! Blocking Space-Track client.
//!
//! Same resolution, validation and rate limiting as the async client; waits
//! and transport calls block the calling thread. Must not be used from inside
//! an async runtime.

use super::core::{ClientCore, Credentials};
use super::preflight;
use super::proxy::ControllerProxy;
use crate::cache::SchemaCacheStats;
use crate::dispatch::{
    check_login, check_options, login_request, logout_request, modeldef_request, plan_request,
    CallState, CallTracker, Query, ResponseMode,
};
use crate::error::ErrorContext;
use crate::pipeline::{shape_buffered, ChunkIter, LineIter, Shaped};
use crate::registry::{ControllerRegistry, RequestClassDescriptor};
use crate::resilience::{RateLimitCallback, RateLimiter};
use crate::schema::Predicate;
use crate::transport::BlockingHttpExecutor;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Response of [`BlockingSpaceTrackClient::generic_request`].
pub type BlockingShapedResponse = Shaped<LineIter, ChunkIter>;

pub struct BlockingSpaceTrackClient {
    core: Arc<ClientCore>,
    transport: Arc<dyn BlockingHttpExecutor>,
    authenticated: Mutex<bool>,
    closed: AtomicBool,
}

impl BlockingSpaceTrackClient {
    pub fn builder() -> super::SpaceTrackClientBuilder {
        super::SpaceTrackClientBuilder::new()
    }

    pub(crate) fn from_parts(
        core: Arc<ClientCore>,
        transport: Arc<dyn BlockingHttpExecutor>,
    ) -> Self {
        let authenticated = matches!(core.credentials, Credentials::SessionToken);
        Self {
            core,
            transport,
            authenticated: Mutex::new(authenticated),
            closed: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.core.registry
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.core.limiter
    }

    pub fn schema_cache_stats(&self) -> SchemaCacheStats {
        self.core.schemas.stats()
    }

    pub fn set_callback(&self, callback: Option<RateLimitCallback>) {
        self.core.limiter.set_callback(callback);
    }

    pub fn controller(&self, controller: &str) -> Result<ControllerProxy<'_, Self>> {
        ControllerProxy::new(self, &self.core.registry, controller)
    }

    fn session(&self) -> Result<MutexGuard<'_, bool>> {
        self.authenticated.lock().map_err(|_| {
            Error::configuration_with_context(
                "session state lock poisoned",
                ErrorContext::new().with_source("blocking_client"),
            )
        })
    }

    pub fn authenticate(&self) -> Result<()> {
        let mut authenticated = self.session()?;
        if *authenticated {
            return Ok(());
        }
        let (identity, password) = match &self.core.credentials {
            Credentials::Password { identity, password } => (identity, password),
            Credentials::SessionToken => {
                *authenticated = true;
                return Ok(());
            }
        };
        let resp = self
            .transport
            .execute(login_request(&self.core.base_url, identity, password)?)?;
        let status = resp.status;
        let body = resp.bytes()?;
        check_login(identity, status, &body)?;
        info!(identity = %identity, "Logged in to Space-Track");
        *authenticated = true;
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        let mut authenticated = self.session()?;
        if !*authenticated {
            return Ok(());
        }
        let resp = self.transport.execute(logout_request(&self.core.base_url)?)?;
        if !resp.is_success() {
            let status = resp.status;
            let body = resp.bytes()?;
            return Err(Error::RequestFailed {
                status,
                message: crate::pipeline::error_message(&body),
            });
        }
        *authenticated = false;
        debug!("Logged out of Space-Track");
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        self.logout()
    }

    pub fn get_predicates(&self, class: &str, controller: Option<&str>) -> Result<Arc<[Predicate]>> {
        let descriptor = self.core.resolve(class, controller)?;
        self.predicates_for(&descriptor)
    }

    pub fn generic_request(&self, query: Query) -> Result<BlockingShapedResponse> {
        let mut call = CallTracker::new(query.class());
        match self.dispatch(&query, &mut call) {
            Ok(shaped) => {
                call.advance(CallState::Shaped);
                Ok(shaped)
            }
            Err(e) => Err(call.fail(e)),
        }
    }

    fn dispatch(&self, query: &Query, call: &mut CallTracker) -> Result<BlockingShapedResponse> {
        let descriptor = self.core.resolve(query.class(), query.controller_hint())?;
        check_options(&descriptor, query)?;
        let predicates = self.predicates_for(&descriptor)?;
        call.advance(CallState::SchemaReady);

        let plan = plan_request(&self.core.base_url, descriptor, query, &predicates)?;
        call.advance(CallState::Validated);

        self.authenticate()?;
        let resp = preflight::send_blocking(&self.core, &*self.transport, &plan.request, Some(call))?;

        match plan.mode {
            ResponseMode::Lines => Ok(Shaped::Lines(LineIter::new(resp.body))),
            ResponseMode::Chunks => Ok(Shaped::Chunks(ChunkIter::new(resp.body, plan.decode_text()))),
            ResponseMode::Buffered => {
                let body = resp.bytes()?;
                let schema = ClientCore::type_schema(&plan.descriptor, &predicates);
                shape_buffered(&plan, body, schema, self.core.policy)
            }
        }
    }

    fn predicates_for(&self, descriptor: &RequestClassDescriptor) -> Result<Arc<[Predicate]>> {
        if let Some(known) = self.core.known_predicates(descriptor) {
            return Ok(known);
        }
        self.authenticate()?;
        self.fetch_modeldef(descriptor)
            .map_err(|e| ClientCore::schema_error(descriptor, e))
    }

    fn fetch_modeldef(&self, descriptor: &RequestClassDescriptor) -> Result<Arc<[Predicate]>> {
        let request = modeldef_request(&self.core.base_url, descriptor)?;
        let resp = preflight::send_blocking(&self.core, &*self.transport, &request, None)?;
        let body = resp.bytes()?;
        self.core.publish_modeldef(descriptor, &body)
    }
}

impl Drop for BlockingSpaceTrackClient {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        let logged_in = self.authenticated.try_lock().map(|g| *g).unwrap_or(true);
        if logged_in && matches!(self.core.credentials, Credentials::Password { .. }) {
            warn!(
                identity = %self.core.credentials.identity(),
                "BlockingSpaceTrackClient dropped without close(); the session was not logged out"
            );
        }
    }
}
