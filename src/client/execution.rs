//! 异步客户端：登录、谓词获取与请求调度。
//!
//! Async Space-Track client.

use super::core::{ClientCore, Credentials};
use super::preflight;
use super::proxy::ControllerProxy;
use crate::cache::SchemaCacheStats;
use crate::dispatch::{
    check_login, check_options, login_request, logout_request, modeldef_request, plan_request,
    CallState, CallTracker, Query, ResponseMode,
};
use crate::pipeline::{chunk_stream, line_stream, shape_buffered, ChunkStream, LineStream, Shaped};
use crate::registry::{ControllerRegistry, RequestClassDescriptor};
use crate::resilience::{RateLimitCallback, RateLimiter};
use crate::schema::Predicate;
use crate::transport::HttpExecutor;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Response of [`SpaceTrackClient::generic_request`].
pub type ShapedResponse = Shaped<LineStream, ChunkStream>;

/// Async client for the Space-Track API.
///
/// Logs in lazily on the first request that needs it. Call
/// [`close`](Self::close) when done so the session is logged out.
///
/// ```no_run
/// # async fn run() -> spacetrack::Result<()> {
/// use spacetrack::{Query, SpaceTrackClient};
///
/// let client = SpaceTrackClient::builder()
///     .identity("me@example.com")
///     .password("secret")
///     .build()?;
/// let latest = client
///     .generic_request(Query::new("gp").predicate("norad_cat_id", 25544))
///     .await?
///     .into_json();
/// client.close().await?;
/// # let _ = latest;
/// # Ok(())
/// # }
/// ```
pub struct SpaceTrackClient {
    core: Arc<ClientCore>,
    transport: Arc<dyn HttpExecutor>,
    authenticated: Mutex<bool>,
    closed: AtomicBool,
}

impl SpaceTrackClient {
    pub fn builder() -> super::SpaceTrackClientBuilder {
        super::SpaceTrackClientBuilder::new()
    }

    pub(crate) fn from_parts(core: Arc<ClientCore>, transport: Arc<dyn HttpExecutor>) -> Self {
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

    /// Called with the absolute resume time whenever the limiter delays a call.
    pub fn set_callback(&self, callback: Option<RateLimitCallback>) {
        self.core.limiter.set_callback(callback);
    }

    /// Requests pinned to one controller.
    pub fn controller(&self, controller: &str) -> Result<ControllerProxy<'_, Self>> {
        ControllerProxy::new(self, &self.core.registry, controller)
    }

    /// Log in unless the session is already authenticated.
    ///
    /// Concurrent callers wait for a single in-flight login.
    pub async fn authenticate(&self) -> Result<()> {
        let mut authenticated = self.authenticated.lock().await;
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
        let request = login_request(&self.core.base_url, identity, password)?;
        let resp = self.transport.execute(request).await?;
        let status = resp.status;
        let body = resp.bytes().await?;
        check_login(identity, status, &body)?;
        info!(identity = %identity, "Logged in to Space-Track");
        *authenticated = true;
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        let mut authenticated = self.authenticated.lock().await;
        if !*authenticated {
            return Ok(());
        }
        let resp = self
            .transport
            .execute(logout_request(&self.core.base_url)?)
            .await?;
        if !resp.is_success() {
            let status = resp.status;
            let body = resp.bytes().await?;
            return Err(Error::RequestFailed {
                status,
                message: crate::pipeline::error_message(&body),
            });
        }
        *authenticated = false;
        debug!("Logged out of Space-Track");
        Ok(())
    }

    /// Log out and release the client.
    pub async fn close(self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        self.logout().await
    }

    /// Predicates accepted by a request class.
    pub async fn get_predicates(
        &self,
        class: &str,
        controller: Option<&str>,
    ) -> Result<Arc<[Predicate]>> {
        let descriptor = self.core.resolve(class, controller)?;
        self.predicates_for(&descriptor).await
    }

    /// Run a request-class query.
    pub async fn generic_request(&self, query: Query) -> Result<ShapedResponse> {
        let mut call = CallTracker::new(query.class());
        match self.dispatch(&query, &mut call).await {
            Ok(shaped) => {
                call.advance(CallState::Shaped);
                Ok(shaped)
            }
            Err(e) => Err(call.fail(e)),
        }
    }

    async fn dispatch(&self, query: &Query, call: &mut CallTracker) -> Result<ShapedResponse> {
        let descriptor = self.core.resolve(query.class(), query.controller_hint())?;
        check_options(&descriptor, query)?;
        let predicates = self.predicates_for(&descriptor).await?;
        call.advance(CallState::SchemaReady);

        let plan = plan_request(&self.core.base_url, descriptor, query, &predicates)?;
        call.advance(CallState::Validated);

        self.authenticate().await?;
        let resp = preflight::send(&self.core, &*self.transport, &plan.request, Some(call)).await?;

        match plan.mode {
            ResponseMode::Lines => Ok(Shaped::Lines(line_stream(resp.body))),
            ResponseMode::Chunks => Ok(Shaped::Chunks(chunk_stream(resp.body, plan.decode_text()))),
            ResponseMode::Buffered => {
                let body = resp.bytes().await?;
                let schema = ClientCore::type_schema(&plan.descriptor, &predicates);
                shape_buffered(&plan, body, schema, self.core.policy)
            }
        }
    }

    async fn predicates_for(&self, descriptor: &RequestClassDescriptor) -> Result<Arc<[Predicate]>> {
        if let Some(known) = self.core.known_predicates(descriptor) {
            return Ok(known);
        }
        self.authenticate().await?;
        self.fetch_modeldef(descriptor)
            .await
            .map_err(|e| ClientCore::schema_error(descriptor, e))
    }

    async fn fetch_modeldef(&self, descriptor: &RequestClassDescriptor) -> Result<Arc<[Predicate]>> {
        let request = modeldef_request(&self.core.base_url, descriptor)?;
        let resp = preflight::send(&self.core, &*self.transport, &request, None).await?;
        let body = resp.bytes().await?;
        self.core.publish_modeldef(descriptor, &body)
    }
}

impl Drop for SpaceTrackClient {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        let logged_in = self.authenticated.try_lock().map(|g| *g).unwrap_or(true);
        if logged_in && matches!(self.core.credentials, Credentials::Password { .. }) {
            warn!(
                identity = %self.core.credentials.identity(),
                "SpaceTrackClient dropped without close(); the session was not logged out"
            );
        }
    }
}
