use super::blocking::BlockingSpaceTrackClient;
use super::core::{ClientCore, Credentials};
use super::execution::SpaceTrackClient;
use crate::cache::{DiskCache, SchemaCache};
use crate::error::ErrorContext;
use crate::registry::ControllerRegistry;
use crate::resilience::{Clock, Quota, RateLimitCallback, RateLimitStore, RateLimiter, RateLimiterConfig};
use crate::schema::UnknownTypePolicy;
use crate::transport::{
    BlockingHttpExecutor, BlockingHttpTransport, HttpExecutor, HttpTransport, TransportConfig,
};
use crate::{Error, Result};
use keyring::Entry;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.space-track.org/";
const KEYRING_SERVICE: &str = "spacetrack";

/// Builder for [`SpaceTrackClient`] and [`BlockingSpaceTrackClient`].
///
/// Unset values fall back to environment variables at build time:
/// - `SPACETRACK_IDENTITY`, `SPACETRACK_PASSWORD`
/// - `SPACETRACK_BASE_URL` (default `https://www.space-track.org/`)
/// - `SPACETRACK_HTTP_TIMEOUT_SECS` (default 30)
/// - `SPACETRACK_CACHE_DIR` enables the on-disk predicate cache
/// - `SPACETRACK_CA_BUNDLE` path to extra PEM root certificates
///
/// The password is looked up explicitly, then in the OS keyring (service
/// `spacetrack`, user = identity), then in the environment.
pub struct SpaceTrackClientBuilder {
    identity: Option<String>,
    password: Option<String>,
    session_token: Option<String>,
    use_keyring: bool,
    base_url: Option<String>,
    timeout: Option<Duration>,
    ca_bundle: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    cache_max_age: Option<Duration>,
    rate_limits: RateLimiterConfig,
    store: Option<Arc<dyn RateLimitStore>>,
    clock: Option<Arc<dyn Clock>>,
    callback: Option<RateLimitCallback>,
    registry: Option<ControllerRegistry>,
    policy: UnknownTypePolicy,
    transport: Option<Arc<dyn HttpExecutor>>,
    blocking_transport: Option<Arc<dyn BlockingHttpExecutor>>,
}

impl SpaceTrackClientBuilder {
    pub fn new() -> Self {
        Self {
            identity: None,
            password: None,
            session_token: None,
            use_keyring: true,
            base_url: None,
            timeout: None,
            ca_bundle: None,
            cache_dir: None,
            cache_max_age: None,
            rate_limits: RateLimiterConfig::new(),
            store: None,
            clock: None,
            callback: None,
            registry: None,
            policy: UnknownTypePolicy::default(),
            transport: None,
            blocking_transport: None,
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Reuse an existing `chocolatechip` session cookie instead of logging in.
    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Enable or disable the OS keyring password lookup.
    pub fn use_keyring(mut self, enable: bool) -> Self {
        self.use_keyring = enable;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle = Some(path.into());
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// How long on-disk predicate files stay valid (default one day).
    pub fn cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = Some(max_age);
        self
    }

    /// Replace both rate windows (default 30/minute and 300/hour).
    pub fn rate_limits(mut self, cfg: RateLimiterConfig) -> Self {
        self.rate_limits = cfg;
        self
    }

    /// An extra window on top of the per-minute and per-hour ones.
    pub fn additional_rate_limit(mut self, quota: Quota) -> Self {
        self.rate_limits = self.rate_limits.with_additional(quota);
        self
    }

    /// Share admissions through `store`; clients using the same store and key
    /// prefix draw from one quota.
    pub fn rate_limit_store(mut self, store: Arc<dyn RateLimitStore>, key_prefix: impl Into<String>) -> Self {
        self.store = Some(store);
        self.rate_limits = self.rate_limits.with_key_prefix(key_prefix);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn callback(mut self, callback: RateLimitCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn registry(mut self, registry: ControllerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn unknown_type_policy(mut self, policy: UnknownTypePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a custom async executor instead of reqwest.
    pub fn transport(mut self, transport: Arc<dyn HttpExecutor>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom blocking executor instead of reqwest.
    pub fn blocking_transport(mut self, transport: Arc<dyn BlockingHttpExecutor>) -> Self {
        self.blocking_transport = Some(transport);
        self
    }

    pub fn build(mut self) -> Result<SpaceTrackClient> {
        let transport = self.transport.take();
        let (core, transport_cfg) = self.into_core()?;
        let transport = match transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&transport_cfg)?),
        };
        Ok(SpaceTrackClient::from_parts(core, transport))
    }

    pub fn build_blocking(mut self) -> Result<BlockingSpaceTrackClient> {
        let transport = self.blocking_transport.take();
        let (core, transport_cfg) = self.into_core()?;
        let transport = match transport {
            Some(t) => t,
            None => Arc::new(BlockingHttpTransport::new(&transport_cfg)?),
        };
        Ok(BlockingSpaceTrackClient::from_parts(core, transport))
    }

    fn into_core(self) -> Result<(Arc<ClientCore>, TransportConfig)> {
        let base_url = parse_base_url(
            self.base_url
                .or_else(|| env::var("SPACETRACK_BASE_URL").ok())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        )?;

        let credentials = match &self.session_token {
            Some(_) => Credentials::SessionToken,
            None => {
                let identity = self
                    .identity
                    .or_else(|| env::var("SPACETRACK_IDENTITY").ok())
                    .ok_or_else(|| {
                        missing("identity or session token is required", "SPACETRACK_IDENTITY")
                    })?;
                let password = self
                    .password
                    .or_else(|| self.use_keyring.then(|| keyring_password(&identity)).flatten())
                    .or_else(|| env::var("SPACETRACK_PASSWORD").ok())
                    .ok_or_else(|| missing("password is required", "SPACETRACK_PASSWORD"))?;
                Credentials::Password { identity, password }
            }
        };

        let timeout = self.timeout.unwrap_or_else(|| {
            Duration::from_secs(
                env::var("SPACETRACK_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(30),
            )
        });

        let ca_bundle = match self
            .ca_bundle
            .or_else(|| env::var_os("SPACETRACK_CA_BUNDLE").map(PathBuf::from))
        {
            Some(path) => Some(std::fs::read(&path).map_err(|e| {
                Error::configuration_with_context(
                    format!("cannot read CA bundle: {}", e),
                    ErrorContext::new()
                        .with_field_path("ca_bundle")
                        .with_details(path.display().to_string())
                        .with_source("builder"),
                )
            })?),
            None => None,
        };

        let disk = self
            .cache_dir
            .or_else(|| env::var_os("SPACETRACK_CACHE_DIR").map(PathBuf::from))
            .map(|dir| {
                let cache = DiskCache::new(dir, base_url.as_str());
                match self.cache_max_age {
                    Some(max_age) => cache.with_max_age(max_age),
                    None => cache,
                }
            });

        let store = self.store;
        let limiter = match (store, self.clock) {
            (Some(store), Some(clock)) => {
                RateLimiter::with_store_and_clock(self.rate_limits, store, clock)
            }
            (Some(store), None) => RateLimiter::with_store(self.rate_limits, store),
            (None, Some(clock)) => RateLimiter::with_store_and_clock(
                self.rate_limits,
                Arc::new(crate::resilience::MemoryStore::new()),
                clock,
            ),
            (None, None) => RateLimiter::new(self.rate_limits),
        };
        limiter.set_callback(self.callback);

        let transport_cfg = TransportConfig {
            timeout,
            ca_bundle,
            session_token: self.session_token,
            ..TransportConfig::default()
        };

        let core = ClientCore {
            registry: self.registry.unwrap_or_else(ControllerRegistry::spacetrack),
            schemas: SchemaCache::new(),
            disk,
            limiter: Arc::new(limiter),
            base_url,
            credentials,
            policy: self.policy,
        };
        Ok((Arc::new(core), transport_cfg))
    }
}

impl Default for SpaceTrackClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_base_url(raw: String) -> Result<Url> {
    let normalized = if raw.ends_with('/') { raw } else { format!("{}/", raw) };
    let url = Url::parse(&normalized).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid base URL: {}", e),
            ErrorContext::new()
                .with_field_path("base_url")
                .with_details(normalized.clone())
                .with_source("builder"),
        )
    })?;
    if url.cannot_be_a_base() {
        return Err(Error::configuration_with_context(
            "base URL must be hierarchical",
            ErrorContext::new()
                .with_field_path("base_url")
                .with_details(normalized)
                .with_source("builder"),
        ));
    }
    Ok(url)
}

fn keyring_password(identity: &str) -> Option<String> {
    Entry::new(KEYRING_SERVICE, identity)
        .ok()?
        .get_password()
        .ok()
}

fn missing(message: &str, env_var: &str) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_field_path(env_var)
            .with_source("builder"),
    )
}
