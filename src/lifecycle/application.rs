//! The application orchestrator.
//!
//! # Lifecycle
//! ```text
//! build:  load config (listener or file)                      → Configured
//! run:    publish resources → banner → pre_apply
//!         → compose router (interceptors, limits, middleware, pool)
//!         → pre_start → bind + serve                          → Serving
//!         → wait for signal / ServerHandle::shutdown          → ShuttingDown
//!         → pre_stop → drain within exit_delay → post_stop    → Stopped
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router};
use clap::Parser;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::config::{self, AppConfig, ConfigError, StartupArgs};
use crate::exception::translator::failure_context;
use crate::http::interceptor::{interceptor_chain, InterceptorChain, MethodInterceptor};
use crate::http::middleware::{self, Middleware};
use crate::http::HttpServer;
use crate::lifecycle::resources::{Resources, ServerHandle};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::lifecycle::state::{ServerState, StateCell};
use crate::listener::{fire, ApplicationEventListener, LifecycleEvent, Listeners};
use crate::resp::{EnvelopePool, ResponseBody};

/// Default graceful shutdown deadline.
pub const DEFAULT_EXIT_DELAY: Duration = Duration::from_secs(3);

/// Fatal lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

pub struct Application {
    config: Arc<AppConfig>,
    source: Arc<::config::Config>,
    events: Vec<Arc<dyn ApplicationEventListener>>,
    middlewares: Vec<Middleware>,
    interceptors: Vec<Arc<dyn MethodInterceptor>>,
    routes: Router,
    banner: Option<String>,
    exit_delay: Duration,
    pool: EnvelopePool,
    dispatch: Option<Dispatch>,
    resources: Resources,
    state: StateCell,
    shutdown: Shutdown,
}

impl Application {
    /// Build from the `-c/--config` startup flag (default `app.yml`).
    pub fn new(listeners: Listeners, middlewares: Vec<Middleware>) -> Result<Self, LifecycleError> {
        let args = StartupArgs::parse();
        Self::with_config_file(args.config, listeners, middlewares)
    }

    /// Build with the default middleware stack: access log, exception
    /// translator, CORS.
    pub fn with_defaults(listeners: Listeners) -> Result<Self, LifecycleError> {
        Self::new(listeners, middleware::defaults())
    }

    /// Build reading `path` unless a config listener supplies the source.
    pub fn with_config_file(
        path: impl AsRef<Path>,
        listeners: Listeners,
        middlewares: Vec<Middleware>,
    ) -> Result<Self, LifecycleError> {
        let Listeners {
            config: config_listener,
            events,
        } = listeners;

        let (config, source) = config::load(path.as_ref(), config_listener.as_deref())?;

        let state = StateCell::new();
        state.advance(ServerState::Configured);

        Ok(Self {
            config: Arc::new(config),
            source: Arc::new(source),
            events,
            middlewares,
            interceptors: Vec::new(),
            routes: Router::new(),
            banner: None,
            exit_delay: DEFAULT_EXIT_DELAY,
            pool: EnvelopePool::new(),
            dispatch: None,
            resources: Resources::new(),
            state,
            shutdown: Shutdown::new(),
        })
    }

    /// Text printed to stdout before `pre_apply`.
    pub fn banner_text(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }

    /// Graceful shutdown deadline.
    pub fn exit_delay(mut self, delay: Duration) -> Self {
        self.exit_delay = delay;
        self
    }

    /// Register an interceptor after those already registered.
    pub fn interceptor(mut self, interceptor: impl MethodInterceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Register shared interceptors, keeping their order.
    pub fn interceptors<I>(mut self, interceptors: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn MethodInterceptor>>,
    {
        self.interceptors.extend(interceptors);
        self
    }

    /// Append a global middleware; it runs inside the ones already given.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Merge application routes.
    pub fn routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Subscriber for everything the application and its requests log.
    pub fn log(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Replace the envelope pool with one producing custom bodies.
    pub fn envelope_factory<F, B>(mut self, factory: F) -> Self
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: ResponseBody,
    {
        self.pool = EnvelopePool::with_factory(factory);
        self
    }

    /// Deserialize a caller-defined struct from the whole configuration.
    pub fn read_config<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        (*self.source).clone().try_deserialize().map_err(ConfigError::Parse)
    }

    /// Deserialize one section (`"database"`, `"cache.redis"`, ...).
    pub fn read_config_sub<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.source.get(key).map_err(ConfigError::Parse)
    }

    /// Framework settings loaded at build time.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry shared with listeners; filled during `run`.
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// Watch state transitions, e.g. to wait for `Serving`.
    pub fn subscribe_state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serve until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), LifecycleError> {
        self.run_until(signals::terminate()).await
    }

    /// Serve until `signal` resolves or [`ServerHandle::shutdown`] is called.
    pub async fn run_until<F>(self, signal: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()> + Send,
    {
        match self.dispatch.clone() {
            Some(dispatch) => self.drive(signal).with_subscriber(dispatch).await,
            None => self.drive(signal).await,
        }
    }

    async fn drive<F>(self, signal: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            config,
            source,
            events,
            middlewares,
            interceptors,
            routes,
            banner,
            exit_delay,
            pool,
            dispatch: _,
            resources,
            state,
            shutdown,
        } = self;

        resources.insert_shared(Arc::clone(&config));
        resources.insert_shared(source);
        resources.insert(pool.clone());

        if let Some(banner) = &banner {
            println!("{banner}");
        }

        fire(&events, LifecycleEvent::PreApply);

        let mut router = failure_context().apply(routes);
        if !interceptors.is_empty() {
            tracing::debug!(interceptors = interceptors.len(), "Installing interceptor chain");
            router = interceptor_chain(InterceptorChain::new(interceptors)).apply(router);
        }
        router = middleware::limits(&config.server).apply(router);
        for middleware in middlewares.into_iter().rev() {
            tracing::debug!(middleware = middleware.name(), "Applying middleware");
            router = middleware.apply(router);
        }
        let router = router.layer(Extension(pool));

        fire(&events, LifecycleEvent::PreStart);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let server = HttpServer::bind(addr, router, config.server.read_timeout())
            .await
            .map_err(|source| LifecycleError::Bind { addr, source })?;
        let local_addr = server
            .local_addr()
            .map_err(|source| LifecycleError::Bind { addr, source })?;

        let stop = Shutdown::new();
        let mut server_task =
            tokio::spawn(server.run(stop.clone(), exit_delay).with_current_subscriber());
        resources.insert(ServerHandle::new(local_addr, shutdown.clone()));
        state.advance(ServerState::Serving);
        tracing::info!(
            address = %local_addr,
            env = %config.server.env,
            "Server started"
        );

        let early_exit = tokio::select! {
            _ = signal => None,
            _ = shutdown.requested() => {
                tracing::info!("Shutdown requested");
                None
            }
            joined = &mut server_task => Some(joined),
        };

        state.advance(ServerState::ShuttingDown);
        fire(&events, LifecycleEvent::PreStop);

        let joined = match early_exit {
            Some(joined) => joined,
            None => {
                stop.trigger();
                server_task.await
            }
        };
        let report = joined.map_err(|err| {
            tracing::error!(error = %err, "Server task failed");
            LifecycleError::Shutdown(err.to_string())
        })?;

        fire(&events, LifecycleEvent::PostStop);
        state.advance(ServerState::Stopped);
        tracing::info!(
            drained = report.drained,
            aborted = report.aborted,
            "Server stopped"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("events", &self.events.len())
            .field("middlewares", &self.middlewares)
            .field("interceptors", &self.interceptors.len())
            .field("exit_delay", &self.exit_delay)
            .field("state", &self.state.get())
            .finish()
    }
}
