//! Application bootstrap: module registration, the request pipeline and the
//! server lifecycle.
//!
//! ```rust,ignore
//! let mut app = Application::from_env()?;
//! app.register_module::<AppModule>()?;
//! app.run().await?;
//! ```

mod dispatcher;
mod shutdown;

pub use dispatcher::Dispatcher;
pub use shutdown::shutdown_signal;

use crate::config::{AppConfig, ConfigService};
use crate::decorators::{MiddlewareClass, Module, ModuleClass, ModuleOptions};
use crate::di::{Injectable, Injector};
use crate::error::{RapidError, Result};
use crate::exception::{ExceptionFilter, HttpExceptionFilter};
use crate::metadata::{MetadataRegistry, keys};
use crate::middleware::{Cors, MiddlewareManager, middleware_handler};
use crate::orm::Orm;
use crate::router::{Controller, RouterManager};
use std::any::TypeId;
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum ApplicationState {
    Created,
    Initialized,
    Listening,
    Stopped,
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<io::Result<()>>,
}

/// One application: its metadata registry, injector, middlewares, routes and
/// server.
pub struct Application {
    config: AppConfig,
    registry: Arc<MetadataRegistry>,
    injector: Arc<Injector>,
    middleware: MiddlewareManager,
    router: RouterManager,
    modules: HashSet<TypeId>,
    filter: Arc<dyn ExceptionFilter>,
    state: ApplicationState,
    server: Option<RunningServer>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let registry = Arc::new(MetadataRegistry::new());
        let injector = Arc::new(Injector::new(Arc::clone(&registry)));
        let production = config.is_production();
        Self {
            registry,
            middleware: MiddlewareManager::new(Arc::clone(&injector)),
            router: RouterManager::new(Arc::clone(&injector), production),
            injector,
            modules: HashSet::new(),
            filter: Arc::new(HttpExceptionFilter::new(production)),
            state: ApplicationState::Created,
            server: None,
            config,
        }
    }

    /// Reads [`AppConfig`] from the environment and provides the
    /// [`ConfigService`] it was read from to the injector.
    pub fn from_env() -> Result<Self> {
        let service = ConfigService::new();
        let app = Self::new(AppConfig::from_service(&service)?);
        app.injector.provide(service);
        Ok(app)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    pub fn state(&self) -> ApplicationState {
        self.state
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|server| server.local_addr)
    }

    /// The application's ORM registry, created on first use.
    pub fn orm(&self) -> Result<Arc<Orm>> {
        self.injector.get::<Orm>()
    }

    /// Registers `M` and everything it imports. Each module is visited once.
    ///
    /// Bindings of the whole import graph are registered first so providers
    /// can depend on traits bound by an imported module.
    pub fn register_module<M: Module>(&mut self) -> Result<()> {
        self.ensure_configurable("register a module")?;
        let root = ModuleClass::of::<M>();
        let mut seen = HashSet::new();
        self.register_bindings(root, &mut seen)?;
        self.walk_module(root)?;
        self.state = ApplicationState::Initialized;
        Ok(())
    }

    pub fn register_controller<C: Controller>(&mut self) -> Result<usize> {
        self.ensure_configurable("register a controller")?;
        let routes = self.router.register_controller::<C>(&self.middleware)?;
        self.state = ApplicationState::Initialized;
        Ok(routes)
    }

    pub fn register_provider<P: Injectable>(&mut self) -> Result<()> {
        self.ensure_configurable("register a provider")?;
        self.injector.register_provider::<P>()?;
        self.state = ApplicationState::Initialized;
        Ok(())
    }

    /// Mounts `classes` in front of every route, after those already mounted.
    pub fn use_global_middlewares(&mut self, classes: &[MiddlewareClass]) -> Result<()> {
        self.ensure_configurable("register middlewares")?;
        self.middleware.apply_global_middlewares(classes)?;
        self.state = ApplicationState::Initialized;
        Ok(())
    }

    /// Replaces the default [`HttpExceptionFilter`].
    pub fn set_exception_filter(&mut self, filter: impl ExceptionFilter) -> Result<()> {
        self.ensure_configurable("set the exception filter")?;
        self.filter = Arc::new(filter);
        Ok(())
    }

    /// Distinct registered route paths.
    pub fn routes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.router
            .router()
            .routes()
            .map(|route| route.path().to_owned())
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    /// A snapshot of the request pipeline as it is configured now.
    pub fn dispatcher(&self) -> Dispatcher {
        let mut global = Vec::new();
        if self.config.cors {
            global.push(middleware_handler(Cors::default()));
        }
        global.extend_from_slice(self.middleware.global_handlers());
        Dispatcher::new(
            global,
            self.router.router().clone().into_handler(),
            self.routes(),
            Arc::clone(&self.filter),
            self.config.body_limit,
        )
    }

    /// Binds `host:port` and serves in a background task. Port 0 picks a free port.
    pub async fn start(&mut self, port: u16) -> Result<SocketAddr> {
        if matches!(self.state, ApplicationState::Listening | ApplicationState::Stopped) {
            return Err(self.invalid_state("start"));
        }
        let address = format!("{}:{}", self.config.host, port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| RapidError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let app = axum::Router::new().fallback_service(self.dispatcher());
        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        self.server = Some(RunningServer {
            local_addr,
            shutdown,
            handle,
        });
        self.state = ApplicationState::Listening;
        tracing::info!("Server listening on http://{}", local_addr);
        Ok(local_addr)
    }

    /// Starts on the configured port.
    pub async fn listen(&mut self) -> Result<SocketAddr> {
        self.start(self.config.port).await
    }

    /// Stops accepting connections, waits for in-flight requests and closes
    /// the ORM connections.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(server) = self.server.take() else {
            return Err(self.invalid_state("stop"));
        };
        tracing::info!("Shutting down server on {}", server.local_addr);
        let _ = server.shutdown.send(());
        let served = match server.handle.await {
            Ok(result) => result.map_err(RapidError::from),
            Err(e) => Err(RapidError::Internal(format!("server task failed: {e}"))),
        };

        if let Ok(orm) = self.injector.resolve::<Orm>() {
            if let Err(e) = orm.close_connections().await {
                tracing::error!("Failed to close database connections: {}", e);
            }
        }
        self.state = ApplicationState::Stopped;
        tracing::info!("Server stopped");
        served
    }

    /// Listens until Ctrl+C or SIGTERM, then stops.
    pub async fn run(&mut self) -> Result<()> {
        self.listen().await?;
        shutdown_signal().await;
        self.stop().await
    }

    fn register_bindings(&self, module: ModuleClass, seen: &mut HashSet<TypeId>) -> Result<()> {
        if !seen.insert(module.target().id()) {
            return Ok(());
        }
        let options = self.module_options(module)?;
        for binding in &options.bindings {
            binding.register(&self.injector);
        }
        for import in options.imports {
            self.register_bindings(import, seen)?;
        }
        Ok(())
    }

    fn walk_module(&mut self, module: ModuleClass) -> Result<()> {
        if !self.modules.insert(module.target().id()) {
            tracing::debug!("Module already registered: {}", module.target());
            return Ok(());
        }
        let options = self.module_options(module)?;

        for provider in &options.providers {
            provider.register(&self.injector)?;
        }
        for controller in &options.controllers {
            controller.bind(&mut self.router, &self.middleware)?;
        }
        if !options.middlewares.is_empty() {
            self.middleware.apply_global_middlewares(&options.middlewares)?;
        }
        tracing::info!("Module registered: {}", module.target().short_name());

        for import in options.imports {
            self.walk_module(import)?;
        }
        Ok(())
    }

    fn module_options(&self, module: ModuleClass) -> Result<ModuleOptions> {
        module.decorate(&self.registry);
        self.registry
            .get(keys::MODULE, module.target(), None)
            .ok_or(RapidError::NotAModule {
                name: module.target().name(),
            })
    }

    fn ensure_configurable(&self, action: &'static str) -> Result<()> {
        match self.state {
            ApplicationState::Listening | ApplicationState::Stopped => Err(self.invalid_state(action)),
            _ => Ok(()),
        }
    }

    fn invalid_state(&self, action: &'static str) -> RapidError {
        RapidError::InvalidState {
            action,
            state: self.state.to_string(),
        }
    }
}
