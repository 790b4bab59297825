//! Application setup.
//!
//! Routes, middlewares, converters and config are registered on an [`App`], which is then sealed
//! into an immutable [`Dispatcher`]. Every registration after sealing fails with
//! [`SetupError::Sealed`].
//!
//! ```
//! use fournil::{App, Config, Request, middleware::{Position, from_fn}};
//!
//! async fn user(req: Request) -> fournil::Result<String> {
//!     let id: i64 = req.params().get("id")?;
//!     Ok(format!("user {id}"))
//! }
//!
//! # fn main() -> Result<(), fournil::SetupError> {
//! let mut app = App::with_config(Config::new().debug(true));
//! app.add_route("/users/<id:int>", user, &[], Some("user"))?
//!     .add_middleware(from_fn("Timing", |req, next| next.run(req)), Position::Last)?;
//!
//! let dispatcher = app.seal()?;
//! assert_eq!(dispatcher.url_for("user", &[("id", "7")]).unwrap(), "/users/7");
//! assert!(app.add_route("/late", user, &[], None).is_err());
//! # Ok(())
//! # }
//! ```
use std::{borrow::Cow, sync::Arc};

use http::Method;

use crate::{
    config::Config,
    dispatch::{Core, Dispatcher},
    log,
    middleware::{BoxMiddleware, DefaultHeaders, ErrorTranslator, Middleware, Position},
    routing::{
        CompileError, Converter, ConverterArgs, ConverterRegistry, Endpoint, Handler, MethodRouter,
        Pattern, Route, RouteTable,
    },
    ws::{WsHandler, WsRoute, WsRoutes},
};

/// Errors raised while setting up an [`App`].
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("application is sealed, registration is closed")]
    Sealed,
    #[error("invalid route {pattern:?}: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: CompileError,
    },
    #[error("route name {0:?} is already registered")]
    DuplicateName(String),
    #[error("no middleware named {0:?}")]
    UnknownMiddleware(String),
    #[error("method router for {0:?} has no handler")]
    EmptyMethodRouter(String),
}

/// Application builder.
#[derive(Default)]
pub struct App {
    config: Config,
    converters: ConverterRegistry,
    routes: RouteTable,
    ws_routes: WsRoutes,
    middlewares: Vec<BoxMiddleware>,
    sealed: bool,
}

impl App {
    /// Create new `App` with the default config.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) -> Result<&mut Self, SetupError> {
        self.ensure_open()?;
        self.config = config;
        Ok(self)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn ensure_open(&self) -> Result<(), SetupError> {
        match self.sealed {
            true => Err(SetupError::Sealed),
            false => Ok(()),
        }
    }

    // ===== Converters =====

    /// Register a custom converter, usable by routes added afterward.
    pub fn register_converter<F, C>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<&mut Self, SetupError>
    where
        F: Fn(&mut ConverterArgs) -> Result<C, CompileError> + Send + Sync + 'static,
        C: Converter,
    {
        self.ensure_open()?;
        self.converters.register(name, factory);
        Ok(self)
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    // ===== Routes =====

    fn compile(&self, pattern: &str) -> Result<Pattern, SetupError> {
        Pattern::compile(pattern, &self.converters).map_err(|source| SetupError::Compile {
            pattern: pattern.to_owned(),
            source,
        })
    }

    fn claim_name(&self, name: Option<&str>) -> Result<Option<String>, SetupError> {
        let Some(name) = name else {
            return Ok(None);
        };
        if self.routes.by_name(name).is_some() || self.ws_routes.contains_name(name) {
            return Err(SetupError::DuplicateName(name.to_owned()));
        }
        Ok(Some(name.to_owned()))
    }

    /// Register `handler` for `pattern` and `methods`.
    ///
    /// No methods means `GET` and `HEAD`.
    pub fn add_route<H: Handler>(
        &mut self,
        pattern: &str,
        handler: H,
        methods: &[Method],
        name: Option<&str>,
    ) -> Result<&mut Self, SetupError> {
        self.ensure_open()?;
        let compiled = self.compile(pattern)?;
        let name = self.claim_name(name)?;
        let methods = match methods {
            [] => vec![Method::GET, Method::HEAD],
            methods => methods.to_vec(),
        };
        let endpoint = Endpoint::Single(Arc::new(handler));
        self.routes.push(Route::new(compiled, methods, endpoint, name));
        Ok(self)
    }

    /// Register verb keyed handlers for `pattern`, its methods are the registered verbs.
    pub fn route(
        &mut self,
        pattern: &str,
        router: MethodRouter,
        name: Option<&str>,
    ) -> Result<&mut Self, SetupError> {
        self.ensure_open()?;
        if router.is_empty() {
            return Err(SetupError::EmptyMethodRouter(pattern.to_owned()));
        }
        let compiled = self.compile(pattern)?;
        let name = self.claim_name(name)?;
        let methods = router.methods().cloned().collect();
        self.routes.push(Route::new(compiled, methods, Endpoint::Methods(router), name));
        Ok(self)
    }

    /// Register a websocket `handler` for `pattern`.
    pub fn add_websocket_route<H: WsHandler>(
        &mut self,
        pattern: &str,
        handler: H,
        name: Option<&str>,
    ) -> Result<&mut Self, SetupError> {
        self.ensure_open()?;
        let compiled = self.compile(pattern)?;
        let name = self.claim_name(name)?;
        self.ws_routes.push(WsRoute::new(compiled, Arc::new(handler), name));
        Ok(self)
    }

    // ===== Middlewares =====

    /// Insert a user middleware at `position`.
    pub fn add_middleware<M: Middleware>(
        &mut self,
        middleware: M,
        position: Position,
    ) -> Result<&mut Self, SetupError> {
        self.ensure_open()?;
        let index = match position {
            Position::Last => self.middlewares.len(),
            Position::First => 0,
            Position::At(index) => index.min(self.middlewares.len()),
            Position::Before(name) => self.position_of(&name)?,
            Position::After(name) => self.position_of(&name)? + 1,
        };
        self.middlewares.insert(index, Arc::new(middleware));
        Ok(self)
    }

    /// Remove the first user middleware named `name`.
    pub fn remove_middleware(&mut self, name: &str) -> Result<&mut Self, SetupError> {
        self.ensure_open()?;
        let index = self.position_of(name)?;
        self.middlewares.remove(index);
        Ok(self)
    }

    fn position_of(&self, name: &str) -> Result<usize, SetupError> {
        self.middlewares
            .iter()
            .position(|e| e.name() == name)
            .ok_or_else(|| SetupError::UnknownMiddleware(name.to_owned()))
    }

    /// Returns the user middleware names, in execution order.
    pub fn middleware_names(&self) -> Vec<Cow<'static, str>> {
        self.middlewares.iter().map(|e| e.name()).collect()
    }

    // ===== Seal =====

    /// Build the immutable [`Dispatcher`], closing registration.
    pub fn seal(&mut self) -> Result<Dispatcher, SetupError> {
        self.ensure_open()?;
        self.sealed = true;

        let mut stack: Vec<BoxMiddleware> = Vec::with_capacity(self.middlewares.len() + 2);
        stack.push(Arc::new(ErrorTranslator));
        stack.append(&mut self.middlewares);
        stack.push(Arc::new(DefaultHeaders));

        let routes = std::mem::take(&mut self.routes);
        let ws_routes = std::mem::take(&mut self.ws_routes);
        log::info!(
            "sealed with {} routes, {} websocket routes and {} middlewares",
            routes.len(),
            ws_routes.len(),
            stack.len(),
        );

        let core = Core::new(self.config.clone(), routes, ws_routes);
        Ok(Dispatcher::new(core, stack))
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .field("ws_routes", &self.ws_routes)
            .field("middlewares", &self.middleware_names())
            .field("sealed", &self.sealed)
            .finish()
    }
}
