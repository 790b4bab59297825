//! Middleware chain.
//!
//! The chain is built once, when the [`App`][crate::App] is sealed, in a fixed shape:
//!
//! ```text
//! ErrorTranslator -> user middlewares... -> DefaultHeaders -> core dispatch
//! ```
//!
//! A middleware receives the [`Request`] and the [`Next`] stage, it either delegates with
//! [`Next::run`] or answers by itself.
//!
//! ```
//! use fournil::{HttpError, middleware::from_fn};
//!
//! let auth = from_fn("Auth", |req, next| async move {
//!     if req.header("authorization").is_none() {
//!         return Err(HttpError::unauthorized().into());
//!     }
//!     next.run(req).await
//! });
//! ```
//!
//! Failures are propagated with `?` through every stage, only the outermost error translator
//! turns them into a response.
use std::{borrow::Cow, fmt, sync::Arc};

use futures_util::{FutureExt, future::BoxFuture};

use crate::{
    config::Config,
    dispatch::Core,
    error::Result,
    request::Request,
    response::Response,
};

mod default_headers;
mod errors;

pub use default_headers::DefaultHeaders;
pub(crate) use default_headers::merge as merge_default_headers;
pub use errors::{ErrorTranslator, render_error};

/// A stage of the middleware chain.
pub trait Middleware: Send + Sync + 'static {
    /// Name used by [`App::remove_middleware`][crate::App::remove_middleware].
    ///
    /// Defaults to the type name without its module path.
    fn name(&self) -> Cow<'static, str> {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        Cow::Borrowed(base.rsplit("::").next().unwrap_or(base))
    }

    /// Handle the request, usually by calling `next.run(req)`.
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response>>;
}

pub(crate) type BoxMiddleware = Arc<dyn Middleware>;

/// Where to insert a middleware among the user middlewares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Position {
    /// Innermost, runs last.
    #[default]
    Last,
    /// Outermost, runs first after the error translator.
    First,
    /// At index, clamped to the number of middlewares.
    At(usize),
    /// Right before the named middleware.
    Before(Cow<'static, str>),
    /// Right after the named middleware.
    After(Cow<'static, str>),
}

// ===== Next =====

/// The rest of the chain after the current middleware.
///
/// Consumed by [`Next::run`], so a stage can delegate at most once.
pub struct Next {
    stack: Arc<[BoxMiddleware]>,
    index: usize,
    core: Arc<Core>,
}

impl Next {
    pub(crate) fn new(stack: Arc<[BoxMiddleware]>, core: Arc<Core>) -> Self {
        Self { stack, index: 0, core }
    }

    /// Run the remaining stages.
    pub fn run(self, req: Request) -> BoxFuture<'static, Result<Response>> {
        let Some(middleware) = self.stack.get(self.index).cloned() else {
            return self.core.clone().dispatch(req).boxed();
        };
        let next = Next {
            stack: self.stack,
            index: self.index + 1,
            core: self.core,
        };
        async move { middleware.handle(req, next).await }.boxed()
    }

    /// Returns the application config.
    pub fn config(&self) -> &Config {
        self.core.config()
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &(self.stack.len() - self.index))
            .finish_non_exhaustive()
    }
}

// ===== FromFn =====

/// Middleware from an async function, see [`from_fn`].
pub struct FromFn<F> {
    name: Cow<'static, str>,
    f: F,
}

/// Create a named [`Middleware`] from an async function or closure.
pub fn from_fn<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    FromFn { name: name.into(), f }
}

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        (self.f)(req, next).boxed()
    }
}

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("FromFn").field(&self.name).finish()
    }
}
