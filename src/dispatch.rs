//! Sealed request dispatcher and the host interface.
use std::{borrow::Cow, fmt, sync::Arc};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::{
    config::Config,
    error::{Disconnected, Error, HttpError, Result},
    lifecycle::HttpState,
    log,
    middleware::{BoxMiddleware, Next, merge_default_headers, render_error},
    request::Request,
    response::Response,
    routing::{Handler, RouteMatch, RouteTable, UrlError},
    ws::WsRoutes,
};

/// Receives a response from the [`Dispatcher`], implemented by the host.
///
/// A failed emission means the client is gone, nothing more is written.
pub trait HttpEmitter: Send {
    /// Emit the status line and headers.
    fn start(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> impl Future<Output = Result<(), Disconnected>> + Send;

    /// Emit a body chunk.
    fn body(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), Disconnected>> + Send;
}

/// Shared state read by every request.
pub(crate) struct Core {
    config: Config,
    routes: RouteTable,
    ws_routes: WsRoutes,
}

impl Core {
    pub(crate) fn new(config: Config, routes: RouteTable, ws_routes: WsRoutes) -> Self {
        Self { config, routes, ws_routes }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn ws_routes(&self) -> &WsRoutes {
        &self.ws_routes
    }

    /// Innermost stage of the chain: route, invoke the handler and coerce its output.
    pub(crate) async fn dispatch(self: Arc<Self>, mut req: Request) -> Result<Response> {
        let lifecycle = req.lifecycle().clone();

        let handler = match self.routes.find(req.method(), req.path()) {
            RouteMatch::Matched { route, params } => {
                log::debug!("{} {} matched {}", req.method(), req.path(), route.pattern().template());
                req.set_params(params);
                route.handler(req.method()).cloned()
            }
            RouteMatch::NotFound => {
                log::debug!("{} {} not found", req.method(), req.path());
                None
            }
            RouteMatch::MethodNotAllowed(allowed) => {
                log::debug!("{} {} method not allowed", req.method(), req.path());
                return Err(HttpError::method_not_allowed(&allowed).into());
            }
        };
        let Some(handler) = handler else {
            return Err(HttpError::not_found().into());
        };

        lifecycle.mark(HttpState::Routed);
        lifecycle.mark(HttpState::Handling);
        let res = Handler::call(&*handler, req).await?;
        lifecycle.mark(HttpState::Coerced);
        Ok(res)
    }
}

/// The sealed application.
///
/// Cheap to clone, every clone shares the same routes, middlewares and config. Nothing can be
/// registered anymore, see [`App::seal`][crate::App::seal].
#[derive(Clone)]
pub struct Dispatcher {
    core: Arc<Core>,
    stack: Arc<[BoxMiddleware]>,
}

impl Dispatcher {
    pub(crate) fn new(core: Core, stack: Vec<BoxMiddleware>) -> Self {
        Self {
            core: Arc::new(core),
            stack: stack.into(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.core.routes
    }

    pub(crate) fn core(&self) -> &Arc<Core> {
        &self.core
    }

    /// Returns the name of every stage, outermost first.
    pub fn middleware_names(&self) -> Vec<Cow<'static, str>> {
        self.stack.iter().map(|e| e.name()).collect()
    }

    /// Run `req` through the chain.
    ///
    /// The response is ready to be written, `content-length` is set and `HEAD` responses have no
    /// body. Only a client disconnect is returned as an error.
    async fn respond(&self, req: Request) -> Result<Response, Disconnected> {
        let method = req.method().clone();

        // failures are marked by the error translator
        let result = Next::new(self.stack.clone(), self.core.clone()).run(req).await;
        let mut res = match result {
            Ok(res) => res,
            Err(Error::Disconnected(disconnected)) => {
                log::debug!("client disconnected, response dropped");
                return Err(disconnected);
            }
            Err(err) => {
                let mut res = render_error(&err, self.config());
                merge_default_headers(res.headers_mut(), self.config().headers());
                res
            }
        };
        res.finalize(&method);
        Ok(res)
    }

    /// Dispatch `req` and return the response, considered sent once returned.
    pub async fn dispatch(&self, req: Request) -> Result<Response, Disconnected> {
        let lifecycle = req.lifecycle().clone();
        let res = self.respond(req).await?;
        lifecycle.mark(HttpState::Sent);
        Ok(res)
    }

    /// Dispatch `req` and emit the response to `emitter`.
    pub async fn serve_http<E: HttpEmitter>(
        &self,
        req: Request,
        emitter: &mut E,
    ) -> Result<(), Disconnected> {
        let lifecycle = req.lifecycle().clone();
        let res = self.respond(req).await?;

        emitter.start(res.status(), res.headers()).await?;
        let body = res.into_body();
        if !body.is_empty() {
            emitter.body(body).await?;
        }
        lifecycle.mark(HttpState::Sent);
        Ok(())
    }

    /// Build the path of the route named `name`, http routes first, then websocket routes.
    pub fn url_for(&self, name: &str, values: &[(&str, &str)]) -> Result<String, UrlError> {
        match self.core.routes.url_for(name, values) {
            Err(UrlError::UnknownRoute(_)) => self.core.ws_routes.url_for(name, values),
            result => result,
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.core.config)
            .field("routes", &self.core.routes)
            .field("middlewares", &self.middleware_names())
            .finish()
    }
}

#[cfg(test)]
mod test;
