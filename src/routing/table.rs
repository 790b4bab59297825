use http::Method;

use super::{BoxHandler, MethodRouter, Params, Pattern, UrlError};

/// What a route answers with.
#[derive(Clone)]
pub(crate) enum Endpoint {
    /// One handler for every allowed method.
    Single(BoxHandler),
    /// A handler per method.
    Methods(MethodRouter),
}

/// A registered (pattern, methods, handler) triple.
#[derive(Clone)]
pub struct Route {
    pattern: Pattern,
    methods: Vec<Method>,
    endpoint: Endpoint,
    name: Option<String>,
}

impl Route {
    pub(crate) fn new(pattern: Pattern, methods: Vec<Method>, endpoint: Endpoint, name: Option<String>) -> Self {
        let mut dedup = Vec::with_capacity(methods.len());
        for method in methods {
            if !dedup.contains(&method) {
                dedup.push(method);
            }
        }
        Self { pattern, methods: dedup, endpoint, name }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the allowed methods.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn handler(&self, method: &Method) -> Option<&BoxHandler> {
        match &self.endpoint {
            Endpoint::Single(handler) => self.methods.contains(method).then_some(handler),
            Endpoint::Methods(router) => router.handler(method),
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.template())
            .field("methods", &self.methods)
            .field("name", &self.name)
            .finish()
    }
}

/// Outcome of [`RouteTable::find`].
#[derive(Debug)]
pub enum RouteMatch<'a> {
    Matched { route: &'a Route, params: Params },
    NotFound,
    /// The path matched but not the method, holds the union of the allowed methods.
    MethodNotAllowed(Vec<Method>),
}

/// Ordered list of routes.
///
/// Routes are tried in registration order and the first full match wins, specificity is not
/// considered.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route for `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.handler(method).is_some() {
                return RouteMatch::Matched { route, params };
            }
            for method in &route.methods {
                if !allowed.contains(method) {
                    allowed.push(method.clone());
                }
            }
        }

        match allowed.is_empty() {
            true => RouteMatch::NotFound,
            false => RouteMatch::MethodNotAllowed(allowed),
        }
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.name() == Some(name))
    }

    /// Build the path of the route named `name`.
    pub fn url_for(&self, name: &str, values: &[(&str, &str)]) -> Result<String, UrlError> {
        self.by_name(name)
            .ok_or_else(|| UrlError::UnknownRoute(name.to_owned()))?
            .pattern
            .build(values)
    }
}
