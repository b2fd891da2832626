//! Route registry.
//!
//! An ordered list of compiled routes. Lookup walks it front to back and the
//! first route whose pattern matches the whole path *and* whose methods
//! include the request method wins. Register specific templates before
//! general ones.
//!
//! Build it once at startup; pass it to [`Dispatcher::new`](crate::Dispatcher::new).
//! It is never mutated while serving, so lookups need no locking.

use std::sync::Arc;

use tracing::debug;

use crate::endpoint::{BoxedEndpoint, Descriptor, Endpoint};
use crate::error::Error;
use crate::method::Method;
use crate::pattern::Pattern;

/// Path prefix every template is compiled under.
pub const DEFAULT_BASE: &str = "api/json/";

/// One compiled endpoint.
pub struct Route {
    pub(crate) descriptor: Descriptor,
    pub(crate) pattern: Pattern,
    pub(crate) endpoint: BoxedEndpoint,
}

impl Route {
    pub fn descriptor(&self) -> &Descriptor { &self.descriptor }
    pub fn pattern(&self) -> &Pattern { &self.pattern }
}

/// A resolved request: the route plus its raw path-variable captures.
pub struct Match<'r> {
    pub route: &'r Route,
    pub vars: Vec<(&'static str, String)>,
}

/// The application registry.
///
/// ```rust,no_run
/// # use hapi::{Descriptor, Endpoint, Registry};
/// # struct PostItem; struct PostCollection;
/// # #[async_trait::async_trait] impl Endpoint for PostItem { fn descriptor(&self) -> Descriptor { Descriptor::new("post/{POST_ID}") } }
/// # #[async_trait::async_trait] impl Endpoint for PostCollection { fn descriptor(&self) -> Descriptor { Descriptor::new("post") } }
/// let registry = Registry::new()
///     .register(PostCollection)
///     .register(PostItem);
/// ```
pub struct Registry {
    base: String,
    routes: Vec<Route>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_base(DEFAULT_BASE)
    }

    /// A registry whose templates live under `base` (leading `/` ignored).
    pub fn with_base(base: &str) -> Self {
        let mut base = base.trim_start_matches('/').to_owned();
        if !base.is_empty() && !base.ends_with('/') {
            base.push('/');
        }
        Self { base, routes: Vec::new() }
    }

    /// Registers `endpoint`. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if the endpoint's template does not compile or it declares no
    /// methods. Use [`try_register`](Registry::try_register) to handle that.
    pub fn register(self, endpoint: impl Endpoint) -> Self {
        self.try_register(endpoint)
            .unwrap_or_else(|e| panic!("invalid route: {e}"))
    }

    pub fn try_register(mut self, endpoint: impl Endpoint) -> Result<Self, Error> {
        let descriptor = endpoint.descriptor();
        if descriptor.methods.is_empty() {
            return Err(Error::NoMethods { template: descriptor.template.clone() });
        }
        let pattern = Pattern::compile(&self.base, &descriptor.template)?;
        debug!(template = %descriptor.template, methods = ?descriptor.methods, "route registered");
        self.routes.push(Route { descriptor, pattern, endpoint: Arc::new(endpoint) });
        Ok(self)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The base path templates are compiled under, e.g. `api/json/`.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Finds the first route for `method` and `path`.
    pub fn resolve(&self, method: Method, path: &str) -> Option<Match<'_>> {
        let path = path.trim_start_matches('/');
        self.routes
            .iter()
            .filter(|route| route.descriptor.allows(method))
            .find_map(|route| {
                let vars = route.pattern.captures(path)?;
                Some(Match {
                    route,
                    vars: vars.into_iter().map(|(k, v)| (k, v.to_owned())).collect(),
                })
            })
    }
}

impl Default for Registry {
    fn default() -> Self { Self::new() }
}
