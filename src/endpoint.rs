//! Endpoints: what they declare and what they implement.
//!
//! An endpoint is split in two:
//!
//! - a data-only [`Descriptor`]: template, methods, argument schema, auth
//!   policy. The registry compiles it once and keeps it for the life of the
//!   process;
//! - behavior through the [`Endpoint`] trait: an optional path-variable hook
//!   plus one handler per method, each defaulting to "not implemented".
//!
//! Shared work (auth, decoding, validation, picking the handler) lives in the
//! dispatcher, not in each endpoint.
//!
//! # How endpoints are stored
//!
//! The registry holds endpoints of different concrete types in one `Vec`,
//! so each is kept as a trait object behind an `Arc`:
//!
//! ```text
//! struct PostItem { .. }                 ← user writes this
//!        ↓ registry.register(PostItem { .. })
//! Arc::new(PostItem { .. })              ← stored as BoxedEndpoint
//!        ↓ at request time
//! endpoint.get(&mut ctx, args).await     ← one vtable dispatch
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::args::{ArgSpec, Args, Schema};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Capability required when a descriptor does not name one.
pub const DEFAULT_CAPABILITY: &str = "edit_posts";

/// What a handler returns: a response to send, nothing (`204 No Content`),
/// or an error that ends the request.
pub type HandlerResult = Result<Option<Response>, ApiError>;

/// A heap-allocated, type-erased endpoint shared across concurrent requests.
pub type BoxedEndpoint = Arc<dyn Endpoint>;

// ── Descriptor ────────────────────────────────────────────────────────────────

/// The declarative half of an endpoint.
///
/// Defaults: `GET` only, authenticated, capability `edit_posts`, public.
///
/// ```rust
/// use hapi::{ArgSpec, Descriptor, Method, Sanitizer};
///
/// let d = Descriptor::new("post/{POST_ID}")
///     .methods(&[Method::Get, Method::Post, Method::Delete])
///     .arg("title", ArgSpec::new(&[Method::Post]))
///     .arg("content", ArgSpec::new(&[Method::Post]).sanitizer(Sanitizer::html()));
/// assert!(d.allows(Method::Delete));
/// ```
#[derive(Clone, Debug)]
pub struct Descriptor {
    pub(crate) template: String,
    pub(crate) methods: Vec<Method>,
    pub(crate) schema: Schema,
    pub(crate) authenticated: bool,
    pub(crate) capability: Option<String>,
    pub(crate) public: bool,
}

impl Descriptor {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_owned(),
            methods: vec![Method::Get],
            schema: Schema::default(),
            authenticated: true,
            capability: Some(DEFAULT_CAPABILITY.to_owned()),
            public: true,
        }
    }

    pub fn methods(mut self, methods: &[Method]) -> Self {
        self.methods = methods.to_vec();
        self
    }

    pub fn arg(mut self, name: &str, spec: ArgSpec) -> Self {
        self.schema = self.schema.arg(name, spec);
        self
    }

    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    /// `None` lets any authenticated principal through.
    pub fn capability(mut self, capability: Option<&str>) -> Self {
        self.capability = capability.map(str::to_owned);
        self
    }

    /// Informational; does not gate access.
    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn template(&self) -> &str { &self.template }
    pub fn schema(&self) -> &Schema { &self.schema }
    pub fn requires_authentication(&self) -> bool { self.authenticated }
    pub fn required_capability(&self) -> Option<&str> { self.capability.as_deref() }
    pub fn is_public(&self) -> bool { self.public }

    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Per-request state, owned by one dispatch and dropped with the response.
pub struct Context {
    request: Request,
    vars: HashMap<String, String>,
    principal: Option<Principal>,
    via_cookie: bool,
    extensions: http::Extensions,
}

impl Context {
    pub(crate) fn new(request: Request, vars: HashMap<String, String>) -> Self {
        Self {
            request,
            vars,
            principal: None,
            via_cookie: false,
            extensions: http::Extensions::new(),
        }
    }

    pub(crate) fn set_principal(&mut self, principal: Principal, via_cookie: bool) {
        self.principal = Some(principal);
        self.via_cookie = via_cookie;
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn principal(&self) -> Option<&Principal> { self.principal.as_ref() }

    /// Whether the principal came from a session cookie rather than Basic
    /// credentials or an API key.
    pub fn is_cookie_request(&self) -> bool { self.via_cookie }

    /// A decoded path variable, e.g. `post_id`.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// A path variable parsed as a numeric id.
    pub fn id_var(&self, name: &str) -> Result<u64, ApiError> {
        self.var(name)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ApiError::validation(format!("'{name}' must be a positive integer.")))
    }

    /// Stores a value for the rest of this request (typically the record the
    /// path-variable hook loaded).
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(value);
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// Behavior of one registered route.
///
/// Only the methods an endpoint supports need overriding; the rest answer
/// `501 Not Implemented`.
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    fn descriptor(&self) -> Descriptor;

    /// Runs after authentication and before argument validation. The usual
    /// job is loading the record a path variable points at into the context.
    async fn validate_path_vars(&self, _ctx: &mut Context) -> Result<(), ApiError> {
        Ok(())
    }

    async fn get(&self, _ctx: &mut Context, _args: Args) -> HandlerResult {
        Err(ApiError::NotImplemented)
    }

    async fn post(&self, _ctx: &mut Context, _args: Args) -> HandlerResult {
        Err(ApiError::NotImplemented)
    }

    async fn delete(&self, _ctx: &mut Context) -> HandlerResult {
        Err(ApiError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_defaults() {
        let d = Descriptor::new("post");
        assert!(d.allows(Method::Get));
        assert!(!d.allows(Method::Post));
        assert!(d.requires_authentication());
        assert_eq!(d.required_capability(), Some(DEFAULT_CAPABILITY));
        assert!(d.is_public());
        assert!(d.schema().is_empty());

        let d = d.arg("title", ArgSpec::new(&[Method::Post]));
        assert!(!d.schema().is_empty());
    }

    #[test]
    fn id_var_rejects_non_numbers() {
        let vars = HashMap::from([
            ("post_id".to_owned(), "42".to_owned()),
            ("user_id".to_owned(), "99999999999999999999999".to_owned()),
        ]);
        let ctx = Context::new(Request::new(Method::Get, "/"), vars);
        assert_eq!(ctx.id_var("post_id").unwrap(), 42);
        let err = ctx.id_var("user_id").unwrap_err();
        assert_eq!(err.to_string(), "'user_id' must be a positive integer.");
        assert!(ctx.id_var("term_id").is_err());
    }

    #[test]
    fn typed_slots_hold_one_value_per_type() {
        let mut ctx = Context::new(Request::new(Method::Get, "/"), HashMap::new());
        assert!(ctx.get::<u64>().is_none());
        ctx.insert(7_u64);
        ctx.insert(8_u64);
        assert_eq!(ctx.get::<u64>(), Some(&8));
    }
}
