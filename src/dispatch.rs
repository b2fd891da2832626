//! Request dispatch.
//!
//! One request, one pass, in this order:
//!
//! ```text
//! resolve ──► auth gate ──► decode vars ──► path-var hook ──► validate args
//!   │ no match   │ 401                        │ 404/400         │ 400
//!   ▼            ▼                            ▼                 ▼
//!  404         response                    response          response
//!
//! validate args ──► handler ──► Some(response) ──► sent as-is
//!                      │  └───► None ──► 303 to redirect_to, else 204
//!                      └─ Err ──► response (501 when the method has no handler)
//! ```
//!
//! Every arm that produces a response ends the request. An unmatched path
//! under the registry base gets the catch-all body; anything else gets a
//! bare `404`.

use std::collections::HashMap;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{debug, info, warn};
use url::Url;

use crate::args::{self, Args, Param};
use crate::auth::{AuthGate, AuthOutcome, Credentials, Identity};
use crate::config::Config;
use crate::endpoint::{Context, HandlerResult};
use crate::error::ApiError;
use crate::method::Method;
use crate::registry::{Registry, Route};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::sanitize;
use crate::status::Status;

/// Body of the catch-all 404.
pub const NOT_IMPLEMENTED_BODY: &str = "Endpoint not implemented.";

const REDIRECT_FIELD: &str = "redirect_to";

/// Ties the registry, the auth gate and the identity collaborator together.
pub struct Dispatcher {
    registry: Registry,
    identity: Arc<dyn Identity>,
    gate: AuthGate,
    session_cookie: String,
    redirect_hosts: Vec<String>,
}

impl Dispatcher {
    pub fn new(config: &Config, registry: Registry, identity: Arc<dyn Identity>) -> Self {
        Self {
            registry,
            identity,
            gate: AuthGate::new(&config.auth_realm, &config.nonce_action),
            session_cookie: config.session_cookie.clone(),
            redirect_hosts: config.redirect_hosts.clone(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Routes one request and produces exactly one response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method();
        let path = request.path().to_owned();

        let response = match self.registry.resolve(method, &path) {
            Some(matched) => {
                let vars = matched.vars.into_iter()
                    .map(|(name, raw)| (name.to_owned(), decode(&raw)))
                    .collect();
                self.run(matched.route, request, vars).await
            }
            None if path.trim_start_matches('/').starts_with(self.registry.base()) => {
                debug!(%method, %path, "no route");
                Response::send_error(NOT_IMPLEMENTED_BODY, Status::NotFound)
            }
            None => Response::status(Status::NotFound),
        };

        info!(%method, %path, status = response.status_code(), "request handled");
        response
    }

    async fn run(&self, route: &Route, request: Request, vars: HashMap<String, String>) -> Response {
        let descriptor = &route.descriptor;
        let method = request.method();
        let credentials = descriptor
            .requires_authentication()
            .then(|| Credentials::from_request(&request, &self.session_cookie));
        let redirect_to = request.input(REDIRECT_FIELD).and_then(Param::as_str).map(str::to_owned);

        let mut ctx = Context::new(request, vars);

        let outcome = match credentials {
            Some(credentials) => {
                self.gate
                    .authenticate(self.identity.as_ref(), &credentials, descriptor.required_capability())
                    .await
            }
            None => AuthOutcome::Anonymous,
        };
        match outcome {
            AuthOutcome::Authenticated { principal, via_cookie } => {
                debug!(user = principal.id, via_cookie, "authenticated");
                ctx.set_principal(principal, via_cookie);
            }
            AuthOutcome::Anonymous => {}
            AuthOutcome::Rejected(err) => {
                debug!(template = %descriptor.template(), "authentication rejected");
                return err.into_response();
            }
        }

        if let Err(err) = route.endpoint.validate_path_vars(&mut ctx).await {
            return err.into_response();
        }

        let args = match method {
            Method::Post => args::validate(descriptor.schema(), method, ctx.request().body()),
            Method::Get => args::validate(descriptor.schema(), method, ctx.request().query()),
            Method::Delete => Ok(Args::default()),
        };
        let args = match args {
            Ok(args) => args,
            Err(err) => return err.into_response(),
        };

        let outcome: HandlerResult = match method {
            Method::Get => route.endpoint.get(&mut ctx, args).await,
            Method::Post => route.endpoint.post(&mut ctx, args).await,
            Method::Delete => route.endpoint.delete(&mut ctx).await,
        };

        match outcome {
            Ok(Some(response)) => response,
            Ok(None) => match redirect_to {
                Some(target) => Response::redirect(&self.safe_redirect(&target)),
                None => Status::NoContent.into_response(),
            },
            Err(err @ ApiError::Store(_)) => {
                warn!(template = %descriptor.template(), "store refused request: {err}");
                err.into_response()
            }
            Err(err) => err.into_response(),
        }
    }

    /// Cleans `target` and falls back to `/` when it points at a host that is
    /// not on the allow-list.
    fn safe_redirect(&self, target: &str) -> String {
        let cleaned = sanitize::url_raw(target);
        if cleaned.is_empty() {
            return "/".to_owned();
        }
        if cleaned.starts_with("//") {
            return self.check_host(&format!("http:{cleaned}"), &cleaned);
        }
        match Url::parse(&cleaned) {
            Ok(_) => self.check_host(&cleaned, &cleaned),
            Err(_) => cleaned,
        }
    }

    fn check_host(&self, absolute: &str, original: &str) -> String {
        let allowed = Url::parse(absolute)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| self.redirect_hosts.contains(&host));
        if allowed { original.to_owned() } else { "/".to_owned() }
    }
}

/// Percent-decodes a captured path value (`+` counts as a space).
fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    if !spaced.contains('%') {
        return spaced;
    }
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
