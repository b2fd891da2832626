//! Authentication gate.
//!
//! Strategies run in a fixed order and the first one that applies decides:
//!
//! ```text
//! session cookie ──► capability ──► _nonce ──► accept        (via_cookie)
//!      │ none          └─ 401        └─ 401
//!      ▼
//! Basic user:pass ──► verified ──► capability ──► accept
//!      │ no password     └─ not verified: fall through
//!      ▼
//! Basic key:      ──► key found ──► capability ──► accept
//!      │                 └─ not found: fall through
//!      ▼
//! 401 + WWW-Authenticate: Basic realm="…"
//! ```
//!
//! Credential verification, session issuance and nonce generation are not
//! done here; they sit behind the [`Identity`] collaborator.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use parking_lot::RwLock;
use tracing::debug;

use crate::args::Param;
use crate::error::ApiError;
use crate::request::Request;
use crate::sanitize;

/// Prefix under which API keys are stored.
pub const API_KEY_PREFIX: &str = "api_key_";

/// Header that may carry the nonce when it is not in the query or body.
pub const NONCE_HEADER: &str = "x-hapi-nonce";

const NONCE_FIELD: &str = "_nonce";

// ── Principal ─────────────────────────────────────────────────────────────────

/// An authenticated identity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal {
    pub id: u64,
    pub login: String,
    capabilities: BTreeSet<String>,
}

impl Principal {
    pub fn new(id: u64, login: &str, capabilities: &[&str]) -> Self {
        Self {
            id,
            login: login.to_owned(),
            capabilities: capabilities.iter().map(|c| (*c).to_owned()).collect(),
        }
    }

    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

// ── Identity collaborator ─────────────────────────────────────────────────────

#[async_trait]
pub trait Identity: Send + Sync {
    /// Resolves a session cookie value to its principal.
    async fn session(&self, token: &str) -> Option<Principal>;

    /// Whether `nonce` is valid for `principal` and `action`.
    async fn verify_nonce(&self, principal: &Principal, nonce: &str, action: &str) -> bool;

    /// Verifies a login/password pair.
    async fn verify_credentials(&self, login: &str, password: &str) -> Option<Principal>;

    /// Looks up the principal owning an API key.
    async fn find_by_api_key(&self, key: &str) -> Option<Principal>;
}

// ── Credentials ───────────────────────────────────────────────────────────────

/// Everything the gate may look at, pulled out of a request once.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub session: Option<String>,
    pub basic_user: Option<String>,
    pub basic_password: Option<String>,
    pub nonce: Option<String>,
}

impl Credentials {
    pub fn from_request(req: &Request, cookie_name: &str) -> Self {
        let session = req
            .header_value("cookie")
            .and_then(|cookies| cookie(cookies, cookie_name))
            .filter(|v| !v.is_empty());

        let (basic_user, basic_password) = req
            .header_value("authorization")
            .and_then(basic)
            .map_or((None, None), |(u, p)| (Some(u), Some(p)));

        let nonce = req
            .input(NONCE_FIELD)
            .and_then(Param::as_str)
            .or_else(|| req.header_value(NONCE_HEADER))
            .map(str::to_owned);

        Self { session, basic_user, basic_password, nonce }
    }
}

fn cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_owned())
}

fn basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));
    Some((user.to_owned(), password.to_owned()))
}

// ── Gate ──────────────────────────────────────────────────────────────────────

/// The gate's verdict for one request.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The endpoint does not require authentication.
    Anonymous,
    Authenticated { principal: Principal, via_cookie: bool },
    Rejected(ApiError),
}

#[derive(Clone, Debug)]
pub struct AuthGate {
    realm: String,
    nonce_action: String,
}

impl AuthGate {
    pub fn new(realm: &str, nonce_action: &str) -> Self {
        Self { realm: realm.to_owned(), nonce_action: nonce_action.to_owned() }
    }

    pub async fn authenticate(
        &self,
        identity: &dyn Identity,
        creds: &Credentials,
        capability: Option<&str>,
    ) -> AuthOutcome {
        let permitted = |p: &Principal| capability.is_none_or(|cap| p.can(cap));

        if let Some(token) = &creds.session {
            if let Some(principal) = identity.session(token).await {
                if !permitted(&principal) {
                    debug!(user = principal.id, "session user lacks capability");
                    return AuthOutcome::Rejected(ApiError::unauthorized());
                }
                let nonce_ok = match creds.nonce.as_deref() {
                    Some(nonce) if !nonce.is_empty() => {
                        identity.verify_nonce(&principal, nonce, &self.nonce_action).await
                    }
                    _ => false,
                };
                if !nonce_ok {
                    debug!(user = principal.id, "missing or invalid nonce");
                    return AuthOutcome::Rejected(ApiError::unauthorized());
                }
                return AuthOutcome::Authenticated { principal, via_cookie: true };
            }
        }

        if let Some(user) = creds.basic_user.as_deref().filter(|u| !u.is_empty()) {
            let password = creds.basic_password.as_deref().unwrap_or_default();
            let principal = if password.is_empty() {
                identity.find_by_api_key(&sanitize::text_field(user)).await
            } else {
                identity.verify_credentials(user, password).await
            };

            if let Some(principal) = principal {
                if !permitted(&principal) {
                    debug!(user = principal.id, "basic user lacks capability");
                    return AuthOutcome::Rejected(ApiError::unauthorized());
                }
                return AuthOutcome::Authenticated { principal, via_cookie: false };
            }
            debug!("basic credentials did not resolve");
        }

        AuthOutcome::Rejected(ApiError::Unauthorized {
            challenge: Some(format!(r#"Basic realm="{}""#, self.realm)),
        })
    }
}

// ── In-memory identity ────────────────────────────────────────────────────────

/// Process-local [`Identity`] for the demo and tests.
///
/// Passwords are compared as stored; real deployments put hashing behind
/// their own implementation.
#[derive(Default)]
pub struct MemoryIdentity {
    inner: RwLock<IdentityState>,
}

#[derive(Default)]
struct IdentityState {
    users: HashMap<u64, (Principal, String)>,
    sessions: HashMap<String, u64>,
    nonces: HashMap<(u64, String), String>,
    meta: HashMap<String, u64>,
    issued: u64,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, principal: Principal, password: &str) {
        self.inner.write().users.insert(principal.id, (principal, password.to_owned()));
    }

    /// Opens a session for `user_id` and returns the cookie value.
    pub fn start_session(&self, user_id: u64) -> String {
        let mut state = self.inner.write();
        state.issued += 1;
        let token = format!("sess-{user_id}-{}", state.issued);
        state.sessions.insert(token.clone(), user_id);
        token
    }

    /// Issues the nonce for `user_id` and `action`, replacing any earlier one.
    pub fn issue_nonce(&self, user_id: u64, action: &str) -> String {
        let mut state = self.inner.write();
        state.issued += 1;
        let nonce = format!("{:010x}", state.issued.wrapping_mul(0x9e37_79b9) ^ user_id);
        state.nonces.insert((user_id, action.to_owned()), nonce.clone());
        nonce
    }

    pub fn add_api_key(&self, user_id: u64, key: &str) {
        self.inner.write().meta.insert(format!("{API_KEY_PREFIX}{key}"), user_id);
    }

    fn principal(&self, user_id: u64) -> Option<Principal> {
        self.inner.read().users.get(&user_id).map(|(p, _)| p.clone())
    }
}

#[async_trait]
impl Identity for MemoryIdentity {
    async fn session(&self, token: &str) -> Option<Principal> {
        let user_id = *self.inner.read().sessions.get(token)?;
        self.principal(user_id)
    }

    async fn verify_nonce(&self, principal: &Principal, nonce: &str, action: &str) -> bool {
        self.inner
            .read()
            .nonces
            .get(&(principal.id, action.to_owned()))
            .is_some_and(|issued| issued == nonce)
    }

    async fn verify_credentials(&self, login: &str, password: &str) -> Option<Principal> {
        self.inner
            .read()
            .users
            .values()
            .find(|(p, pw)| p.login == login && pw == password)
            .map(|(p, _)| p.clone())
    }

    async fn find_by_api_key(&self, key: &str) -> Option<Principal> {
        let user_id = *self.inner.read().meta.get(&format!("{API_KEY_PREFIX}{key}"))?;
        self.principal(user_id)
    }
}
