//! Runtime configuration.
//!
//! Every field has a default; `Config::from_env` overrides them from
//! `HAPI_*` environment variables. Unset or empty variables keep the default.

use std::env;

/// Knobs for the server, the auth gate and redirects.
#[derive(Clone, Debug)]
pub struct Config {
    /// `HAPI_ADDR`: socket address to listen on.
    pub addr: String,
    /// `HAPI_BASE_PATH`: prefix every route template is compiled under.
    pub base_path: String,
    /// `HAPI_AUTH_REALM`: realm named in the `WWW-Authenticate` challenge.
    pub auth_realm: String,
    /// `HAPI_NONCE_ACTION`: action the `_nonce` field is verified against.
    pub nonce_action: String,
    /// `HAPI_SESSION_COOKIE`: name of the session cookie.
    pub session_cookie: String,
    /// `HAPI_REDIRECT_HOSTS`: comma-separated hosts `redirect_to` may point at.
    /// Relative targets are always allowed.
    pub redirect_hosts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            base_path: crate::registry::DEFAULT_BASE.to_owned(),
            auth_realm: "H-API".to_owned(),
            nonce_action: "h-api".to_owned(),
            session_cookie: "hapi_session".to_owned(),
            redirect_hosts: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            addr: get("HAPI_ADDR").unwrap_or(defaults.addr),
            base_path: get("HAPI_BASE_PATH").unwrap_or(defaults.base_path),
            auth_realm: get("HAPI_AUTH_REALM").unwrap_or(defaults.auth_realm),
            nonce_action: get("HAPI_NONCE_ACTION").unwrap_or(defaults.nonce_action),
            session_cookie: get("HAPI_SESSION_COOKIE").unwrap_or(defaults.session_cookie),
            redirect_hosts: get("HAPI_REDIRECT_HOSTS")
                .map(|hosts| {
                    hosts
                        .split(',')
                        .map(|h| h.trim().to_ascii_lowercase())
                        .filter(|h| !h.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.redirect_hosts),
        }
    }
}
