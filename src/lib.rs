//! # hapi
//!
//! A small JSON API layer: route templates with typed tokens, declarative
//! argument schemas, and a layered authentication gate in front of every
//! endpoint.
//!
//! ## The pipeline
//!
//! Every request runs the same steps, and the first one that fails answers
//! the request:
//!
//! - **Routing**: templates like `post/{POST_ID}` compile to anchored
//!   patterns; the first registered route that matches path and method wins.
//! - **Authentication**: session cookie + `_nonce`, then HTTP Basic
//!   credentials, then an API key in the Basic username.
//! - **Validation**: required fields, option lists, comma-split multi values
//!   and per-field sanitizers.
//! - **Handling**: one method per HTTP verb; returning nothing means `204`.
//!
//! What the layer does *not* do: store records, hash passwords, issue
//! sessions. Those sit behind the [`Store`] and [`Identity`] traits.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hapi::store::{Post, User};
//! use hapi::{endpoints, Config, Dispatcher, MemoryIdentity, MemoryStore, Registry, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hapi::Error> {
//!     let config = Config::from_env();
//!     let registry = endpoints::register_all(
//!         Registry::with_base(&config.base_path),
//!         Arc::new(MemoryStore::<Post>::new()),
//!         Arc::new(MemoryStore::<User>::new()),
//!     );
//!     let dispatcher = Dispatcher::new(&config, registry, Arc::new(MemoryIdentity::new()));
//!
//!     Server::bind(&config.addr)?.serve(dispatcher).await
//! }
//! ```

mod args;
mod auth;
mod config;
mod dispatch;
mod endpoint;
mod error;
mod method;
mod pattern;
mod registry;
mod request;
mod response;
mod server;
mod status;

pub mod endpoints;
pub mod sanitize;
pub mod store;

pub use args::{ArgSpec, Args, Param, Params, Sanitizer, Schema, validate};
pub use auth::{
    API_KEY_PREFIX, AuthGate, AuthOutcome, Credentials, Identity, MemoryIdentity, NONCE_HEADER,
    Principal,
};
pub use config::Config;
pub use dispatch::{Dispatcher, NOT_IMPLEMENTED_BODY};
pub use endpoint::{BoxedEndpoint, Context, DEFAULT_CAPABILITY, Descriptor, Endpoint, HandlerResult};
pub use error::{ApiError, Error};
pub use method::Method;
pub use pattern::Pattern;
pub use registry::{DEFAULT_BASE, Match, Registry, Route};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::Server;
pub use status::Status;
pub use store::{MemoryStore, Record, Store, StoreError};
