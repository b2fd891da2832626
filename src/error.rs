//! Error types.
//!
//! Two families live here:
//!
//! - [`Error`] surfaces infrastructure failures: binding to a port, accepting
//!   a connection, or registering a route whose template does not compile.
//! - [`ApiError`] is the request-level taxonomy. Every variant is terminal:
//!   the dispatcher turns it into a response on the spot and runs nothing
//!   else for that request.

use thiserror::Error;

use crate::response::{IntoResponse, Response};
use crate::status::Status;
use crate::store::StoreError;

/// The error type returned by the crate's fallible setup operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddr(String),

    #[error("unknown token `{token}` in route `{template}`")]
    UnknownToken { template: String, token: String },

    #[error("route `{template}` has no methods")]
    NoMethods { template: String },

    #[error("route `{template}` does not compile: {source}")]
    Regex {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// A failure that ends request handling with a status code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400: a missing or invalid argument. The message is sent as the body.
    #[error("{0}")]
    Validation(String),

    /// 401: missing or invalid credentials, nonce, or capability.
    ///
    /// `challenge` is the `WWW-Authenticate` value sent when the request
    /// carried no usable credentials at all.
    #[error("unauthorized")]
    Unauthorized { challenge: Option<String> },

    /// 404: no route matched, or the record a path variable points at is gone.
    #[error("{0}")]
    NotFound(String),

    /// 501: the route matched but the endpoint has no handler for the method.
    #[error("not implemented")]
    NotImplemented,

    /// 400: a collaborator refused the operation. The message is sent as the body.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized { challenge: None }
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::Validation(_)        => Status::BadRequest,
            ApiError::Unauthorized { .. }  => Status::Unauthorized,
            ApiError::NotFound(_)          => Status::NotFound,
            ApiError::NotImplemented       => Status::NotImplemented,
            ApiError::Store(_)             => Status::BadRequest,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Unauthorized { challenge: Some(challenge) } => Response::builder()
                .status(status)
                .header("www-authenticate", &challenge)
                .no_body(),
            ApiError::Unauthorized { challenge: None } | ApiError::NotImplemented => {
                Response::status(status)
            }
            other => Response::send_error(other.to_string(), status),
        }
    }
}
