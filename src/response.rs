//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Two writers cover nearly everything an endpoint sends:
//!
//! - [`Response::send_error`]: a status code plus a raw text message (often empty).
//! - [`Response::send_response`]: a status code plus a JSON-serialized body.
//!
//! Returning a response from a handler ends the request. Nothing in the
//! pipeline observes request state after that.

use bytes::Bytes;
use http_body_util::Full;
use serde::Serialize;
use tracing::error;

use crate::status::Status;

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts
///
/// ```rust
/// use hapi::{Response, Status};
///
/// Response::send_response(&serde_json::json!({ "id": 1 }), Status::Ok);
/// Response::send_error("Endpoint not implemented.", Status::NotFound);
/// Response::status(Status::NoContent);
/// Response::redirect("/dashboard");
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use hapi::{Response, Status};
///
/// Response::builder()
///     .status(Status::Created)
///     .header("location", "/api/json/post/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: Status,
}

impl Response {
    /// Sends `message` as a raw body with `status`. An empty message sends no
    /// body and no content type.
    pub fn send_error(message: impl Into<String>, status: Status) -> Self {
        let message = message.into();
        if message.is_empty() {
            return Self::status(status);
        }
        Self::builder().status(status).text(message)
    }

    /// Serializes `body` as JSON and sends it with `status`.
    ///
    /// A body that cannot be serialized becomes an empty `500`.
    pub fn send_response<T: Serialize + ?Sized>(body: &T, status: Status) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self::builder().status(status).json(bytes),
            Err(e) => {
                error!("response serialization failed: {e}");
                Self::status(Status::InternalServerError)
            }
        }
    }

    /// `303 See Other` to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::builder()
            .status(Status::SeeOther)
            .header("location", location)
            .no_body()
    }

    /// Response with no body.
    pub fn status(code: Status) -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: Status::Ok }
    }

    pub fn status_code(&self) -> u16 { self.status.code() }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Converts into the hyper response the server writes to the wire.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status.code());
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                error!("invalid response header: {e}");
                let mut res = http::Response::new(Full::new(Bytes::new()));
                *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                res
            })
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `Status::Ok` (200).
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: Status,
}

impl ResponseBuilder {
    pub fn status(mut self, code: Status) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish(JSON, body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(TEXT, body.into().into_bytes())
    }

    /// Terminate with no body (e.g. `Status::NoContent`, `Status::SeeOther`).
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::status(self) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_response_sets_json_content_type() {
        let res = Response::send_response(&json!({ "id": 7, "email": "a@b.com" }), Status::Ok);
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.header("Content-Type"), Some(JSON));
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({ "id": 7, "email": "a@b.com" }));
    }

    #[test]
    fn empty_error_has_no_body_or_content_type() {
        let res = Response::send_error("", Status::NoContent);
        assert_eq!(res.status_code(), 204);
        assert!(res.body().is_empty());
        assert!(res.headers().is_empty());
    }

    #[test]
    fn redirect_is_see_other_with_location() {
        let res = Response::redirect("/thanks");
        assert_eq!(res.status_code(), 303);
        assert_eq!(res.header("location"), Some("/thanks"));
    }

    #[test]
    fn into_inner_keeps_status_and_headers() {
        let res = Response::send_error("nope", Status::BadRequest).into_inner();
        assert_eq!(res.status(), http::StatusCode::BAD_REQUEST);
        assert_eq!(res.headers()["content-type"], TEXT);
    }

    #[test]
    fn builder_sets_status_headers_and_json() {
        let res = Response::builder()
            .status(Status::Created)
            .header("location", "/api/json/post/42")
            .json(br#"{"id":42}"#.to_vec());
        assert_eq!(res.status_code(), 201);
        assert_eq!(res.header("content-type"), Some(JSON));
        assert_eq!(res.header("Location"), Some("/api/json/post/42"));
        assert_eq!(res.body(), br#"{"id":42}"#);
    }
}
