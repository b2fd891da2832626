//! HTTP status codes as a typed enum.
//!
//! Only the codes the API actually emits are listed. Use [`Status`] anywhere a
//! status code is accepted: `Response::send_error()`,
//! `Response::send_response()`, `Response::builder().status()`.
//!
//! ```rust
//! use hapi::{Response, Status};
//!
//! Response::send_error("'email' is a required argument.", Status::BadRequest);
//! Response::send_response(&vec!["a", "b"], Status::Ok);
//! Response::status(Status::NoContent);
//! ```

/// The status codes produced by the dispatcher and the reference endpoints.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200
    Created,             // 201
    NoContent,           // 204

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    SeeOther,            // 303

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    Unauthorized,        // 401
    NotFound,            // 404
    MethodNotAllowed,    // 405

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
    NotImplemented,      // 501
}

impl Status {
    pub fn code(self) -> u16 {
        self.into()
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                  => 200,
            Status::Created             => 201,
            Status::NoContent           => 204,
            Status::SeeOther            => 303,
            Status::BadRequest          => 400,
            Status::Unauthorized        => 401,
            Status::NotFound            => 404,
            Status::MethodNotAllowed    => 405,
            Status::InternalServerError => 500,
            Status::NotImplemented      => 501,
        }
    }
}
