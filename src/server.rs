//! hyper front end for the [`Dispatcher`].
//!
//! Each connection runs in its own task; each request on it is read fully,
//! converted into a [`Request`] and dispatched. SIGTERM or Ctrl-C stops the
//! accept loop, then [`Server::serve`] waits for open connections to finish.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::request::Parts;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// Listens on one address and serves the API there.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Parses `addr`. Nothing is bound until [`serve`](Server::serve).
    ///
    /// ```rust
    /// use hapi::Server;
    /// let server = Server::bind("0.0.0.0:3000").unwrap();
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::InvalidAddr(addr.to_owned()))?;
        Ok(Self { addr })
    }

    /// Starts accepting connections and dispatching them through `dispatcher`.
    ///
    /// Resolves once a shutdown signal arrived and every open connection
    /// has been drained.
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // The registry inside is read-only from here on; every connection
        // task shares it through the Arc.
        let dispatcher = Arc::new(dispatcher);

        info!(addr = %self.addr, routes = dispatcher.registry().routes().len(), "hapi listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting even if
                // more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection, not once
                        // per connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move { handle(dispatcher, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connections.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("hapi stopped");
        Ok(())
    }
}

// ── Request conversion ────────────────────────────────────────────────────────

/// Reads one hyper request fully and hands it to the dispatcher.
///
/// Never fails towards hyper: unsupported methods get `405` and unreadable
/// bodies `400`.
async fn handle(
    dispatcher: Arc<Dispatcher>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let method = match supported_method(&parts.method) {
        Ok(method) => method,
        Err(response) => return Ok(response.into_inner()),
    };

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("failed to read request body: {e}");
            return Ok(Response::status(Status::BadRequest).into_inner());
        }
    };

    let request = to_request(method, &parts, &body);
    Ok(dispatcher.dispatch(request).await.into_inner())
}

/// Only GET, POST and DELETE reach the dispatcher; anything else is `405`.
fn supported_method(method: &http::Method) -> Result<Method, Response> {
    Method::try_from(method).map_err(|_| {
        debug!(%method, "method not allowed");
        Response::status(Status::MethodNotAllowed)
    })
}

fn to_request(method: Method, parts: &Parts, body: &[u8]) -> Request {
    let mut request = Request::new(method, parts.uri.path());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            request = request.header(name.as_str(), value);
        }
    }
    request
        .query_string(parts.uri.query().unwrap_or_default())
        .body_bytes(body)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
