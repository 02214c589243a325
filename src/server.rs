//! Local HTTP server and graceful shutdown.
//!
//! In production the gateway turns HTTP into events. For local runs this
//! server plays that role: each hyper request becomes an [`Event`], goes
//! through [`App::handle`], and the returned [`Envelope`] becomes the HTTP
//! response.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::string::FromUtf8Error;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::GENERIC_ERROR_MESSAGE;
use crate::event::Event;
use crate::handler::App;
use crate::response::{Envelope, build_response};
use crate::status::Status;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, app: Arc<App>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, surface = ?app.surface(), "mandir-api listening");

        // Tracks every connection task so shutdown can wait for them.
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

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(app, req).await }
                        });

                        // Handles both HTTP/1.1 and HTTP/2, whatever the
                        // client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("mandir-api stopped");
        Ok(())
    }
}

// ── Request dispatch ─────────────────────────────────────────────────────────

/// Turns one hyper request into one response. Every failure is already an
/// envelope by the time it gets here, so hyper never sees an error.
async fn dispatch(
    app: Arc<App>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("failed to read request body: {e}");
            return Ok(plain(http::StatusCode::BAD_REQUEST));
        }
    };

    let event = match to_event(&parts, bytes) {
        Ok(event) => event,
        Err(e) => {
            error!("request body is not UTF-8: {e}");
            let envelope = build_response(
                Status::BadRequest,
                GENERIC_ERROR_MESSAGE,
                app.surface().cors(),
            );
            return Ok(from_envelope(envelope));
        }
    };

    Ok(from_envelope(app.handle(event).await))
}

/// Builds the gateway event for a request. Bodies must be UTF-8; the
/// gateway never hands over anything else.
fn to_event(parts: &http::request::Parts, bytes: Bytes) -> Result<Event, FromUtf8Error> {
    let body = if bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8(bytes.to_vec())?)
    };

    Ok(Event {
        http_method: Some(parts.method.as_str().to_owned()),
        path: Some(parts.uri.path().to_owned()),
        query_string_parameters: parts.uri.query().and_then(parse_query),
        body,
    })
}

/// Decodes a query string the way the gateway does: `None` when empty, last
/// value wins for repeated names.
fn parse_query(query: &str) -> Option<HashMap<String, String>> {
    let params: HashMap<String, String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(name), decode(value))
        })
        .collect();

    (!params.is_empty()).then_some(params)
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn from_envelope(envelope: Envelope) -> http::Response<Full<Bytes>> {
    let status = http::StatusCode::from_u16(envelope.status_code)
        .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = http::Response::builder().status(status);
    for (name, value) in &envelope.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(Full::new(Bytes::from(envelope.body)))
        .unwrap_or_else(|e| {
            error!("invalid response envelope: {e}");
            plain(http::StatusCode::INTERNAL_SERVER_ERROR)
        })
}

fn plain(status: http::StatusCode) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

// ── Shutdown signal ──────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only
/// Ctrl-C is available.
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(method: &str, uri: &str) -> http::request::Parts {
        http::Request::builder().method(method).uri(uri).body(()).unwrap().into_parts().0
    }

    #[test]
    fn requests_become_gateway_events() {
        let body = Bytes::from_static(br#"{"mandirName":"X"}"#);
        let event = to_event(&parts("POST", "/leaderInfo?mandirName=X"), body).unwrap();
        assert_eq!(event.http_method.as_deref(), Some("POST"));
        assert_eq!(event.path(), "/leaderInfo");
        assert_eq!(event.query("mandirName"), Some("X"));
        assert_eq!(event.body.as_deref(), Some(r#"{"mandirName":"X"}"#));

        let event = to_event(&parts("GET", "/kids"), Bytes::new()).unwrap();
        assert_eq!(event.body, None);
        assert_eq!(event.query_string_parameters, None);
    }

    #[test]
    fn non_utf8_bodies_are_rejected() {
        let body = Bytes::from_static(&[b'{', 0xff, 0xfe, b'}']);
        assert!(to_event(&parts("POST", "/kids"), body).is_err());
    }

    #[test]
    fn query_strings_decode_like_the_gateway() {
        let params = parse_query("mandirName=Sri%20Ganesh&date=2024-03-01&x=a+b").unwrap();
        assert_eq!(params["mandirName"], "Sri Ganesh");
        assert_eq!(params["date"], "2024-03-01");
        assert_eq!(params["x"], "a b");
    }

    #[test]
    fn empty_query_is_absent() {
        assert_eq!(parse_query(""), None);
        assert_eq!(parse_query("&&"), None);
    }

    #[test]
    fn envelope_maps_onto_http_response() {
        let envelope = build_response(Status::NotFound, "404 Not Found", true);
        let response = from_envelope(envelope);
        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
