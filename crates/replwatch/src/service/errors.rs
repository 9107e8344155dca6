//! Error types for the HTTP service.
//!
//! [`DispatchError`] carries the status code a failed request is answered
//! with, and renders itself as a small JSON body so clients can tell a
//! rejected method from an unreachable cluster.

use std::future::{self, Ready};
use std::io;
use std::net::SocketAddr;

use axum::Json;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::errors::{ClusterError, ErrorKind};

/// Failure surfaced to an HTTP client.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DispatchError {
    status: StatusCode,
    kind: String,
    message: String,
}

impl DispatchError {
    /// Builds an error answered with `500 Internal Server Error`.
    #[must_use]
    pub fn internal(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Builds the error returned for any method other than `GET`.
    #[must_use]
    pub fn method_not_allowed(method: &Method) -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            kind: "method".to_owned(),
            message: format!("method {method} is not allowed"),
        }
    }

    /// Builds the error returned when a whole exchange outlives the
    /// listener timeout.
    #[must_use]
    pub fn request_timeout() -> Self {
        Self {
            status: StatusCode::REQUEST_TIMEOUT,
            kind: "timeout".to_owned(),
            message: "request exceeded the listener timeout".to_owned(),
        }
    }

    /// Overrides the status code.
    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Status code the request is answered with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Short label describing the failure.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind.as_str()
    }
}

impl From<&ClusterError> for DispatchError {
    fn from(error: &ClusterError) -> Self {
        let base = Self::internal(error.kind().to_string(), error.to_string());
        match error.kind() {
            ErrorKind::Parse => base.with_status(StatusCode::BAD_REQUEST),
            ErrorKind::Connect | ErrorKind::Timeout | ErrorKind::Upstream | ErrorKind::Encode => {
                base
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: u16,
    kind: &'a str,
    error: &'a str,
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            status: self.status.as_u16(),
            kind: &self.kind,
            error: &self.message,
        });
        if self.status == StatusCode::METHOD_NOT_ALLOWED {
            return (self.status, [(header::ALLOW, "GET")], body).into_response();
        }
        (self.status, body).into_response()
    }
}

/// Gives the bare timeout response the same JSON shape as every other
/// failure.
pub(super) fn describe_timeout(response: Response) -> Ready<Response> {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return future::ready(DispatchError::request_timeout().into_response());
    }
    future::ready(response)
}

/// Errors that stop the HTTP service.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listening socket could not be bound.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        /// Address the service tried to bind.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The server loop failed.
    #[error("failed to serve HTTP: {0}")]
    Serve(#[source] io::Error),
}
