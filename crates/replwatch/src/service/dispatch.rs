//! Request handling for the status endpoint.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::{TryStreamExt, future};
use tracing::{debug, warn};

use replwatch_config::{Config, InvalidationPolicy};

use crate::driver::ClusterDriver;
use crate::encoder;
use crate::errors::ClusterError;
use crate::executor;
use crate::guard::ConnectionGuard;

use super::SERVICE_TARGET;
use super::errors::DispatchError;

/// Shared state handed to every request.
pub struct ServiceState<D: ClusterDriver> {
    guard: Arc<ConnectionGuard<D>>,
    admin_db: String,
    timeout: Duration,
    policy: InvalidationPolicy,
}

impl<D: ClusterDriver> ServiceState<D> {
    /// Builds the state from a guard and the resolved configuration.
    #[must_use]
    pub fn new(guard: Arc<ConnectionGuard<D>>, config: &Config) -> Self {
        Self {
            guard,
            admin_db: config.admin_db().to_owned(),
            timeout: config.timeout(),
            policy: config.invalidation_policy(),
        }
    }

    /// Connection guard shared by all requests.
    #[must_use]
    pub fn guard(&self) -> &Arc<ConnectionGuard<D>> {
        &self.guard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestPhase {
    Received,
    Executing,
    Encoding,
    Responding,
    Failed,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Received => "received",
            Self::Executing => "executing",
            Self::Encoding => "encoding",
            Self::Responding => "responding",
            Self::Failed => "failed",
        };
        formatter.write_str(label)
    }
}

/// Answers a request with the current replica set status.
pub(crate) async fn handle<D: ClusterDriver>(
    State(state): State<Arc<ServiceState<D>>>,
    method: Method,
    body: Body,
) -> Response {
    debug!(target: SERVICE_TARGET, phase = %RequestPhase::Received, %method);
    let outcome = if method == Method::GET {
        status(&state).await
    } else {
        Err(DispatchError::method_not_allowed(&method))
    };
    drain(body).await;

    match outcome {
        Ok(bytes) => {
            debug!(target: SERVICE_TARGET, phase = %RequestPhase::Responding, bytes = bytes.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                bytes,
            )
                .into_response()
        }
        Err(error) => {
            warn!(
                target: SERVICE_TARGET,
                phase = %RequestPhase::Failed,
                status = error.status().as_u16(),
                kind = error.kind(),
                %error,
                "request failed"
            );
            error.into_response()
        }
    }
}

async fn status<D: ClusterDriver>(state: &ServiceState<D>) -> Result<Bytes, DispatchError> {
    let handle = state
        .guard
        .acquire()
        .await
        .map_err(|error| DispatchError::from(&error))?;

    debug!(target: SERVICE_TARGET, phase = %RequestPhase::Executing);
    let result = executor::query_status(
        state.guard.driver(),
        &*handle,
        &state.admin_db,
        state.timeout,
    )
    .await;
    let invalidate = result
        .as_ref()
        .err()
        .is_some_and(|error: &ClusterError| error.invalidates_connection(state.policy));
    state.guard.release(handle, invalidate).await;
    let reply = result.map_err(|error| DispatchError::from(&error))?;

    debug!(target: SERVICE_TARGET, phase = %RequestPhase::Encoding);
    encoder::encode(&reply)
        .map(Bytes::from)
        .map_err(|error| DispatchError::from(&error))
}

/// Reads the request body to the end, discarding each chunk as it arrives.
async fn drain(body: Body) {
    let drained = body
        .into_data_stream()
        .try_for_each(|_chunk| future::ok(()))
        .await;
    if let Err(error) = drained {
        debug!(target: SERVICE_TARGET, %error, "failed to drain request body");
    }
}
