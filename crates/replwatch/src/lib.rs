//! Replica set status and initiation for MongoDB.
//!
//! The crate answers two questions about a replica set: what is its status,
//! and can it be initiated from a configuration document. It does so either
//! once from the command line or continuously over HTTP.
//!
//! Both paths share the [`executor`], which runs every cluster operation
//! inside its own timeout, and the [`encoder`], which renders replies as
//! relaxed extended JSON. The HTTP [`service`] adds a [`ConnectionGuard`]
//! that lazily opens one connection, shares it between concurrent requests,
//! and drops it after a failed operation so the next request reconnects.
//!
//! Connection lifecycle events are surfaced through [`HealthReporter`] so
//! operators can follow reconnect churn in the structured logs.

mod cli;
pub mod driver;
pub mod encoder;
mod errors;
pub mod executor;
mod guard;
mod health;
pub mod oneshot;
pub mod service;
mod telemetry;

pub use cli::run;
pub use driver::{ClusterDriver, DriverError, DriverFailure, MongoDriver};
pub use encoder::AdminReply;
pub use errors::{ClusterError, ErrorKind};
pub use guard::{ConnectionGuard, Lease};
pub use health::{HealthReporter, StructuredHealthReporter};

#[cfg(test)]
mod tests;
