//! Test doubles for the cluster driver and the health reporter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{Document, doc};

use replwatch_config::Config;

use crate::driver::{ClusterDriver, DriverError, DriverFailure};
use crate::errors::{ClusterError, ErrorKind};
use crate::health::HealthReporter;

/// Status reply returned by [`FakeDriver`] unless told otherwise.
pub fn healthy_status() -> Document {
    doc! {
        "set": "rs0",
        "myState": 1,
        "members": [
            { "_id": 0, "name": "db-0:27017", "health": 1.0, "stateStr": "PRIMARY" },
            { "_id": 1, "name": "db-1:27017", "health": 1.0, "stateStr": "SECONDARY" },
        ],
        "ok": 1.0,
    }
}

/// Connection handed out by [`FakeDriver`].
#[derive(Debug, PartialEq, Eq)]
pub struct FakeHandle {
    pub id: usize,
}

#[derive(Debug, Default)]
struct Behaviour {
    connect_delay: Duration,
    connect_failure: Option<String>,
    command_delay: Duration,
    command_failure: Option<DriverError>,
    reply: Option<Document>,
}

#[derive(Debug, Default)]
struct Inner {
    behaviour: Mutex<Behaviour>,
    commands: Mutex<Vec<(String, Document)>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

/// Scriptable driver that records every call it receives.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    inner: Arc<Inner>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn behaviour(&self) -> std::sync::MutexGuard<'_, Behaviour> {
        self.inner
            .behaviour
            .lock()
            .expect("fake driver mutex poisoned")
    }

    /// Makes each connection attempt take `delay`.
    pub fn delay_connects(&self, delay: Duration) {
        self.behaviour().connect_delay = delay;
    }

    /// Makes connection attempts fail with `message`.
    pub fn fail_connects(&self, message: &str) {
        self.behaviour().connect_failure = Some(message.to_owned());
    }

    pub fn accept_connects(&self) {
        self.behaviour().connect_failure = None;
    }

    /// Makes each command take `delay` before replying.
    pub fn delay_commands(&self, delay: Duration) {
        self.behaviour().command_delay = delay;
    }

    /// Makes the cluster reject commands with `message`.
    pub fn reject_commands(&self, message: &str) {
        self.behaviour().command_failure =
            Some(DriverError::new(DriverFailure::Command, message));
    }

    /// Makes commands fail as if the link had dropped.
    pub fn break_link(&self) {
        self.behaviour().command_failure = Some(DriverError::new(
            DriverFailure::Connection,
            "connection reset by peer",
        ));
    }

    pub fn accept_commands(&self) {
        self.behaviour().command_failure = None;
    }

    /// Replaces the reply returned by successful commands.
    pub fn reply_with(&self, reply: Document) {
        self.behaviour().reply = Some(reply);
    }

    /// Returns a handle without recording a connection attempt.
    pub fn connect_now(&self) -> FakeHandle {
        FakeHandle { id: 0 }
    }

    pub fn commands(&self) -> Vec<(String, Document)> {
        self.inner
            .commands
            .lock()
            .expect("fake driver mutex poisoned")
            .clone()
    }

    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    /// Waits until at least `expected` disconnects have happened.
    pub async fn wait_for_disconnects(&self, expected: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while self.disconnect_count() < expected {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        assert!(
            waited.is_ok(),
            "expected {expected} disconnects, saw {}",
            self.disconnect_count()
        );
    }
}

#[async_trait]
impl ClusterDriver for FakeDriver {
    type Handle = FakeHandle;

    async fn connect(&self, _uri: &str) -> Result<FakeHandle, DriverError> {
        let (delay, failure) = {
            let behaviour = self.behaviour();
            (behaviour.connect_delay, behaviour.connect_failure.clone())
        };
        let id = self.inner.connects.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(delay).await;
        match failure {
            Some(message) => Err(DriverError::new(DriverFailure::Connection, message)),
            None => Ok(FakeHandle { id }),
        }
    }

    async fn disconnect(&self, _handle: &FakeHandle) -> Result<(), DriverError> {
        self.inner.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run_command(
        &self,
        _handle: &FakeHandle,
        database: &str,
        command: Document,
    ) -> Result<Document, DriverError> {
        self.inner
            .commands
            .lock()
            .expect("fake driver mutex poisoned")
            .push((database.to_owned(), command));
        let (delay, failure, reply) = {
            let behaviour = self.behaviour();
            let failure = behaviour
                .command_failure
                .as_ref()
                .map(|error| DriverError::new(error.failure(), error.message()));
            (behaviour.command_delay, failure, behaviour.reply.clone())
        };
        tokio::time::sleep(delay).await;
        match failure {
            Some(error) => Err(error),
            None => Ok(reply.unwrap_or_else(healthy_status)),
        }
    }
}

/// Structured health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    ConfigurationLoaded,
    ConnectionEstablishing,
    ConnectionReady,
    ConnectionFailed(ErrorKind),
    ConnectionInvalidated { cleared: bool },
    ConnectionClosed,
    ConnectionCloseFailed(ErrorKind),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn configuration_loaded(&self, _config: &Config) {
        self.record(HealthEvent::ConfigurationLoaded);
    }

    fn connection_establishing(&self) {
        self.record(HealthEvent::ConnectionEstablishing);
    }

    fn connection_ready(&self) {
        self.record(HealthEvent::ConnectionReady);
    }

    fn connection_failed(&self, error: &ClusterError) {
        self.record(HealthEvent::ConnectionFailed(error.kind()));
    }

    fn connection_invalidated(&self, cleared: bool) {
        self.record(HealthEvent::ConnectionInvalidated { cleared });
    }

    fn connection_closed(&self) {
        self.record(HealthEvent::ConnectionClosed);
    }

    fn connection_close_failed(&self, error: &ClusterError) {
        self.record(HealthEvent::ConnectionCloseFailed(error.kind()));
    }
}
