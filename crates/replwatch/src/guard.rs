//! Lazily established connection shared across concurrent requests.
//!
//! The guard owns at most one live handle. The first caller to [`acquire`]
//! establishes it while holding the slot lock, so concurrent callers queue
//! behind a single connection attempt and then reuse the same handle. After a
//! failed operation the caller hands the handle back through [`release`] with
//! `invalidate` set; the slot is cleared and the handle is closed on a
//! background task so the next acquirer is not held up by teardown.
//!
//! [`acquire`]: ConnectionGuard::acquire
//! [`release`]: ConnectionGuard::release

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::driver::ClusterDriver;
use crate::errors::ClusterError;
use crate::executor;
use crate::health::HealthReporter;

/// Shared handle lent out by [`ConnectionGuard::acquire`].
pub type Lease<H> = Arc<H>;

#[derive(Debug)]
enum Slot<H> {
    Empty,
    Holding(Lease<H>),
}

impl<H> Slot<H> {
    /// Clears the slot when it holds `handle` and `invalidate` is set.
    /// Returns `true` when the slot was cleared.
    fn release(&mut self, handle: &Lease<H>, invalidate: bool) -> bool {
        let current = matches!(self, Self::Holding(stored) if Arc::ptr_eq(stored, handle));
        if current && invalidate {
            *self = Self::Empty;
            return true;
        }
        false
    }

    fn take(&mut self) -> Option<Lease<H>> {
        match std::mem::replace(self, Self::Empty) {
            Self::Holding(handle) => Some(handle),
            Self::Empty => None,
        }
    }
}

/// Brokers the lifetime of a single cluster connection.
pub struct ConnectionGuard<D: ClusterDriver> {
    driver: Arc<D>,
    uri: String,
    timeout: Duration,
    slot: Mutex<Slot<D::Handle>>,
    reporter: Arc<dyn HealthReporter>,
}

impl<D: ClusterDriver> ConnectionGuard<D> {
    /// Builds an empty guard. No connection is attempted until the first
    /// call to [`ConnectionGuard::acquire`].
    #[must_use]
    pub fn new(
        driver: Arc<D>,
        uri: impl Into<String>,
        timeout: Duration,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            driver,
            uri: uri.into(),
            timeout,
            slot: Mutex::new(Slot::Empty),
            reporter,
        }
    }

    /// Driver used to open and close connections.
    #[must_use]
    pub fn driver(&self) -> &D {
        self.driver.as_ref()
    }

    /// Deadline applied to connection establishment and teardown.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the stored handle, establishing one first when the slot is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Connect`] or [`ClusterError::Timeout`] when
    /// establishment fails. The slot stays empty so the next caller retries.
    pub async fn acquire(&self) -> Result<Lease<D::Handle>, ClusterError> {
        let mut slot = self.slot.lock().await;
        if let Slot::Holding(handle) = &*slot {
            return Ok(Arc::clone(handle));
        }

        self.reporter.connection_establishing();
        let outcome = executor::connect(self.driver.as_ref(), &self.uri, self.timeout).await;

        match outcome {
            Ok(handle) => {
                let handle = Arc::new(handle);
                *slot = Slot::Holding(Arc::clone(&handle));
                self.reporter.connection_ready();
                Ok(handle)
            }
            Err(error) => {
                self.reporter.connection_failed(&error);
                Err(error)
            }
        }
    }

    /// Hands a handle back after an operation.
    ///
    /// With `invalidate` unset the handle stays stored for reuse. With it
    /// set, the slot is cleared if it still holds this exact handle, and the
    /// handle is closed on a background task once the lock is released. A
    /// handle from a superseded acquisition never clears a newer one.
    pub async fn release(&self, handle: Lease<D::Handle>, invalidate: bool) {
        let cleared = self.slot.lock().await.release(&handle, invalidate);
        if !invalidate {
            return;
        }

        self.reporter.connection_invalidated(cleared);
        let driver = Arc::clone(&self.driver);
        let reporter = Arc::clone(&self.reporter);
        let timeout = self.timeout;
        tokio::spawn(async move {
            close(driver.as_ref(), &*handle, timeout, reporter.as_ref()).await;
        });
    }

    /// Returns `true` while a handle is stored.
    pub async fn is_connected(&self) -> bool {
        matches!(&*self.slot.lock().await, Slot::Holding(_))
    }

    /// Clears the slot and closes the stored handle, if any, in the
    /// foreground.
    pub async fn shutdown(&self) {
        let taken = self.slot.lock().await.take();
        if let Some(handle) = taken {
            close(
                self.driver.as_ref(),
                &*handle,
                self.timeout,
                self.reporter.as_ref(),
            )
            .await;
        }
    }
}

async fn close<D: ClusterDriver>(
    driver: &D,
    handle: &D::Handle,
    timeout: Duration,
    reporter: &dyn HealthReporter,
) {
    match executor::disconnect(driver, handle, timeout).await {
        Ok(()) => reporter.connection_closed(),
        Err(error) => reporter.connection_close_failed(&error),
    }
}
