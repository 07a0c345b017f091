//! Bounded pool of logged-in SIP2 connections.
//!
//! A semaphore limits how many connections exist at once. Idle connections
//! are reused; a connection that failed mid-call is dropped instead of being
//! returned, and the next borrower dials a fresh one.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rfidhub_core::SipConfig;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

use crate::connection::SipConnection;
use crate::error::{SipError, SipResult};

/// Shared SIP2 connection pool.
pub struct SipPool {
    config: SipConfig,
    permits: Semaphore,
    idle: Mutex<Vec<SipConnection>>,
    closed: AtomicBool,
}

impl SipPool {
    pub fn new(config: SipConfig) -> Self {
        let size = config.pool_size.max(1);
        Self {
            config,
            permits: Semaphore::new(size),
            idle: Mutex::new(Vec::with_capacity(size)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SipConfig {
        &self.config
    }

    /// Pre-warm one connection so a bad address or login shows up at startup.
    /// Failure is logged; connections are retried on demand. The attempt is
    /// bounded by the call timeout.
    pub async fn open(&self) {
        let timeout = self.config.call_timeout();
        let dialed = tokio::time::timeout(timeout, self.dial())
            .await
            .unwrap_or_else(|_| Err(SipError::Timeout(timeout.as_secs())));
        match dialed {
            Ok(conn) => {
                self.idle.lock().push(conn);
                info!(addr = %self.config.addr, "SIP connection pool ready");
            }
            Err(e) => {
                warn!(addr = %self.config.addr, error = %e, "SIP pre-connect failed, will retry on demand");
            }
        }
    }

    /// Close the pool: pending borrowers fail and idle connections are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.permits.close();
        let drained = std::mem::take(&mut *self.idle.lock());
        debug!(count = drained.len(), "SIP connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of idle connections.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Borrow a connection, dialing a new one when none is idle.
    pub async fn acquire(&self) -> SipResult<PooledConnection<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SipError::PoolClosed)?;

        let reused = self.idle.lock().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.dial().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: self,
            _permit: permit,
        })
    }

    async fn dial(&self) -> SipResult<SipConnection> {
        SipConnection::open(
            &self.config.addr,
            &self.config.username,
            &self.config.password,
            &self.config.location,
        )
        .await
    }
}

/// A borrowed connection. Dropping it discards the connection; call
/// [`PooledConnection::release`] to hand a healthy one back.
pub struct PooledConnection<'a> {
    conn: Option<SipConnection>,
    pool: &'a SipPool,
    _permit: SemaphorePermit<'a>,
}

impl PooledConnection<'_> {
    pub async fn call(&mut self, request: &str) -> SipResult<String> {
        match self.conn.as_mut() {
            Some(conn) => conn.call(request).await,
            None => Err(SipError::Closed),
        }
    }

    /// Return the connection to the idle list.
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            if !self.pool.is_closed() {
                self.pool.idle.lock().push(conn);
            }
        }
    }
}
