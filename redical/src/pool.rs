use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::cmd::Cmd;
use crate::config::PoolOptions;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, Transaction};
use crate::value::{from_value, FromValue, Value};

// A pool's connections consist of the following:
// * idle connections sitting around in the pool: `idle`
// * connections currently handed out: `in_use`
// * connections being established: `acquiring`
// * available = idle.len()
// * size = acquiring + available + in_use
struct PoolState {
    idle: VecDeque<Connection>,
    in_use: usize,
    acquiring: usize,
    closing: bool,
    closed: bool,
}

struct PoolInner {
    options: PoolOptions,
    state: Mutex<PoolState>,
    /// Signalled whenever a connection or slot is released
    released: Notify,
}

enum Acquire {
    Ready(Connection),
    Grow,
    Wait,
}

/// A pool of connections to a single server.
///
/// The pool is pre-populated to its minimum size and grows on demand up to
/// its maximum. Acquisition beyond the maximum waits until a connection is
/// released. Cloning is cheap and all clones share the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Validate the options and pre-populate the pool to its minimum size.
    pub async fn connect(options: PoolOptions) -> Result<ConnectionPool> {
        options.validate()?;

        let pool = ConnectionPool {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    idle: VecDeque::with_capacity(options.max_size),
                    in_use: 0,
                    acquiring: 0,
                    closing: false,
                    closed: false,
                }),
                released: Notify::new(),
                options,
            }),
        };

        while pool.size() < pool.inner.options.min_size {
            let conn = Connection::connect(pool.inner.options.connect.clone()).await?;
            pool.lock_state().idle.push_back(conn);
        }
        info!(
            "Populated connection pool with {} connection(s)",
            pool.available()
        );
        Ok(pool)
    }

    pub async fn connect_uri(uri: &str) -> Result<ConnectionPool> {
        Self::connect(PoolOptions::from_uri(uri)?).await
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of connections sitting idle and available for use.
    pub fn available(&self) -> usize {
        self.lock_state().idle.len()
    }

    /// Number of connections currently handed out.
    pub fn in_use(&self) -> usize {
        self.lock_state().in_use
    }

    /// Total number of connections, regardless of their current state.
    pub fn size(&self) -> usize {
        let state = self.lock_state();
        state.idle.len() + state.in_use + state.acquiring
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    pub fn is_closing(&self) -> bool {
        self.lock_state().closing
    }

    pub fn max_size(&self) -> usize {
        self.inner.options.max_size
    }

    pub fn min_size(&self) -> usize {
        self.inner.options.min_size
    }

    /// Take a connection out of the pool, growing or waiting as needed.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        loop {
            // register interest before inspecting state so a release
            // between the check and the await is not lost
            let notified = self.inner.released.notified();

            let action = {
                let mut state = self.lock_state();
                if state.closed {
                    return Err(Error::PoolClosed);
                }
                if state.closing {
                    // hand the wakeup on to wait_closed or other waiters
                    self.inner.released.notify_one();
                    return Err(Error::PoolClosing);
                }

                let before = state.idle.len();
                state.idle.retain(|conn| !conn.is_closed());
                if state.idle.len() < before {
                    info!(
                        "Removed {} stale connection(s) from pool",
                        before - state.idle.len()
                    );
                }

                if let Some(conn) = state.idle.pop_front() {
                    state.in_use += 1;
                    Acquire::Ready(conn)
                } else if state.idle.len() + state.in_use + state.acquiring
                    < self.inner.options.max_size
                {
                    state.acquiring += 1;
                    Acquire::Grow
                } else {
                    Acquire::Wait
                }
            };

            match action {
                Acquire::Ready(conn) => {
                    debug!("retrieved connection from pool");
                    return Ok(self.guard(conn));
                }
                Acquire::Grow => return self.grow().await,
                Acquire::Wait => {
                    debug!("waiting for next available connection");
                    notified.await;
                }
            }
        }
    }

    /// Establish a new connection for a reserved slot.
    async fn grow(&self) -> Result<PooledConnection> {
        match Connection::connect(self.inner.options.connect.clone()).await {
            Ok(conn) => {
                let mut state = self.lock_state();
                state.acquiring -= 1;
                if state.closing || state.closed {
                    drop(state);
                    self.inner.released.notify_one();
                    return Err(Error::PoolClosing);
                }
                state.in_use += 1;
                drop(state);
                info!("Added additional connection to pool");
                Ok(self.guard(conn))
            }
            Err(e) => {
                self.lock_state().acquiring -= 1;
                // free the reserved slot for whoever is waiting
                self.inner.released.notify_one();
                Err(e)
            }
        }
    }

    fn guard(&self, conn: Connection) -> PooledConnection {
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Acquire a connection, run one command, release the connection.
    pub async fn execute<T: FromValue>(&self, cmd: Cmd) -> Result<T> {
        let mut conn = self.acquire().await?;
        from_value(conn.command(cmd).await?)
    }

    /// Run a pipeline on a dedicated connection.
    pub async fn pipeline(&self, pipeline: Pipeline) -> Result<Vec<Value>> {
        let mut conn = self.acquire().await?;
        pipeline.execute(&mut conn).await
    }

    /// Start a transaction on a dedicated connection. The connection
    /// returns to the pool when the transaction commits or aborts.
    pub async fn transaction(
        &self,
        watch_keys: &[&str],
    ) -> Result<Transaction<PooledConnection>> {
        Transaction::begin(self.acquire().await?, watch_keys).await
    }

    /// Refuse new work. In-flight connections drain via
    /// [`wait_closed`](ConnectionPool::wait_closed).
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock_state();
        if state.closing {
            return Err(Error::PoolClosing);
        }
        if state.closed {
            return Err(Error::PoolClosed);
        }
        info!(
            "Closing all connections ({})",
            state.idle.len() + state.in_use + state.acquiring
        );
        state.closing = true;
        Ok(())
    }

    /// Shut down idle connections and wait for handed-out connections to
    /// come back.
    pub async fn wait_closed(&self) -> Result<()> {
        if !self.lock_state().closing {
            return Err(Error::PoolNotClosing);
        }

        let idle: Vec<Connection> = {
            let mut state = self.lock_state();
            state.idle.drain(..).collect()
        };
        join_all(idle.into_iter().map(|mut conn| async move {
            let _ = conn.close().await;
        }))
        .await;

        loop {
            let notified = self.inner.released.notified();
            {
                let mut state = self.lock_state();
                if state.in_use == 0 && state.acquiring == 0 {
                    state.closing = false;
                    state.closed = true;
                    break;
                }
            }
            notified.await;
        }
        info!("All connections have been closed");
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("ConnectionPool")
            .field("available", &state.idle.len())
            .field("in_use", &state.in_use)
            .field("acquiring", &state.acquiring)
            .field("closing", &state.closing)
            .finish()
    }
}

/// RAII guard for a connection taken from the pool.
///
/// On drop the connection re-enters the idle set, unless it is closed or
/// the pool is shutting down, in which case it is discarded.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already released")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            {
                let mut state = self
                    .pool
                    .state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                state.in_use -= 1;
                // only open connections go back into rotation
                if !conn.is_closed() && !state.closing && !state.closed {
                    state.idle.push_back(conn);
                }
            }
            self.pool.released.notify_one();
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .finish()
    }
}
