use async_trait::async_trait;

use crate::cmd::Cmd;
use crate::commands::Executable;
use crate::config::PoolOptions;
use crate::error::Result;
use crate::pipeline::{Pipeline, Transaction};
use crate::pool::{ConnectionPool, PooledConnection};
use crate::value::Value;

/// High-level client backed by a connection pool.
///
/// All command traits apply directly:
///
/// ```no_run
/// use redical::{Redical, StringCommands};
///
/// # async fn demo() -> redical::Result<()> {
/// let mut client = Redical::connect_uri("redis://127.0.0.1:6379").await?;
/// client.set("greeting", "hello").await?;
/// let greeting = client.get("greeting").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Redical {
    pool: ConnectionPool,
}

impl Redical {
    pub async fn connect(options: PoolOptions) -> Result<Redical> {
        Ok(Redical {
            pool: ConnectionPool::connect(options).await?,
        })
    }

    pub async fn connect_uri(uri: &str) -> Result<Redical> {
        Ok(Redical {
            pool: ConnectionPool::connect_uri(uri).await?,
        })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run a pipeline on a dedicated connection from the pool.
    pub async fn pipeline(&self, pipeline: Pipeline) -> Result<Vec<Value>> {
        self.pool.pipeline(pipeline).await
    }

    /// Start a transaction on a dedicated connection from the pool.
    pub async fn transaction(
        &self,
        watch_keys: &[&str],
    ) -> Result<Transaction<PooledConnection>> {
        self.pool.transaction(watch_keys).await
    }

    /// Refuse new work; see [`ConnectionPool::close`].
    pub fn close(&self) -> Result<()> {
        self.pool.close()
    }

    /// Wait until every connection has been shut down or returned.
    pub async fn wait_closed(&self) -> Result<()> {
        self.pool.wait_closed().await
    }
}

#[async_trait]
impl Executable for Redical {
    async fn command(&mut self, cmd: Cmd) -> Result<Value> {
        let mut conn = self.pool.acquire().await?;
        crate::connection::Connection::command(&mut *conn, cmd).await
    }
}
