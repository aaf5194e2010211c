//! Typed command methods, grouped the way the Redis documentation groups
//! them. Each group is an extension trait with default methods over
//! [`Executable`], so they apply to a [`Connection`], a pooled connection,
//! a [`ConnectionPool`](crate::ConnectionPool), or a
//! [`Redical`](crate::Redical) client alike.

mod hash;
mod key;
mod server;
mod set;
mod sorted_set;
mod string;

pub use hash::HashCommands;
pub use key::KeyCommands;
pub use server::ServerCommands;
pub use set::{SetCommands, SscanIter, SscanResponse};
pub use sorted_set::{ScorePolicy, SortedSetCommands, UpdatePolicy, ZaddOptions};
pub use string::{SetCondition, SetExpire, SetOptions, StringCommands};

use async_trait::async_trait;

use crate::cmd::Cmd;
use crate::connection::Connection;
use crate::error::Result;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::value::Value;

/// Anything that can send a command and produce its reply.
#[async_trait]
pub trait Executable: Send {
    async fn command(&mut self, cmd: Cmd) -> Result<Value>;
}

#[async_trait]
impl Executable for Connection {
    async fn command(&mut self, cmd: Cmd) -> Result<Value> {
        Connection::command(self, cmd).await
    }
}

#[async_trait]
impl Executable for PooledConnection {
    async fn command(&mut self, cmd: Cmd) -> Result<Value> {
        Connection::command(&mut *self, cmd).await
    }
}

/// One-shot execution: every command acquires a connection and releases it
/// again. Use [`ConnectionPool::transaction`] or
/// [`ConnectionPool::pipeline`] when commands must share a connection.
#[async_trait]
impl Executable for ConnectionPool {
    async fn command(&mut self, cmd: Cmd) -> Result<Value> {
        let mut conn = self.acquire().await?;
        Connection::command(&mut *conn, cmd).await
    }
}
