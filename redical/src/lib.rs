//! An asynchronous Redis client built on tokio.
//!
//! The entry points are [`Connection`] for a single connection,
//! [`ConnectionPool`] for pooled use, and [`Redical`] as a pooled facade.
//! Typed commands come from extension traits ([`StringCommands`],
//! [`HashCommands`], ...) which apply to all three. [`Pipeline`] batches commands on one socket write;
//! [`Transaction`] wraps MULTI/EXEC with optional WATCH keys.

mod client;
mod cmd;
mod commands;
mod config;
mod connection;
mod error;
mod pipeline;
mod pool;
// Exposed as a module so integration tests can speak raw frames
pub mod resp;
mod value;

pub use client::Redical;
pub use cmd::{Cmd, ToArg};
pub use commands::{
    Executable, HashCommands, KeyCommands, ScorePolicy, ServerCommands, SetCommands,
    SetCondition, SetExpire, SetOptions, SortedSetCommands, SscanIter, SscanResponse,
    StringCommands, UpdatePolicy, ZaddOptions,
};
pub use config::{
    Address, ConnectOptions, PoolOptions, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_PORT, DEFAULT_TIMEOUT,
};
pub use connection::Connection;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, Transaction};
pub use pool::{ConnectionPool, PooledConnection};
pub use value::{FromValue, Value};
