use async_trait::async_trait;

use super::Executable;
use crate::cmd::Cmd;
use crate::error::{Error, Result};
use crate::value::from_value;

/// TTL replies use `-2` for a missing key and `-1` for a key without an
/// expiry; both become dedicated errors.
fn ttl_reply(key: &str, reply: i64) -> Result<i64> {
    match reply {
        -2 => Err(Error::InvalidKey(key.to_string())),
        -1 => Err(Error::NoExpiry(key.to_string())),
        n => Ok(n),
    }
}

#[async_trait]
pub trait KeyCommands: Executable {
    /// Delete the supplied keys, returning how many existed.
    async fn del(&mut self, keys: &[&str]) -> Result<i64> {
        from_value(
            self.command(Cmd::new("DEL").args(keys.iter().copied()))
                .await?,
        )
    }

    /// Count how many of the supplied keys exist. A key supplied twice is
    /// counted twice.
    async fn exists(&mut self, keys: &[&str]) -> Result<i64> {
        from_value(
            self.command(Cmd::new("EXISTS").args(keys.iter().copied()))
                .await?,
        )
    }

    /// Remaining time to live of a key, in seconds.
    async fn ttl(&mut self, key: &str) -> Result<i64> {
        let reply = from_value(self.command(Cmd::new("TTL").arg(key)).await?)?;
        ttl_reply(key, reply)
    }

    /// Remaining time to live of a key, in milliseconds.
    async fn pttl(&mut self, key: &str) -> Result<i64> {
        let reply = from_value(self.command(Cmd::new("PTTL").arg(key)).await?)?;
        ttl_reply(key, reply)
    }
}

impl<T: Executable + ?Sized> KeyCommands for T {}
