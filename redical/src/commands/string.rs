use async_trait::async_trait;

use super::Executable;
use crate::cmd::{Cmd, ToArg};
use crate::error::Result;
use crate::value::from_value;

/// Expiry applied by [`StringCommands::set_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetExpire {
    Seconds(u64),
    Milliseconds(u64),
}

/// Existence condition applied by [`StringCommands::set_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetCondition {
    /// Only set the key if it already exists (`XX`).
    IfExists,
    /// Only set the key if it does not already exist (`NX`).
    IfNotExists,
}

/// Options for SET. Expiry and condition are single fields, so conflicting
/// flag combinations cannot be expressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    expire: Option<SetExpire>,
    condition: Option<SetCondition>,
    keep_ttl: bool,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expire(mut self, expire: SetExpire) -> Self {
        self.expire = Some(expire);
        self
    }

    pub fn condition(mut self, condition: SetCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Retain the time to live already associated with the key.
    pub fn keep_ttl(mut self) -> Self {
        self.keep_ttl = true;
        self
    }

    fn apply(self, mut cmd: Cmd) -> Cmd {
        match self.condition {
            Some(SetCondition::IfExists) => cmd = cmd.arg("XX"),
            Some(SetCondition::IfNotExists) => cmd = cmd.arg("NX"),
            None => {}
        }
        match self.expire {
            Some(SetExpire::Seconds(secs)) => cmd = cmd.arg("EX").arg(secs),
            Some(SetExpire::Milliseconds(millis)) => cmd = cmd.arg("PX").arg(millis),
            None => {}
        }
        if self.keep_ttl {
            cmd = cmd.arg("KEEPTTL");
        }
        cmd
    }
}

#[async_trait]
pub trait StringCommands: Executable {
    /// Retrieve the value of a key, or `None` when it does not exist.
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        from_value(self.command(Cmd::new("GET").arg(key)).await?)
    }

    /// Increment the number stored at `key` by one and return the new
    /// value.
    async fn incr(&mut self, key: &str) -> Result<i64> {
        from_value(self.command(Cmd::new("INCR").arg(key)).await?)
    }

    /// Set `key` to hold `value`, overwriting any previous value and
    /// discarding any previous time to live.
    async fn set<V: ToArg + Send>(&mut self, key: &str, value: V) -> Result<bool> {
        self.set_with(key, value, SetOptions::default()).await
    }

    /// SET with expiry, existence condition, and KEEPTTL options.
    ///
    /// Returns `false` when the condition suppressed the write (the server
    /// replies nil in that case).
    async fn set_with<V: ToArg + Send>(
        &mut self,
        key: &str,
        value: V,
        options: SetOptions,
    ) -> Result<bool> {
        let cmd = options.apply(Cmd::new("SET").arg(key).arg(value));
        from_value(self.command(cmd).await?)
    }
}

impl<T: Executable + ?Sized> StringCommands for T {}
