use async_trait::async_trait;

use super::Executable;
use crate::cmd::Cmd;
use crate::error::Result;
use crate::value::from_value;

#[async_trait]
pub trait ServerCommands: Executable {
    /// `PONG`, or the echo of `message` when one is supplied.
    async fn ping(&mut self, message: Option<&str>) -> Result<String> {
        let mut cmd = Cmd::new("PING");
        if let Some(message) = message {
            cmd = cmd.arg(message);
        }
        from_value(self.command(cmd).await?)
    }

    /// Delete all keys of the currently selected database.
    async fn flushdb(&mut self) -> Result<bool> {
        from_value(self.command(Cmd::new("FLUSHDB")).await?)
    }

    /// Number of keys in the currently selected database.
    async fn dbsize(&mut self) -> Result<i64> {
        from_value(self.command(Cmd::new("DBSIZE")).await?)
    }
}

impl<T: Executable + ?Sized> ServerCommands for T {}
