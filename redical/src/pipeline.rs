use std::ops::DerefMut;

use tracing::debug;

use crate::cmd::Cmd;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::value::{from_value, Value};

/// True for errors the server sent as a reply to a single command. These
/// leave the connection usable; transport errors do not.
fn is_reply_error(err: &Error) -> bool {
    matches!(err, Error::Response(_) | Error::WrongType(_))
}

/// A batch of commands written to the socket in one go.
///
/// Replies come back strictly in command order. All replies are drained
/// before any error reply is reported, so a failed command never
/// desynchronizes the connection.
#[derive(Debug, Default)]
pub struct Pipeline {
    cmds: Vec<Cmd>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { cmds: Vec::new() }
    }

    pub fn cmd(&mut self, cmd: Cmd) -> &mut Self {
        self.cmds.push(cmd);
        self
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Write the whole batch, then read one reply per command.
    pub async fn execute(self, conn: &mut Connection) -> Result<Vec<Value>> {
        if self.cmds.is_empty() {
            debug!("pipeline executed with no buffered commands");
            return Ok(Vec::new());
        }

        let mut buffer = Vec::new();
        for cmd in &self.cmds {
            buffer.extend_from_slice(&cmd.encode()?);
        }
        debug!("writing pipeline of {} commands", self.cmds.len());
        conn.write_bytes(&buffer).await?;

        let mut values = Vec::with_capacity(self.cmds.len());
        let mut first_error: Option<Error> = None;
        for _ in 0..self.cmds.len() {
            match conn.read_reply().await {
                Ok(value) => values.push(value),
                Err(e) if is_reply_error(&e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }
}

/// A MULTI/EXEC transaction, optionally guarded by WATCHed keys.
///
/// Commands are queued locally and wrapped in MULTI/EXEC when
/// [`exec`](Transaction::exec) runs. If a watched key is modified before
/// the commit, EXEC replies nil and the whole transaction fails with
/// [`Error::WatchConflict`] without applying anything.
pub struct Transaction<C> {
    conn: C,
    watched: Vec<String>,
    cmds: Vec<Cmd>,
}

impl<C: DerefMut<Target = Connection>> Transaction<C> {
    /// Start a transaction, immediately WATCHing `watch_keys` if any.
    pub(crate) async fn begin(mut conn: C, watch_keys: &[&str]) -> Result<Transaction<C>> {
        let watched: Vec<String> = watch_keys.iter().map(|k| k.to_string()).collect();
        if !watched.is_empty() {
            let _: bool = conn
                .execute(Cmd::new("WATCH").args(watch_keys.iter().copied()))
                .await?;
            debug!("WATCHing keys {:?}", watched);
        }
        Ok(Transaction {
            conn,
            watched,
            cmds: Vec::new(),
        })
    }

    pub fn queue(&mut self, cmd: Cmd) -> &mut Self {
        self.cmds.push(cmd);
        self
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Commit: send MULTI, the queued commands, and EXEC as one batch, and
    /// return the EXEC results.
    pub async fn exec(mut self) -> Result<Vec<Value>> {
        if self.cmds.is_empty() {
            debug!("transaction exiting with no queued commands");
            self.unwatch().await?;
            return Ok(Vec::new());
        }

        let mut buffer = Cmd::new("MULTI").encode()?;
        for cmd in &self.cmds {
            buffer.extend_from_slice(&cmd.encode()?);
        }
        buffer.extend_from_slice(&Cmd::new("EXEC").encode()?);
        self.conn.write_bytes(&buffer).await?;

        // +OK for MULTI
        let _: bool = from_value(self.conn.read_reply().await?)?;

        // one QUEUED acknowledgement per command; a command the server
        // rejects at queue time errors here and aborts the EXEC below
        let mut queue_error: Option<Error> = None;
        for _ in 0..self.cmds.len() {
            match self.conn.read_reply().await {
                Ok(Value::Status(ref s)) if s.as_str() == "QUEUED" => {}
                Ok(other) => {
                    return Err(Error::Protocol(format!(
                        "expected QUEUED acknowledgement, got {:?}",
                        other
                    )));
                }
                Err(e) if is_reply_error(&e) => {
                    if queue_error.is_none() {
                        queue_error = Some(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        match self.conn.read_reply().await {
            Ok(Value::Nil) => Err(Error::WatchConflict {
                keys: self.watched,
            }),
            Ok(Value::Array(values)) => Ok(values),
            Ok(other) => Err(Error::Protocol(format!(
                "unexpected EXEC reply: {:?}",
                other
            ))),
            // EXECABORT after a queue-time rejection; report the rejection
            Err(e) => Err(queue_error.unwrap_or(e)),
        }
    }

    /// Discard the queued commands and release any watched keys.
    pub async fn abort(mut self) -> Result<()> {
        debug!("transaction aborted");
        self.unwatch().await
    }

    async fn unwatch(&mut self) -> Result<()> {
        if !self.watched.is_empty() {
            debug!("UNWATCHing keys {:?}", self.watched);
            let _: bool = self.conn.execute(Cmd::new("UNWATCH")).await?;
        }
        Ok(())
    }
}
