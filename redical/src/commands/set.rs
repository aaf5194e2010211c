use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;

use super::Executable;
use crate::cmd::Cmd;
use crate::error::Result;
use crate::value::from_value;

/// One SSCAN page: the continuation cursor and the elements returned.
/// A cursor of `0` means the iteration is complete.
#[derive(Debug, Clone, PartialEq)]
pub struct SscanResponse {
    pub cursor: u64,
    pub elements: Vec<String>,
}

#[async_trait]
pub trait SetCommands: Executable {
    /// Add the supplied members to the set stored at `key`, creating the
    /// set if needed. Returns how many members were actually new.
    async fn sadd(&mut self, key: &str, members: &[&str]) -> Result<i64> {
        from_value(
            self.command(Cmd::new("SADD").arg(key).args(members.iter().copied()))
                .await?,
        )
    }

    /// Remove the supplied members, returning how many were present.
    async fn srem(&mut self, key: &str, members: &[&str]) -> Result<i64> {
        from_value(
            self.command(Cmd::new("SREM").arg(key).args(members.iter().copied()))
                .await?,
        )
    }

    /// Whether `member` belongs to the set stored at `key`.
    async fn sismember(&mut self, key: &str, member: &str) -> Result<bool> {
        from_value(
            self.command(Cmd::new("SISMEMBER").arg(key).arg(member))
                .await?,
        )
    }

    /// All members of the set stored at `key`.
    async fn smembers(&mut self, key: &str) -> Result<HashSet<String>> {
        from_value(self.command(Cmd::new("SMEMBERS").arg(key)).await?)
    }

    /// Incrementally iterate the set stored at `key`, starting from
    /// `cursor` (`0` for a fresh iteration). `match_pattern` restricts the
    /// elements to a glob-style pattern; `count` is a page-size hint.
    async fn sscan(
        &mut self,
        key: &str,
        cursor: u64,
        match_pattern: Option<&str>,
        count: Option<u64>,
    ) -> Result<SscanResponse> {
        let mut cmd = Cmd::new("SSCAN").arg(key).arg(cursor);
        if let Some(pattern) = match_pattern {
            cmd = cmd.arg("MATCH").arg(pattern);
        }
        if let Some(count) = count {
            cmd = cmd.arg("COUNT").arg(count);
        }
        let (cursor, elements): (u64, Vec<String>) = from_value(self.command(cmd).await?)?;
        Ok(SscanResponse { cursor, elements })
    }

    /// Like [`sscan`](SetCommands::sscan) but drives the cursor
    /// internally until the set is exhausted.
    ///
    /// Note: not suitable for pipeline or transaction use.
    fn sscan_iter<'a>(
        &'a mut self,
        key: &str,
        match_pattern: Option<&str>,
        count: Option<u64>,
    ) -> SscanIter<'a, Self> {
        SscanIter {
            exec: self,
            key: key.to_string(),
            match_pattern: match_pattern.map(|p| p.to_string()),
            count,
            cursor: 0,
            buffered: VecDeque::new(),
            started: false,
        }
    }
}

impl<T: Executable + ?Sized> SetCommands for T {}

/// Cursor-driven iteration over an entire set.
pub struct SscanIter<'a, E: ?Sized> {
    exec: &'a mut E,
    key: String,
    match_pattern: Option<String>,
    count: Option<u64>,
    cursor: u64,
    buffered: VecDeque<String>,
    started: bool,
}

impl<'a, E: Executable + ?Sized> SscanIter<'a, E> {
    /// Next element, or `None` once the server reports a zero cursor and
    /// the buffered page is drained.
    pub async fn next(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(element) = self.buffered.pop_front() {
                return Ok(Some(element));
            }
            if self.started && self.cursor == 0 {
                return Ok(None);
            }
            let response = self
                .exec
                .sscan(
                    &self.key,
                    self.cursor,
                    self.match_pattern.as_deref(),
                    self.count,
                )
                .await?;
            self.started = true;
            self.cursor = response.cursor;
            self.buffered.extend(response.elements);
        }
    }
}
