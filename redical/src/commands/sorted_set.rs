use async_trait::async_trait;

use super::Executable;
use crate::cmd::Cmd;
use crate::error::{Error, Result};
use crate::value::{from_value, Value};

/// Controls whether ZADD may add or only update elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdatePolicy {
    /// Only update elements that already exist, never add (`XX`).
    Exists,
    /// Only add new elements, never update existing ones (`NX`).
    NotExists,
}

/// Controls whether ZADD updates scores only in one direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScorePolicy {
    /// Only update when the new score is greater (`GT`).
    GreaterThan,
    /// Only update when the new score is less (`LT`).
    LessThan,
}

/// Options for ZADD. Policies are single fields, so conflicting flag
/// combinations cannot be expressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZaddOptions {
    update_policy: Option<UpdatePolicy>,
    score_policy: Option<ScorePolicy>,
    changed: bool,
}

impl ZaddOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = Some(policy);
        self
    }

    pub fn score_policy(mut self, policy: ScorePolicy) -> Self {
        self.score_policy = Some(policy);
        self
    }

    /// Count changed elements (added or rescored) instead of only added
    /// ones (`CH`).
    pub fn changed(mut self) -> Self {
        self.changed = true;
        self
    }

    fn apply(self, mut cmd: Cmd) -> Cmd {
        match self.update_policy {
            Some(UpdatePolicy::Exists) => cmd = cmd.arg("XX"),
            Some(UpdatePolicy::NotExists) => cmd = cmd.arg("NX"),
            None => {}
        }
        match self.score_policy {
            Some(ScorePolicy::GreaterThan) => cmd = cmd.arg("GT"),
            Some(ScorePolicy::LessThan) => cmd = cmd.arg("LT"),
            None => {}
        }
        if self.changed {
            cmd = cmd.arg("CH");
        }
        cmd
    }
}

fn zrange_cmd(key: &str, start: i64, stop: i64, rev: bool, with_scores: bool) -> Cmd {
    let mut cmd = Cmd::new("ZRANGE").arg(key).arg(start).arg(stop);
    if rev {
        cmd = cmd.arg("REV");
    }
    if with_scores {
        cmd = cmd.arg("WITHSCORES");
    }
    cmd
}

#[async_trait]
pub trait SortedSetCommands: Executable {
    /// Add the supplied member/score pairs to the sorted set stored at
    /// `key`. Existing members are rescored and reinserted at the right
    /// position. Returns the number of elements added, or changed when
    /// [`ZaddOptions::changed`] is set.
    async fn zadd(
        &mut self,
        key: &str,
        member_scores: &[(&str, f64)],
        options: ZaddOptions,
    ) -> Result<i64> {
        let mut cmd = options.apply(Cmd::new("ZADD").arg(key));
        for (member, score) in member_scores {
            cmd = cmd.arg(*score).arg(*member);
        }
        from_value(self.command(cmd).await?)
    }

    /// ZADD in INCR mode: increment `member` by `score` and return the new
    /// score, or `None` when the update policy suppressed the operation.
    async fn zadd_incr(
        &mut self,
        key: &str,
        member: &str,
        score: f64,
        options: ZaddOptions,
    ) -> Result<Option<f64>> {
        let cmd = options
            .apply(Cmd::new("ZADD").arg(key))
            .arg("INCR")
            .arg(score)
            .arg(member);
        from_value(self.command(cmd).await?)
    }

    /// Number of elements in the sorted set, `0` when the key is missing.
    async fn zcard(&mut self, key: &str) -> Result<i64> {
        from_value(self.command(Cmd::new("ZCARD").arg(key)).await?)
    }

    /// Inclusive index range query, lowest score first (highest first with
    /// `rev`). Negative indexes count from the end; out-of-range indexes
    /// are clamped, not errors.
    async fn zrange(&mut self, key: &str, start: i64, stop: i64, rev: bool) -> Result<Vec<String>> {
        from_value(self.command(zrange_cmd(key, start, stop, rev, false)).await?)
    }

    /// [`zrange`](SortedSetCommands::zrange) with each element's score.
    async fn zrange_with_scores(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
        rev: bool,
    ) -> Result<Vec<(String, f64)>> {
        // WITHSCORES replies are flat: member, score, member, score, ...
        let flat: Vec<Value> = from_value(self.command(zrange_cmd(key, start, stop, rev, true)).await?)?;
        if flat.len() % 2 != 0 {
            return Err(Error::TypeMismatch {
                expected: "member/score array",
                actual: "array of odd length",
            });
        }
        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
            pairs.push((from_value(member)?, from_value(score)?));
        }
        Ok(pairs)
    }

    /// Remove the supplied members, returning how many were present.
    async fn zrem(&mut self, key: &str, members: &[&str]) -> Result<i64> {
        from_value(
            self.command(Cmd::new("ZREM").arg(key).args(members.iter().copied()))
                .await?,
        )
    }

    /// Score of `member`, or `None` when the member or the key is missing.
    async fn zscore(&mut self, key: &str, member: &str) -> Result<Option<f64>> {
        from_value(self.command(Cmd::new("ZSCORE").arg(key).arg(member)).await?)
    }
}

impl<T: Executable + ?Sized> SortedSetCommands for T {}
