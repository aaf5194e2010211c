use std::collections::HashMap;

use async_trait::async_trait;

use super::Executable;
use crate::cmd::Cmd;
use crate::error::Result;
use crate::value::from_value;

#[async_trait]
pub trait HashCommands: Executable {
    /// Set the supplied field/value pairs in the hash stored at `key`,
    /// creating the hash if needed. Returns the number of fields added
    /// (overwritten fields do not count).
    async fn hset(&mut self, key: &str, field_value_pairs: &[(&str, &str)]) -> Result<i64> {
        let mut cmd = Cmd::new("HSET").arg(key);
        for (field, value) in field_value_pairs {
            cmd = cmd.arg(*field).arg(*value);
        }
        from_value(self.command(cmd).await?)
    }

    /// Value associated with `field`, or `None` when the field or the key
    /// is missing.
    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        from_value(self.command(Cmd::new("HGET").arg(key).arg(field)).await?)
    }

    /// All fields and values of the hash stored at `key`. A missing key is
    /// an empty map.
    async fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>> {
        from_value(self.command(Cmd::new("HGETALL").arg(key)).await?)
    }

    /// Values for the requested fields, zipped back to their field names.
    /// Missing fields map to `None`.
    async fn hmget(
        &mut self,
        key: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, Option<String>>> {
        let values: Vec<Option<String>> = from_value(
            self.command(Cmd::new("HMGET").arg(key).args(fields.iter().copied()))
                .await?,
        )?;
        Ok(fields
            .iter()
            .map(|field| field.to_string())
            .zip(values)
            .collect())
    }

    /// Remove the supplied fields, returning how many were present.
    async fn hdel(&mut self, key: &str, fields: &[&str]) -> Result<i64> {
        from_value(
            self.command(Cmd::new("HDEL").arg(key).args(fields.iter().copied()))
                .await?,
        )
    }
}

impl<T: Executable + ?Sized> HashCommands for T {}
