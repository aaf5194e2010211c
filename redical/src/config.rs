use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 6379;
// theoretical maximum size of a TCP packet
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 65535;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Location of a Redis server.
#[derive(Debug, Clone, PartialEq)]
pub enum Address {
    Tcp(String, u16),
    Unix(PathBuf),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp(host, port) => write!(f, "{}:{}", host, port),
            Address::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Options for establishing a single connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub(crate) address: Address,
    pub(crate) db: u32,
    pub(crate) max_chunk_size: usize,
    pub(crate) timeout: Duration,
}

impl ConnectOptions {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            db: 0,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Parse a `redis://<host>:<port>[/db]` or `unix://<path>` URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let (scheme, rest) = match uri.find("://") {
            Some(idx) => (&uri[..idx], &uri[idx + 3..]),
            None => return Err(Error::InvalidAddress(format!("missing scheme: {}", uri))),
        };

        match scheme {
            "redis" => {
                let (authority, path) = match rest.find('/') {
                    Some(idx) => (&rest[..idx], &rest[idx + 1..]),
                    None => (rest, ""),
                };
                if authority.is_empty() {
                    return Err(Error::InvalidAddress(format!("missing host: {}", uri)));
                }
                let (host, port) = match authority.rfind(':') {
                    Some(idx) => {
                        let port = authority[idx + 1..].parse::<u16>().map_err(|_| {
                            Error::InvalidAddress(format!("invalid port: {}", uri))
                        })?;
                        (&authority[..idx], port)
                    }
                    None => (authority, DEFAULT_PORT),
                };
                let mut options = Self::new(Address::Tcp(host.to_string(), port));
                if !path.is_empty() {
                    options.db = path.parse::<u32>().map_err(|_| {
                        Error::InvalidAddress(format!("invalid db index: {}", uri))
                    })?;
                }
                Ok(options)
            }
            "rediss" => Err(Error::InvalidAddress(
                "TLS connections are not supported".to_string(),
            )),
            "unix" => {
                if rest.is_empty() {
                    return Err(Error::InvalidAddress(format!(
                        "not a valid unix socket: {}",
                        uri
                    )));
                }
                Ok(Self::new(Address::Unix(PathBuf::from(rest))))
            }
            other => Err(Error::InvalidAddress(format!("unknown scheme: {}", other))),
        }
    }

    pub fn db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    pub fn max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

/// Options for a [`ConnectionPool`](crate::ConnectionPool).
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub(crate) connect: ConnectOptions,
    pub(crate) min_size: usize,
    pub(crate) max_size: usize,
}

impl PoolOptions {
    pub fn new(connect: ConnectOptions) -> Self {
        Self {
            connect,
            min_size: 1,
            max_size: 10,
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self> {
        Ok(Self::new(ConnectOptions::from_uri(uri)?))
    }

    pub fn min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_size > self.max_size {
            return Err(Error::InvalidOptions(
                "'min_size' must be lower than 'max_size'".to_string(),
            ));
        }
        if self.max_size == 0 {
            return Err(Error::InvalidOptions(
                "'max_size' must be a number greater than zero".to_string(),
            ));
        }
        if self.connect.max_chunk_size == 0 {
            return Err(Error::InvalidOptions(
                "'max_chunk_size' must be a number greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
