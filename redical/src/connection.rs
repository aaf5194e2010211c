use bytes::BytesMut;
use redis_protocol::resp2::types::OwnedFrame as Frame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use crate::cmd::Cmd;
use crate::config::{Address, ConnectOptions};
use crate::error::{Error, Result};
use crate::pipeline::Transaction;
use crate::resp;
use crate::value::{from_value, FromValue, Value};

/// The underlying stream for a connection.
enum Socket {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Socket {
    async fn read_buf(&mut self, buf: &mut BytesMut) -> std::io::Result<usize> {
        match self {
            Socket::Tcp(stream) => stream.read_buf(buf).await,
            #[cfg(unix)]
            Socket::Unix(stream) => stream.read_buf(buf).await,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Socket::Tcp(stream) => stream.write_all(buf).await,
            #[cfg(unix)]
            Socket::Unix(stream) => stream.write_all(buf).await,
        }
    }

    async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            Socket::Tcp(stream) => stream.shutdown().await,
            #[cfg(unix)]
            Socket::Unix(stream) => stream.shutdown().await,
        }
    }
}

/// A single connection to a Redis server.
///
/// Commands are written to the socket and replies are decoded from a
/// growing read buffer, strictly in request order. For batched writes see
/// [`Pipeline`](crate::Pipeline), for MULTI/EXEC see
/// [`Transaction`](crate::Transaction).
pub struct Connection {
    socket: Socket,
    /// Reply bytes not yet parsed into a frame
    buffer: BytesMut,
    address: Address,
    db: u32,
    closed: bool,
}

impl Connection {
    /// Open a connection and select the configured database.
    pub async fn connect(options: ConnectOptions) -> Result<Connection> {
        debug!("attempting to connect to {}", options.address);

        let connect = async {
            match &options.address {
                Address::Tcp(host, port) => TcpStream::connect((host.as_str(), *port))
                    .await
                    .map(Socket::Tcp),
                #[cfg(unix)]
                Address::Unix(path) => UnixStream::connect(path).await.map(Socket::Unix),
                #[cfg(not(unix))]
                Address::Unix(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix sockets are not supported on this platform",
                )),
            }
        };
        let socket = tokio::time::timeout(options.timeout, connect)
            .await
            .map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("timed out connecting to {}", options.address),
                ))
            })??;

        let mut conn = Connection {
            socket,
            buffer: BytesMut::with_capacity(options.max_chunk_size),
            address: options.address,
            db: options.db,
            closed: false,
        };

        if options.db > 0 {
            let reply: bool = conn.execute(Cmd::new("SELECT").arg(options.db)).await?;
            if !reply {
                return Err(Error::Protocol(format!(
                    "unexpected SELECT reply for db {}",
                    options.db
                )));
            }
        }

        info!("Successfully connected to {}", conn.address);
        Ok(conn)
    }

    /// Open a connection from a `redis://` or `unix://` URI.
    pub async fn connect_uri(uri: &str) -> Result<Connection> {
        Self::connect(ConnectOptions::from_uri(uri)?).await
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn db(&self) -> u32 {
        self.db
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Shut the connection down. Further use fails with
    /// [`Error::ConnectionClosed`].
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.closed = true;
        self.socket.shutdown().await?;
        info!("Disconnected gracefully from {}", self.address);
        Ok(())
    }

    /// Send a command and decode its reply into `T`.
    pub async fn execute<T: FromValue>(&mut self, cmd: Cmd) -> Result<T> {
        from_value(self.command(cmd).await?)
    }

    /// Start a transaction on this connection, WATCHing `watch_keys`
    /// first if any are given.
    pub async fn transaction<'a>(
        &'a mut self,
        watch_keys: &[&str],
    ) -> Result<Transaction<&'a mut Connection>> {
        Transaction::begin(self, watch_keys).await
    }

    /// Send a command and return the raw reply.
    pub async fn command(&mut self, cmd: Cmd) -> Result<Value> {
        debug!("executing command: {}", String::from_utf8_lossy(cmd.name()));
        let bytes = cmd.encode()?;
        self.write_bytes(&bytes).await?;
        self.read_reply().await
    }

    pub(crate) async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if let Err(e) = self.socket.write_all(bytes).await {
            self.closed = true;
            return Err(e.into());
        }
        Ok(())
    }

    pub(crate) async fn read_reply(&mut self) -> Result<Value> {
        let frame = self.read_frame().await?;
        Value::from_frame(frame)
    }

    /// Read one frame, retaining any trailing partial frame in the buffer.
    pub(crate) async fn read_frame(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        loop {
            if let Some((frame, len)) = resp::parse_frame(&self.buffer)? {
                // consume with split_to, the remainder stays put
                let _ = self.buffer.split_to(len);
                return Ok(frame);
            }

            let n = match self.socket.read_buf(&mut self.buffer).await {
                Ok(n) => n,
                Err(e) => {
                    self.closed = true;
                    return Err(e.into());
                }
            };
            if n == 0 {
                self.closed = true;
                warn!("Lost connection to {}", self.address);
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("db", &self.db)
            .field("closed", &self.closed)
            .finish()
    }
}
