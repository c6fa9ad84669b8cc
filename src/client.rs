//! Client implementation.

use crate::cmd::{Get, Set};
use crate::{Command, Error, Pool, Reply, DEFAULT_ADDR, DEFAULT_POOL_CAPACITY};

use bytes::Bytes;
use tracing::{debug, instrument};

/// Configuration for a `Client` and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Number of connection slots in the pool.
    pub capacity: usize,
    /// Drop the socket of a connection whose last call failed with an I/O or protocol error, so
    /// the next user dials a fresh one. When `false` the faulted socket is reused as is.
    pub reset_faulted: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: DEFAULT_ADDR.to_string(),
            capacity: DEFAULT_POOL_CAPACITY,
            reset_faulted: true,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointing at `addr`.
    pub fn with_addr(addr: impl Into<String>) -> ClientConfig {
        ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        }
    }
}

/// Client for a RESP-like server.
///
/// Every call checks a connection out of the pool, runs one command on it and puts it back.
/// Cloning the client is cheap and clones share the pool, so one client can serve many tasks.
#[derive(Debug, Clone)]
pub struct Client {
    pool: Pool,
}

impl Client {
    /// Create a client. No connection is opened until the first call.
    pub fn new(config: ClientConfig) -> Client {
        Client {
            pool: Pool::new(&config),
        }
    }

    /// Returns the pool backing this client.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Send `cmd` and return whatever reply the server answers with.
    ///
    /// Error replies are returned as `Reply::Error`, not as `Err`.
    #[instrument(skip(self))]
    pub async fn call(&self, cmd: Command) -> crate::Result<Reply> {
        debug!(request = ?cmd);

        let mut conn = self.pool.acquire().await?;
        let reply = conn.call(&cmd).await?;

        debug!(?reply);

        Ok(reply)
    }

    /// Get the value of the given `key`.
    ///
    /// A nil bulk is returned as `None`.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> crate::Result<Option<Bytes>> {
        match self.call(Get::new(key).into_command()).await? {
            Reply::Bulk(value) => Ok(value),
            Reply::Error(msg) => Err(Error::Server(msg)),
            reply => Err(Error::UnexpectedReply {
                command: "GET",
                reply,
            }),
        }
    }

    /// Set `key` to hold the given `value`.
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: Bytes) -> crate::Result<()> {
        // On success, the server responds simply with `OK`. Any other response indicates an error.
        match self.call(Set::new(key, value).into_command()).await? {
            Reply::Status(status) if status == "OK" => Ok(()),
            Reply::Error(msg) => Err(Error::Server(msg)),
            reply => Err(Error::UnexpectedReply {
                command: "SET",
                reply,
            }),
        }
    }
}
