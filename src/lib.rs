//! A small client for a RESP-like key/value protocol, with a fixed-size connection pool.
//!
//! ```no_run
//! use bytes::Bytes;
//!
//! # async fn demo() -> redpool::Result<()> {
//! let client = redpool::Client::new(redpool::ClientConfig::default());
//!
//! client.set("greeting", Bytes::from_static(b"hello")).await?;
//! let value = client.get("greeting").await?;
//! assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub use client::{Client, ClientConfig};

pub mod cmd;
pub use cmd::Command;

mod connection;
pub use connection::Connection;

mod error;
pub use error::Error;

pub mod pool;
pub use pool::{Pool, PoolStatus, PooledConnection};

pub mod reply;
pub use reply::{Reply, Tail};

/// Address dialed when none is configured.
pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// Number of connection slots a pool holds unless configured otherwise.
pub const DEFAULT_POOL_CAPACITY: usize = 5;

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
