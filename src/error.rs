use crate::reply::{self, Reply};

use std::io;

/// Error returned by client and pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Dialing, reading or writing the socket failed, or the server went away.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The server sent bytes that are not a valid reply.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with an error reply.
    #[error("server error: {0}")]
    Server(String),

    /// A named command got a reply of the wrong type.
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        command: &'static str,
        reply: Reply,
    },
}

impl Error {
    /// Returns `true` if the connection that produced this error can no longer be trusted to be
    /// positioned at a reply boundary.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Protocol(_))
    }
}

impl From<reply::Error> for Error {
    fn from(src: reply::Error) -> Error {
        match src {
            reply::Error::Incomplete => {
                io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended early").into()
            }
            reply::Error::Invalid(msg) => Error::Protocol(msg),
        }
    }
}
